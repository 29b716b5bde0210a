//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量识别和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量识别处理器
//! - 管理应用生命周期（初始化、运行、收尾）
//! - 批量加载记录（Vec<NormalizedQuestionRecord>）
//! - 控制识别并发数量（Semaphore）
//! - 持有进程级只读资源（模型产物、校准表）
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<NormalizedQuestionRecord>)
//!     ↓
//! pipeline::RecognitionPipeline (处理单条记录)
//!     ↓
//! features / rules / classifier / reconstruct / arbiter / calibrate (能力层)
//!     ↓
//! models (数据模型)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：编排层只做调度和统计，不做识别判断
//! 2. **资源隔离**：只有编排层负责载入模型与校准表
//! 3. **顺序保证**：输出与输入同序，source_id 全程可回溯

pub mod batch_processor;

// 重新导出主要类型
pub use batch_processor::App;
