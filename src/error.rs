use std::fmt;

/// 应用程序错误类型
#[derive(Debug)]
pub enum AppError {
    /// 记录结构缺陷（可尝试重构修复）
    Extraction(ExtractionError),
    /// 分类器不可用（降级，不致命）
    Classifier(ClassifierError),
    /// 配置错误（启动期致命）
    Config(ConfigError),
    /// 文件操作错误
    File(FileError),
    /// 其他错误（用于包装第三方库错误）
    Other(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Extraction(e) => write!(f, "记录缺陷: {}", e),
            AppError::Classifier(e) => write!(f, "分类器错误: {}", e),
            AppError::Config(e) => write!(f, "配置错误: {}", e),
            AppError::File(e) => write!(f, "文件错误: {}", e),
            AppError::Other(msg) => write!(f, "错误: {}", msg),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Extraction(e) => Some(e),
            AppError::Classifier(e) => Some(e),
            AppError::Config(e) => Some(e),
            AppError::File(e) => Some(e),
            AppError::Other(_) => None,
        }
    }
}

/// 记录结构缺陷
///
/// 这一类错误在流水线内部消化：触发重构、修复后重试一次，
/// 不作为失败向调用方冒泡
#[derive(Debug)]
pub enum ExtractionError {
    /// 选项块无可并回的前题
    OrphanOptionBlock {
        source_id: String,
    },
    /// 记录已修复过一次，禁止再次进入重构
    RepairCapExceeded {
        source_id: String,
    },
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionError::OrphanOptionBlock { source_id } => {
                write!(f, "选项块无可并回的前题: {}", source_id)
            }
            ExtractionError::RepairCapExceeded { source_id } => {
                write!(f, "记录已达重构次数上限: {}", source_id)
            }
        }
    }
}

impl std::error::Error for ExtractionError {}

/// 分类器错误
#[derive(Debug)]
pub enum ClassifierError {
    /// 模型产物缺失或损坏，流水线降级为纯规则模式
    ArtifactUnavailable {
        reason: String,
    },
    /// 模型产物与推理端的特征/类别定义不一致
    ArtifactMismatch {
        reason: String,
    },
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassifierError::ArtifactUnavailable { reason } => {
                write!(f, "模型产物不可用: {}", reason)
            }
            ClassifierError::ArtifactMismatch { reason } => {
                write!(f, "模型产物不匹配: {}", reason)
            }
        }
    }
}

impl std::error::Error for ClassifierError {}

/// 配置错误
///
/// 一律在启动期快速失败，任何记录进入流水线之前就终止
#[derive(Debug)]
pub enum ConfigError {
    /// 校准表非法
    CalibrationTableInvalid {
        path: String,
        reason: String,
    },
    /// 环境变量解析失败
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 输入目录不存在
    InputFolderMissing {
        path: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::CalibrationTableInvalid { path, reason } => {
                write!(f, "校准表非法 ({}): {}", path, reason)
            }
            ConfigError::EnvVarParseFailed {
                var_name,
                value,
                expected_type,
            } => {
                write!(
                    f,
                    "环境变量 {} 解析失败: 值 '{}' 无法转换为 {}",
                    var_name, value, expected_type
                )
            }
            ConfigError::InputFolderMissing { path } => {
                write!(f, "输入目录不存在: {}", path)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// 文件操作错误
#[derive(Debug)]
pub enum FileError {
    /// 文件不存在
    NotFound {
        path: String,
    },
    /// 读取文件失败
    ReadFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 写入文件失败
    WriteFailed {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// JSON 解析失败
    JsonParseFailed {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl fmt::Display for FileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileError::NotFound { path } => write!(f, "文件不存在: {}", path),
            FileError::ReadFailed { path, source } => {
                write!(f, "读取文件失败 ({}): {}", path, source)
            }
            FileError::WriteFailed { path, source } => {
                write!(f, "写入文件失败 ({}): {}", path, source)
            }
            FileError::JsonParseFailed { source } => {
                write!(f, "JSON解析失败: {}", source)
            }
        }
    }
}

impl std::error::Error for FileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FileError::ReadFailed { source, .. }
            | FileError::WriteFailed { source, .. }
            | FileError::JsonParseFailed { source } => {
                Some(source.as_ref() as &(dyn std::error::Error + 'static))
            }
            _ => None,
        }
    }
}

// ========== 从常见错误类型转换 ==========

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::File(FileError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: Box::new(err),
        })
    }
}

impl From<crate::classifier::ArtifactError> for AppError {
    fn from(err: crate::classifier::ArtifactError) -> Self {
        match err {
            crate::classifier::ArtifactError::Mismatch(reason) => {
                AppError::Classifier(ClassifierError::ArtifactMismatch { reason })
            }
            other => AppError::Classifier(ClassifierError::ArtifactUnavailable {
                reason: other.to_string(),
            }),
        }
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建校准表配置错误
    pub fn calibration_invalid(path: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Config(ConfigError::CalibrationTableInvalid {
            path: path.into(),
            reason: reason.into(),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建分类器不可用错误
    pub fn classifier_unavailable(reason: impl Into<String>) -> Self {
        AppError::Classifier(ClassifierError::ArtifactUnavailable {
            reason: reason.into(),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
