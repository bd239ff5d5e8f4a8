//! 运行时错误.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// 打开或解码图像文件失败.
///
/// 该错误对单张图像是致命的: 流水线不会运行. 错误中携带出错的文件路径.
#[derive(Debug)]
pub struct OpenError {
    /// 出错的文件路径.
    pub path: PathBuf,

    /// 底层解码错误.
    pub source: image::ImageError,
}

impl fmt::Display for OpenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "无法打开文件 {}: {}", self.path.display(), self.source)
    }
}

impl Error for OpenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

/// 配置错误: 未知的模式/方法名, 或超出定义域的数值参数.
///
/// 配置错误总是原样上抛给调用者, 绝不静默回退到默认值.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// 不存在的二值化模式名.
    UnknownMode(String),

    /// 不存在的阈值方法名.
    UnknownMethod(String),

    /// 不存在的通道名.
    UnknownChannel(String),

    /// 细胞/碎屑尺寸门限为负数.
    NegativeSizeThreshold(f64),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::UnknownMode(mode) => write!(f, "不存在模式 '{mode}'!"),
            ConfigError::UnknownMethod(m) => write!(f, "不存在阈值方法 '{m}'!"),
            ConfigError::UnknownChannel(c) => write!(f, "不存在通道 '{c}'!"),
            ConfigError::NegativeSizeThreshold(v) => {
                write!(f, "尺寸门限不允许为负数, 但收到了 {v}")
            }
        }
    }
}

impl Error for ConfigError {}

/// 配置相关的运行结果.
pub type AnalysisResult<T> = Result<T, ConfigError>;

/// 批处理等场景下的汇总错误.
#[derive(Debug)]
pub enum AssayError {
    /// 打开/解码失败.
    Open(OpenError),

    /// 配置非法.
    Config(ConfigError),
}

impl fmt::Display for AssayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssayError::Open(e) => e.fmt(f),
            AssayError::Config(e) => e.fmt(f),
        }
    }
}

impl Error for AssayError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AssayError::Open(e) => Some(e),
            AssayError::Config(e) => Some(e),
        }
    }
}

impl From<OpenError> for AssayError {
    fn from(e: OpenError) -> Self {
        AssayError::Open(e)
    }
}

impl From<ConfigError> for AssayError {
    fn from(e: ConfigError) -> Self {
        AssayError::Config(e)
    }
}
