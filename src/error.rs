use std::fmt;

/// soul-agent 记忆层的统一错误类型
#[derive(Debug)]
pub enum SoulError {
    /// 记忆存储错误
    Memory(MemoryError),
    /// 配置错误
    Config(ConfigError),
    /// 工具执行错误
    Tool(ToolError),
    /// IO 错误
    Io(std::io::Error),
    /// 其他错误
    Other(String),
}

/// 记忆存储错误
///
/// 读取失败不会出现在这里：损坏或缺失的层级文件在加载时按空集合处理。
#[derive(Debug)]
pub enum MemoryError {
    /// 序列化/反序列化错误
    SerializationError(String),
    /// 层级文件写入失败（磁盘满、权限不足等）
    StorageWrite { path: String, message: String },
}

/// 工具执行错误
#[derive(Debug)]
pub enum ToolError {
    /// 工具未找到
    NotFound(String),
    /// 参数缺失
    MissingParameter(String),
    /// 参数类型错误
    InvalidParameter { name: String, message: String },
    /// 工具执行失败
    ExecutionFailed { tool: String, message: String },
}

/// 配置错误
#[derive(Debug)]
pub enum ConfigError {
    /// 配置文件未找到
    FileNotFound(String),
    /// 配置解析失败
    ParseFailed(String),
    /// 配置值无效
    InvalidValue { field: String, message: String },
}

impl fmt::Display for SoulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoulError::Memory(e) => write!(f, "Memory Error: {}", e),
            SoulError::Config(e) => write!(f, "Config Error: {}", e),
            SoulError::Tool(e) => write!(f, "Tool Error: {}", e),
            SoulError::Io(e) => write!(f, "IO Error: {}", e),
            SoulError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            MemoryError::StorageWrite { path, message } => {
                write!(f, "Failed to write '{}': {}", path, message)
            }
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::NotFound(name) => write!(f, "Tool '{}' not found", name),
            ToolError::MissingParameter(name) => write!(f, "Missing parameter: {}", name),
            ToolError::InvalidParameter { name, message } => {
                write!(f, "Invalid parameter '{}': {}", name, message)
            }
            ToolError::ExecutionFailed { tool, message } => {
                write!(f, "Tool '{}' execution failed: {}", tool, message)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {}", path),
            ConfigError::ParseFailed(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::InvalidValue { field, message } => {
                write!(f, "Invalid config value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for SoulError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SoulError::Memory(e) => Some(e),
            SoulError::Config(e) => Some(e),
            SoulError::Tool(e) => Some(e),
            SoulError::Io(e) => Some(e),
            SoulError::Other(_) => None,
        }
    }
}

impl std::error::Error for MemoryError {}
impl std::error::Error for ToolError {}
impl std::error::Error for ConfigError {}

// From 转换实现
impl From<std::io::Error> for SoulError {
    fn from(err: std::io::Error) -> Self {
        SoulError::Io(err)
    }
}

impl From<serde_json::Error> for SoulError {
    fn from(err: serde_json::Error) -> Self {
        SoulError::Memory(MemoryError::SerializationError(err.to_string()))
    }
}

impl From<serde_yaml::Error> for SoulError {
    fn from(err: serde_yaml::Error) -> Self {
        SoulError::Config(ConfigError::ParseFailed(err.to_string()))
    }
}

impl From<MemoryError> for SoulError {
    fn from(err: MemoryError) -> Self {
        SoulError::Memory(err)
    }
}

impl From<ToolError> for SoulError {
    fn from(err: ToolError) -> Self {
        SoulError::Tool(err)
    }
}

impl From<ConfigError> for SoulError {
    fn from(err: ConfigError) -> Self {
        SoulError::Config(err)
    }
}

// 便捷的 Result 类型别名
pub type Result<T> = std::result::Result<T, SoulError>;
