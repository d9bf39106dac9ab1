use thiserror::Error;

#[derive(Error, Debug)]
pub enum DnsError {
    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("System time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),

    /// 用户输入不合法 (例如空地址)，调用方拒绝即可，注册表不会被修改
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown DNS server: {0}")]
    UnknownServer(String),

    #[error("Unsupported platform: {0}")]
    Unsupported(String),

    #[error("{0}")]
    Custom(String),
}

pub type Result<T> = std::result::Result<T, DnsError>;
