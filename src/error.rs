
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DLiteError {
    #[error("Identity error: {0}")]
    Identity(String),
    #[error("Schema violation: {0}")]
    Schema(String),
    #[error("{uri} has no such {kind}: '{name}'")]
    AbsentMember { uri: String, kind: &'static str, name: String },
    #[error("driver '{driver}' does not support {capability}()")]
    MissingCapability { driver: String, capability: &'static str },
    #[error("Driver error: {0}")]
    Driver(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Plugin resolution error: {0}")]
    PluginResolution(String),
}

pub type Result<T> = std::result::Result<T, DLiteError>;

// Helper conversions
impl From<std::io::Error> for DLiteError {
    fn from(e: std::io::Error) -> Self { Self::Storage(e.to_string()) }
}
impl From<serde_json::Error> for DLiteError {
    fn from(e: serde_json::Error) -> Self { Self::Driver(e.to_string()) }
}
