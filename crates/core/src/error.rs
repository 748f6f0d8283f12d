use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ScanJobError {
    #[error("Missing setting: {0}")]
    MissingSetting(&'static str),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
