use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} is required")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
}

#[derive(Error, Debug)]
#[error("unknown message status: {0:?}")]
pub struct UnknownStatus(pub String);
