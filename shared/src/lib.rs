// shared/src/lib.rs

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid interval: {0}")]
    InvalidInterval(String),
    #[error("invalid model reference: {0}")]
    InvalidModel(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;
