use std::time::Duration;

use self::response::Response;

pub mod codec;
pub mod command;
pub mod connection;
pub mod response;

#[cfg(test)]
pub mod fake;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum QisError {
    #[error("I/O error: {:?}", _0)]
    Io(#[from] std::io::Error),

    #[error("Command rejected by QIS: {}", _0)]
    Fail(String),
    #[error("Connection was closed")]
    Abort,
    #[error("Unexpected response: {:?}", _0)]
    Unexpected(Response),
    #[error("Module {target} not found within {timeout:?}")]
    DeviceNotFound { target: String, timeout: Duration },
    #[error("QIS is not reachable at {}", _0)]
    ServiceUnavailable(String),
    #[error("Invalid resample interval: {}", _0)]
    InvalidInterval(String),
    #[error("Invalid module address: {}", _0)]
    InvalidAddress(String),
    #[error("Background task failed: {}", _0)]
    Join(#[from] tokio::task::JoinError),
    #[error("No modules configured")]
    NoModules,
}

impl From<Response> for QisError {
    fn from(value: Response) -> Self {
        match value {
            Response::Fail(reason) => Self::Fail(reason),
            Response::Ok(_) => Self::Unexpected(value),
        }
    }
}

pub type Result<T> = std::result::Result<T, QisError>;
