use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("store is not available")]
    Unavailable,
    #[error("storage failure: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl StoreError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        StoreError::InvalidArgument(msg.into())
    }
}

impl From<StoreError> for Status {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidArgument(msg) => Status::invalid_argument(msg),
            StoreError::Unavailable => Status::unavailable("store is not available"),
            StoreError::Storage(e) => Status::internal(format!("{:#}", e)),
        }
    }
}
