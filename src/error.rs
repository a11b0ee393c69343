use thiserror::Error;

use crate::codec::CodecError;
use crate::remote::RemoteError;

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("nothing to upload: local log is empty")]
    NothingToUpload,

    #[error("local log I/O error: {0}")]
    LocalLog(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

pub type TrackResult<T> = Result<T, TrackError>;
