use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error("http client setup failed: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with http {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("{url} returned an empty body")]
    EmptyBody { url: String },

    #[error("cannot derive a file name from {url}")]
    NoFileName { url: String },

    #[error("cache write to {path} failed: {source}")]
    CacheWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Decode(#[from] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ViewerError>;
