use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {

    #[error("missing environment: {}", .0.join(", "))]
    MissingEnv(Vec<&'static str>),

    #[error("could not parse game port `{entry}`: {reason}")]
    InvalidPort {
	entry: String,
	reason: String,
    },

    #[error("could not parse build metadata `{0}`, expected key,value")]
    InvalidMetadata(String),

    #[error("{path}: {source}")]
    Io {
	path: PathBuf,
	#[source]
	source: std::io::Error,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
