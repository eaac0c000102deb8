use crate::store::StoreError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {

    /* encapsulate a kube-rust error */
    #[error("kube error: {0}")]
    Kube(#[from] kube::Error),

    /* the heartbeat could not be decoded or failed validation */
    #[error("{0}")]
    BadRequest(String),

    #[error("{context}: {source}")]
    Store {
	context: &'static str,
	#[source]
	source: StoreError,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {

    pub fn status(&self) -> StatusCode {
	match self {
	    Error::BadRequest(_) => StatusCode::BAD_REQUEST,
	    _ => StatusCode::INTERNAL_SERVER_ERROR,
	}
    }
}

/*
 * Heartbeat failures go back to the GSDK as "<code> - <message>" text.
 */
impl IntoResponse for Error {
    fn into_response(self) -> Response {
	let status = self.status();
	(status, format!("{} - {}", status.as_u16(), self)).into_response()
    }
}
