use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("HTTP/2 error: {0}")]
    Protocol(#[from] h2::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    #[error("Not found")]
    NotFound,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Invalid body: {0}")]
    BodyDecode(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("Panic: {0}")]
    PanicError(String),
    #[error("Response already sent")]
    ResponseAlreadySent,
}

impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::BadRequest(_) | ServerError::BodyDecode(_) => 400,
            ServerError::Unauthorized(_) => 401,
            ServerError::Forbidden(_) => 403,
            ServerError::NotFound => 404,
            ServerError::PayloadTooLarge { .. } => 413,
            ServerError::IoError(_)
            | ServerError::Protocol(_)
            | ServerError::Json(_)
            | ServerError::TlsConfig(_)
            | ServerError::InternalError(_)
            | ServerError::PanicError(_)
            | ServerError::ResponseAlreadySent => 500,
        }
    }

    /// Shorthand for a middleware or handler rejecting a request with a 500.
    pub fn internal(message: impl Into<String>) -> Self {
        ServerError::InternalError(message.into())
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(ServerError::NotFound.status_code(), 404);
        assert_eq!(ServerError::BodyDecode("x".into()).status_code(), 400);
        assert_eq!(ServerError::PayloadTooLarge { limit: 1 }.status_code(), 413);
        assert_eq!(ServerError::internal("boom").status_code(), 500);
        assert_eq!(ServerError::PanicError("boom".into()).status_code(), 500);
    }

    #[test]
    fn io_errors_convert() {
        let err: ServerError = io::Error::new(io::ErrorKind::Other, "disk").into();
        assert_eq!(err.status_code(), 500);
        assert_eq!(err.to_string(), "IO error: disk");
    }
}
