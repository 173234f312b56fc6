//! Error type shared by the signing, transport and client layers.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a signed exchange with business.ru can fail.
///
/// Variants keep the request coordinates as fields so callers can match on
/// them instead of parsing the message.
#[derive(Debug, Error)]
pub enum Error {
    /// The verb is not one of GET, POST or PUT. Raised before any I/O.
    #[error("{method} is unknown HTTP method")]
    UnknownHttpMethod { method: String },

    /// HTTP 401: the session token was rejected.
    #[error("{method} {url} returned 401 (seems like token is invalid)")]
    InvalidToken { method: String, url: String },

    /// HTTP 503: the account is being rate limited.
    #[error("{method} {url} returned 503 (seems like too many requests)")]
    TooManyRequests { method: String, url: String },

    /// HTTP 405: no such resource.
    #[error("{method} {url} returned 405 (seems like endpoint is not found)")]
    EndpointNotFound { method: String, url: String },

    /// Any other non-200 status.
    #[error("{method} {url} returned {status_code}")]
    UnexpectedResponse {
        method: String,
        url: String,
        status_code: u16,
    },

    /// The response signature was missing or did not match.
    #[error("{method} {url} response is not validated")]
    ResponseNotValidated { method: String, url: String },

    /// The server answered with `status: "error"`.
    #[error("Business.ru response data has status=error. {error_code} {error_text}")]
    Api {
        error_code: String,
        error_text: String,
    },

    /// The bootstrap token repair performed at construction failed.
    #[error("failed to obtain the initial session token")]
    Initialization {
        #[source]
        source: Box<Error>,
    },

    /// Connection, timeout or body read failure.
    #[error("HTTP transport error")]
    Http(#[from] reqwest::Error),

    /// A 200 response whose body is not JSON.
    #[error("failed to decode response body")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the retry loop may consume this error and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::InvalidToken { .. } | Error::TooManyRequests { .. }
        )
    }

    /// HTTP status behind the error, when one was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::InvalidToken { .. } => Some(401),
            Error::TooManyRequests { .. } => Some(503),
            Error::EndpointNotFound { .. } => Some(405),
            Error::UnexpectedResponse { status_code, .. } => Some(*status_code),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::Initialization { source } => source.status_code(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords() -> (String, String) {
        ("GET".to_string(), "https://a.business.ru/api/rest/orders.json".to_string())
    }

    #[test]
    fn test_retryable_kinds() {
        let (method, url) = coords();
        assert!(
            Error::InvalidToken {
                method: method.clone(),
                url: url.clone()
            }
            .is_retryable()
        );
        assert!(
            Error::TooManyRequests {
                method: method.clone(),
                url: url.clone()
            }
            .is_retryable()
        );
        assert!(!Error::EndpointNotFound { method, url }.is_retryable());
        assert!(
            !Error::Api {
                error_code: "X".to_string(),
                error_text: "Y".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_too_many_requests_message_names_503() {
        let (method, url) = coords();
        let err = Error::TooManyRequests { method, url };
        assert!(err.to_string().contains("returned 503"));
    }

    #[test]
    fn test_unexpected_response_display() {
        let (method, url) = coords();
        let err = Error::UnexpectedResponse {
            method,
            url: url.clone(),
            status_code: 418,
        };
        assert_eq!(err.to_string(), format!("GET {} returned 418", url));
        assert_eq!(err.status_code(), Some(418));
    }

    #[test]
    fn test_api_error_display_is_verbatim() {
        let err = Error::Api {
            error_code: "X".to_string(),
            error_text: "Y".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Business.ru response data has status=error. X Y"
        );
    }

    #[test]
    fn test_initialization_keeps_source() {
        let (method, url) = coords();
        let err = Error::Initialization {
            source: Box::new(Error::TooManyRequests { method, url }),
        };
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("503"));
        assert_eq!(err.status_code(), Some(503));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_unknown_method_display() {
        let err = Error::UnknownHttpMethod {
            method: "PATCH".to_string(),
        };
        assert_eq!(err.to_string(), "PATCH is unknown HTTP method");
        assert_eq!(err.status_code(), None);
    }
}
