//! Mapping core errors onto HTTP responses.

use std::convert::Infallible;

use roomctl_discovery::LocatorError;
use roomctl_drivers::DriverError;
use roomctl_state::{RegistryError, StateError};
use serde::Serialize;
use warp::http::StatusCode;

/// A core error carried through warp's rejection system.
#[derive(Debug)]
pub struct ApiError(pub StateError);

impl warp::reject::Reject for ApiError {}

impl ApiError {
    pub fn reject(error: impl Into<StateError>) -> warp::Rejection {
        warp::reject::custom(ApiError(error.into()))
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            StateError::NotFound(_) => StatusCode::NOT_FOUND,
            StateError::Conflict(_) | StateError::Validation(_) => StatusCode::BAD_REQUEST,
            StateError::Driver(e) => match e {
                DriverError::Vendor { .. } => StatusCode::INTERNAL_SERVER_ERROR,
                DriverError::TransientNetwork(_) | DriverError::Protocol(_) => {
                    StatusCode::BAD_GATEWAY
                }
                DriverError::Unsupported(_) | DriverError::InvalidConfig(_) => {
                    StatusCode::BAD_REQUEST
                }
            },
            StateError::Locator(LocatorError::NotFound { .. }) => StatusCode::NOT_FOUND,
            StateError::Locator(LocatorError::InvalidMac(_) | LocatorError::InvalidSubnet(_)) => {
                StatusCode::BAD_REQUEST
            }
            StateError::Locator(_) | StateError::Registry(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match &self.0 {
            StateError::Driver(DriverError::Vendor { message }) => ErrorBody {
                message: "Device backend reported a failure".to_string(),
                details: Some(message.clone()),
            },
            other => ErrorBody {
                message: other.to_string(),
                details: None,
            },
        }
    }
}

impl From<StateError> for ApiError {
    fn from(error: StateError) -> Self {
        ApiError(error)
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        ApiError(error.into())
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: warp::Error,
    },

    #[error("Failed to open device registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Invalid driver configuration: {0}")]
    Driver(#[from] DriverError),
}

/// Handle rejections and convert them to JSON responses.
pub async fn handle_rejection(
    err: warp::Rejection,
) -> Result<impl warp::Reply, Infallible> {
    let (code, body) = if let Some(api) = err.find::<ApiError>() {
        if api.status().is_server_error() {
            tracing::warn!(error = %api.0, "request failed");
        }
        (api.status(), api.body())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, message("Not found"))
    } else if let Some(e) = err.find::<warp::filters::body::BodyDeserializeError>() {
        (StatusCode::BAD_REQUEST, message(&e.to_string()))
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, message("Invalid query string"))
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, message("Method not allowed"))
    } else {
        tracing::error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, message("Internal server error"))
    };

    Ok(warp::reply::with_status(warp::reply::json(&body), code))
}

fn message(text: &str) -> ErrorBody {
    ErrorBody {
        message: text.to_string(),
        details: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StateError::NotFound("Device not found".into()), StatusCode::NOT_FOUND)]
    #[case(StateError::Conflict("Device already exists".into()), StatusCode::BAD_REQUEST)]
    #[case(StateError::Validation("IP or MAC required".into()), StatusCode::BAD_REQUEST)]
    #[case(StateError::Driver(DriverError::TransientNetwork("timeout".into())), StatusCode::BAD_GATEWAY)]
    #[case(StateError::Driver(DriverError::vendor("offline")), StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(StateError::Driver(DriverError::Unsupported("off")), StatusCode::BAD_REQUEST)]
    fn test_status_mapping(#[case] error: StateError, #[case] expected: StatusCode) {
        assert_eq!(ApiError(error).status(), expected);
    }

    #[test]
    fn test_vendor_message_goes_to_details() {
        let body = ApiError(StateError::Driver(DriverError::vendor("Device offline"))).body();
        assert_eq!(body.details.as_deref(), Some("Device offline"));
    }
}
