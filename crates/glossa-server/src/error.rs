//! Rejections and their JSON error replies

use glossa_service::{ErrorClass, ServiceError};
use serde::Serialize;
use std::convert::Infallible;
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Rejection, Reply};

/// Service failure carried through warp's rejection chain
#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl warp::reject::Reject for ApiError {}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self.0.status_class() {
            ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
            ErrorClass::NotFound => StatusCode::NOT_FOUND,
            ErrorClass::Conflict => StatusCode::CONFLICT,
            ErrorClass::Upstream => StatusCode::BAD_GATEWAY,
        }
    }
}

/// Turn a service error into a rejection
pub fn reject(err: ServiceError) -> Rejection {
    warp::reject::custom(ApiError(err))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// JSON reply with `{"error": message}`
#[must_use]
pub fn error_reply(status: StatusCode, message: impl Into<String>) -> Response {
    let body = ErrorBody { error: message.into() };
    warp::reply::with_status(warp::reply::json(&body), status).into_response()
}

/// Map every rejection onto a status and a JSON body
///
/// # Errors
/// Never; the `Result` is what `Filter::recover` expects
pub async fn recover(err: Rejection) -> Result<Response, Infallible> {
    if let Some(api) = err.find::<ApiError>() {
        let status = api.status();
        if status.is_server_error() {
            tracing::warn!(error = %api.0, "request failed upstream");
        }
        return Ok(error_reply(status, api.0.to_string()));
    }
    if let Some(missing) = err.find::<warp::reject::MissingHeader>() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, format!("missing header: {}", missing.name())));
    }
    if let Some(body) = err.find::<warp::filters::body::BodyDeserializeError>() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, body.to_string()));
    }
    if let Some(query) = err.find::<warp::reject::InvalidQuery>() {
        return Ok(error_reply(StatusCode::BAD_REQUEST, query.to_string()));
    }
    if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        return Ok(error_reply(StatusCode::PAYLOAD_TOO_LARGE, "request body too large"));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(error_reply(StatusCode::METHOD_NOT_ALLOWED, "method not allowed"));
    }
    if err.is_not_found() {
        return Ok(error_reply(StatusCode::NOT_FOUND, "not found"));
    }

    tracing::warn!(rejection = ?err, "unhandled rejection");
    Ok(error_reply(StatusCode::INTERNAL_SERVER_ERROR, "internal error"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use glossa_overlay::{OverlayError, OverlayStatus};

    #[test]
    fn status_follows_error_class() {
        let cases = [
            (ServiceError::invalid("x"), StatusCode::BAD_REQUEST),
            (ServiceError::UnknownProject("p".into()), StatusCode::NOT_FOUND),
            (
                ServiceError::Overlay(OverlayError::InvalidTransition {
                    id: "e".into(),
                    from: OverlayStatus::Deleted,
                    to: OverlayStatus::Approved,
                }),
                StatusCode::CONFLICT,
            ),
            (ServiceError::Encoding { path: "a".into() }, StatusCode::BAD_GATEWAY),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }
}
