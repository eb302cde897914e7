use axum::extract::rejection::JsonRejection;
use axum::http::header::WWW_AUTHENTICATE;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use mynance_core::CoreError;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Unauthorized(String),
    /// A bearer token on a service route failed validation. Answered with
    /// `WWW-Authenticate` so the caller knows its own credential is bad.
    InvalidBearer(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    TooManyRequests(String),
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let challenge = matches!(self, AppError::InvalidBearer(_));
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) | AppError::InvalidBearer(msg) => {
                (StatusCode::UNAUTHORIZED, msg)
            }
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg),
            AppError::Internal(msg) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };
        let mut response = (status, axum::Json(body)).into_response();
        if challenge {
            response.headers_mut().insert(
                WWW_AUTHENTICATE,
                HeaderValue::from_static(r#"Bearer error="invalid_token""#),
            );
        }
        response
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidCredentials => AppError::Unauthorized("Invalid credentials".to_string()),
            CoreError::DuplicateEmail(_) => AppError::Conflict("Email is already in use".to_string()),
            CoreError::WeakPassword => AppError::BadRequest(e.to_string()),
            e if e.is_unauthenticated() => {
                tracing::debug!("rejecting request: {e}");
                AppError::Unauthorized("Invalid or expired token".to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

/// Malformed, incomplete or mistyped JSON bodies are all a 400.
impl From<JsonRejection> for AppError {
    fn from(e: JsonRejection) -> Self {
        tracing::debug!(status = %e.status(), "rejected request body: {}", e.body_text());
        AppError::BadRequest("Invalid request body".to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", e);
        AppError::Internal("Internal server error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failures_map_to_unauthorized() {
        for err in [
            CoreError::Expired,
            CoreError::Revoked,
            CoreError::Upstream("timeout".into()),
            CoreError::TokenRejected("Invalid token".into()),
        ] {
            assert!(matches!(AppError::from(err), AppError::Unauthorized(_)));
        }
    }

    #[test]
    fn credential_failure_message_is_generic() {
        let AppError::Unauthorized(msg) = AppError::from(CoreError::InvalidCredentials) else {
            panic!("expected Unauthorized");
        };
        assert_eq!(msg, "Invalid credentials");
    }

    #[test]
    fn registration_errors() {
        assert!(matches!(
            AppError::from(CoreError::DuplicateEmail("a@b.c".into())),
            AppError::Conflict(_)
        ));
        assert!(matches!(
            AppError::from(CoreError::WeakPassword),
            AppError::BadRequest(_)
        ));
    }

    #[test]
    fn infrastructure_errors_are_internal() {
        assert!(matches!(
            AppError::from(CoreError::Persistence("down".into())),
            AppError::Internal(_)
        ));
    }

    #[tokio::test]
    async fn json_rejections_become_bad_request() {
        use axum::body::Body;
        use axum::extract::FromRequest;
        use axum::http::Request;
        use axum::Json;

        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"unexpected": true}"#))
            .unwrap();
        let rejection = Json::<crate::dto::ChangePasswordRequest>::from_request(request, &())
            .await
            .err()
            .unwrap();
        let response = AppError::from(rejection).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()["content-type"], "application/json");
    }

    #[test]
    fn invalid_bearer_carries_challenge() {
        let response = AppError::InvalidBearer("bad".into()).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers().contains_key(WWW_AUTHENTICATE));

        let response = AppError::Unauthorized("bad".into()).into_response();
        assert!(!response.headers().contains_key(WWW_AUTHENTICATE));
    }
}
