//! CSRF token validation for mutating requests.
//!
//! The per-session token is issued when the session record is created. Safe
//! methods pass straight through; everything else must present the token in
//! the `_csrf` form field or the `x-csrf-token` header. Comparison is
//! constant-time.

use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, Limited};
use metrics::counter;

use crate::application::{
    error::PipelineError,
    session::{SessionHandle, TemplateLocals},
};
use crate::domain::tokens::tokens_match;

const SOURCE: &str = "infra::http::csrf::enforce_csrf";
const CSRF_FIELD: &str = "_csrf";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// Mutating request bodies are flat urlencoded forms; anything bigger than
/// this is not one of ours.
const MAX_FORM_BYTES: usize = 64 * 1024;

pub async fn enforce_csrf(request: Request, next: Next) -> Response {
    if is_safe_method(request.method()) {
        return next.run(request).await;
    }

    let Some(handle) = request.extensions().get::<SessionHandle>().cloned() else {
        return PipelineError::new(
            SOURCE,
            StatusCode::INTERNAL_SERVER_ERROR,
            "session context missing before CSRF validation",
            TemplateLocals::default(),
        )
        .into_response();
    };
    let locals = handle.locals();
    let expected = handle.csrf_token();

    if let Some(presented) = header_token(request.headers()) {
        if tokens_match(&expected, &presented) {
            return next.run(request).await;
        }
        return reject(locals);
    }

    // The token travels in the urlencoded body. Buffer it, check, then hand
    // the route handler a rebuilt request carrying the same bytes.
    let (parts, body) = request.into_parts();
    let bytes = match Limited::new(body, MAX_FORM_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            return PipelineError::new(
                SOURCE,
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("failed to buffer request body: {err}"),
                locals,
            )
            .into_response();
        }
    };

    let presented = form_token(&bytes);
    let request = Request::from_parts(parts, Body::from(bytes));

    match presented {
        Some(token) if tokens_match(&expected, &token) => next.run(request).await,
        _ => reject(locals),
    }
}

fn reject(locals: TemplateLocals) -> Response {
    counter!("bottega_csrf_rejections_total").increment(1);
    PipelineError::new(
        SOURCE,
        StatusCode::FORBIDDEN,
        "missing or invalid CSRF token",
        locals,
    )
    .into_response()
}

fn is_safe_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE
    )
}

fn header_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(CSRF_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

/// Pull the `_csrf` value out of a flat urlencoded body.
fn form_token(bytes: &Bytes) -> Option<String> {
    url::form_urlencoded::parse(bytes.as_ref())
        .find(|(key, _)| key == CSRF_FIELD)
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods_are_exempt() {
        assert!(is_safe_method(&Method::GET));
        assert!(is_safe_method(&Method::HEAD));
        assert!(!is_safe_method(&Method::POST));
        assert!(!is_safe_method(&Method::DELETE));
    }

    #[test]
    fn form_token_finds_the_field() {
        let bytes = Bytes::from_static(b"title=Coffee&_csrf=abc123&price=4.50");
        assert_eq!(form_token(&bytes).as_deref(), Some("abc123"));
    }

    #[test]
    fn form_token_decodes_percent_escapes() {
        let bytes = Bytes::from_static(b"_csrf=a%2Bb");
        assert_eq!(form_token(&bytes).as_deref(), Some("a+b"));
    }

    #[test]
    fn form_token_absent_when_field_missing() {
        let bytes = Bytes::from_static(b"title=Coffee&price=4.50");
        assert_eq!(form_token(&bytes), None);
    }
}
