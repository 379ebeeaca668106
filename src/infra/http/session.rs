//! Session resolution middleware: cookie in, store-backed record out.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use time::OffsetDateTime;
use tracing::{error, warn};

use crate::application::{
    error::PipelineError,
    repos::RepoError,
    session::{SessionHandle, TemplateLocals},
};
use crate::domain::tokens::is_well_formed_token;

use super::HttpState;

pub const SESSION_COOKIE: &str = "bottega_session";

const SOURCE: &str = "infra::http::session::attach_session";

/// Load or create the session for this request, expose it through request
/// extensions, and write it back once the inner chain is done.
///
/// Runs before the CSRF check and before auth resolution; both read session
/// state from the handle this middleware inserts.
pub async fn attach_session(
    State(state): State<HttpState>,
    mut request: Request,
    next: Next,
) -> Response {
    let presented = session_id_from_headers(request.headers());

    let handle = match resume_or_start(&state, presented).await {
        Ok(handle) => handle,
        Err(err) => {
            // The session store itself is down; nothing downstream can run.
            return PipelineError::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
                TemplateLocals::default(),
            )
            .into_response();
        }
    };

    request.extensions_mut().insert(handle.clone());

    let mut response = next.run(request).await;

    finish_session(&state, &handle).await;

    if handle.is_fresh() && !handle.is_destroyed() {
        if let Ok(value) = HeaderValue::from_str(&session_cookie_value(&handle.id())) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

async fn resume_or_start(
    state: &HttpState,
    presented: Option<String>,
) -> Result<SessionHandle, RepoError> {
    let Some(id) = presented else {
        return Ok(SessionHandle::started(state.session_ttl));
    };

    match state.sessions.find_session(&id).await? {
        Some(record) if !record.is_expired(OffsetDateTime::now_utc()) => {
            Ok(SessionHandle::resumed(record))
        }
        Some(record) => {
            // Expired record: best-effort cleanup, then start over.
            if let Err(err) = state.sessions.destroy_session(&record.id).await {
                warn!(
                    target = "bottega::http::session",
                    error = %err,
                    "failed to remove expired session"
                );
            }
            Ok(SessionHandle::started(state.session_ttl))
        }
        None => Ok(SessionHandle::started(state.session_ttl)),
    }
}

/// End-of-request write-back: destroy wins over dirty.
async fn finish_session(state: &HttpState, handle: &SessionHandle) {
    if handle.is_destroyed() {
        if let Err(err) = state.sessions.destroy_session(&handle.id()).await {
            error!(
                target = "bottega::http::session",
                error = %err,
                "failed to destroy session"
            );
        }
    } else if handle.is_dirty() {
        let record = handle.snapshot(state.session_ttl);
        if let Err(err) = state.sessions.put_session(&record).await {
            error!(
                target = "bottega::http::session",
                error = %err,
                "failed to persist session"
            );
        }
    }
}

/// Extract a plausible session id from the request's cookie headers.
pub fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers.get_all(header::COOKIE).iter().find_map(|value| {
        let raw = value.to_str().ok()?;
        raw.split(';').find_map(|pair| {
            let (name, candidate) = pair.trim().split_once('=')?;
            (name == SESSION_COOKIE && is_well_formed_token(candidate))
                .then(|| candidate.to_string())
        })
    })
}

pub fn session_cookie_value(id: &str) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tokens::new_session_id;

    fn headers_with_cookie(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn extracts_session_cookie_among_others() {
        let id = new_session_id();
        let headers =
            headers_with_cookie(&format!("theme=dark; {SESSION_COOKIE}={id}; lang=en"));
        assert_eq!(session_id_from_headers(&headers), Some(id));
    }

    #[test]
    fn rejects_malformed_session_ids() {
        let headers = headers_with_cookie(&format!("{SESSION_COOKIE}=not-a-token"));
        assert_eq!(session_id_from_headers(&headers), None);

        let headers = headers_with_cookie("other=value");
        assert_eq!(session_id_from_headers(&headers), None);
    }

    #[test]
    fn cookie_value_is_http_only_and_scoped_to_root() {
        let id = new_session_id();
        let value = session_cookie_value(&id);
        assert!(value.starts_with(&format!("{SESSION_COOKIE}={id}")));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Path=/"));
        assert!(value.contains("SameSite=Lax"));
    }
}
