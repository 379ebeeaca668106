use std::{net::SocketAddr, sync::Arc, time::Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use metrics::counter;
use time::OffsetDateTime;
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::{
    auth::ResolvedUser,
    error::{ErrorOutcome, ErrorReport, PipelineError},
    session::{CurrentUser, SessionHandle},
};
use crate::infra::{access_log::combined_line, assets};
use crate::presentation::views::render_error_page_response;

use super::HttpState;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Unconditional response hardening headers.
///
/// Content-Security-Policy is deliberately absent: product images are plain
/// URLs pointing at arbitrary origins.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert("x-dns-prefetch-control", HeaderValue::from_static("off"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    headers.insert("x-xss-protection", HeaderValue::from_static("0"));
    response
}

/// Append one combined-log-format line per request to the durable access
/// log. The enqueue never waits on the file.
pub async fn write_access_log(
    State(state): State<HttpState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let version = request.version();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string());
    let referer = header_value(&request, header::REFERER);
    let user_agent = header_value(&request, header::USER_AGENT);

    let response = next.run(request).await;

    counter!("bottega_http_requests_total").increment(1);
    let line = combined_line(
        remote.as_deref(),
        &method,
        &uri,
        version,
        response.status(),
        response.headers(),
        referer.as_deref(),
        user_agent.as_deref(),
        OffsetDateTime::now_utc(),
    );
    state.access_log.record(line);

    response
}

fn header_value(request: &Request, name: header::HeaderName) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// Short-circuit requests for embedded public assets.
///
/// Sits before session resolution so asset fetches never create session
/// records; anything that misses the bundle continues down the chain.
pub async fn serve_static_assets(request: Request, next: Next) -> Response {
    if matches!(*request.method(), Method::GET | Method::HEAD) {
        if let Some(asset) = assets::serve_public(request.uri().path()) {
            return asset;
        }
    }
    next.run(request).await
}

/// Structured diagnostics for failed requests, fed by the `ErrorReport`
/// riding response extensions.
pub async fn log_responses(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target = "bottega::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "request failed",
            );
        } else {
            warn!(
                target = "bottega::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                "client request error",
            );
        }
    }

    response
}

/// Terminal error handler: any response tagged with an [`ErrorOutcome`]
/// becomes the generic error page.
///
/// The page status is always 500 even when the report carries a more precise
/// code (a CSRF rejection's 403, a store outage's 503). That uniformity is
/// an observable contract of this pipeline; the report keeps the original
/// status for the logs.
pub async fn render_error_pages(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;

    let Some(outcome) = response.extensions_mut().remove::<ErrorOutcome>() else {
        return response;
    };

    counter!("bottega_http_error_pages_total").increment(1);
    let report = response.extensions_mut().remove::<ErrorReport>();

    let mut page = render_error_page_response(&outcome.locals);
    if let Some(report) = report {
        report.attach(&mut page);
    }
    page
}

/// Copy `is_authenticated` and the CSRF token out of the session for every
/// later render. Runs on each request so the flag reflects the session state
/// at context-construction time.
pub async fn inject_template_locals(mut request: Request, next: Next) -> Response {
    let locals = request
        .extensions()
        .get::<SessionHandle>()
        .map(SessionHandle::locals)
        .unwrap_or_default();
    request.extensions_mut().insert(locals);
    next.run(request).await
}

/// Resolve the session's stored user reference into a full record.
///
/// A missing reference and a stale reference both pass through without a
/// user; only a failing lookup aborts into the terminal error handler.
pub async fn resolve_current_user(
    State(state): State<HttpState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(handle) = request.extensions().get::<SessionHandle>().cloned() else {
        return next.run(request).await;
    };

    match state.auth.resolve_session_user(handle.user_id()).await {
        Ok(ResolvedUser::Attached(user)) => {
            request.extensions_mut().insert(CurrentUser(Arc::new(user)));
        }
        Ok(ResolvedUser::Anonymous) => {}
        Err(err) => {
            counter!("bottega_auth_lookup_failures_total").increment(1);
            return PipelineError::from_error(
                "infra::http::middleware::resolve_current_user",
                StatusCode::INTERNAL_SERVER_ERROR,
                &err,
                handle.locals(),
            )
            .into_response();
        }
    }

    next.run(request).await
}

/// Gate for routes that need an acting user; anonymous requests are sent to
/// the login form.
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentUser>().is_some() {
        next.run(request).await
    } else {
        Redirect::to("/login").into_response()
    }
}
