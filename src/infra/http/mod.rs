mod admin;
mod auth;
mod csrf;
mod middleware;
mod session;
mod shop;

pub use session::{SESSION_COOKIE, session_cookie_value};

use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, State},
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use time::Duration;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;

use crate::{
    application::{
        accounts::AccountService,
        auth::AuthService,
        cart::CartService,
        catalog::CatalogService,
        error::{ErrorReport, PipelineError},
        orders::OrderService,
        repos::{HealthProbe, RepoError, SessionsRepo},
        session::TemplateLocals,
    },
    infra::access_log::AccessLog,
    presentation::views::{render_error_page_response, render_not_found_response},
};

use middleware::{
    inject_template_locals, log_responses, render_error_pages, require_auth,
    resolve_current_user, security_headers, serve_static_assets, set_request_context,
    write_access_log,
};

#[derive(Clone)]
pub struct HttpState {
    pub sessions: Arc<dyn SessionsRepo>,
    pub health: Arc<dyn HealthProbe>,
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub catalog: Arc<CatalogService>,
    pub cart: Arc<CartService>,
    pub orders: Arc<OrderService>,
    pub access_log: AccessLog,
    pub session_ttl: Duration,
}

/// Assemble the full request pipeline.
///
/// The `ServiceBuilder` stack reads top-to-bottom in request order. Session
/// resolution must precede the CSRF check and auth resolution, and the error
/// renderer must wrap all three so their failures become the generic error
/// page; reordering any of these changes observable behavior.
pub fn build_router(state: HttpState) -> Router {
    let guarded_shop = Router::new()
        .route("/cart", get(shop::cart).post(shop::cart_add))
        .route("/cart-delete-item", post(shop::cart_delete_item))
        .route("/create-order", post(shop::create_order))
        .route("/orders", get(shop::orders))
        .layer(from_fn(require_auth));

    let admin_routes = Router::new()
        .route("/products", get(admin::products))
        .route(
            "/add-product",
            get(admin::add_product_form).post(admin::add_product),
        )
        .route("/edit-product/{id}", get(admin::edit_product_form))
        .route("/edit-product", post(admin::edit_product))
        .route("/delete-product", post(admin::delete_product))
        .layer(from_fn(require_auth));

    Router::new()
        .route("/", get(shop::index))
        .route("/products", get(shop::product_list))
        .route("/products/{id}", get(shop::product_detail))
        .merge(guarded_shop)
        .route("/login", get(auth::login_form).post(auth::login))
        .route("/signup", get(auth::signup_form).post(auth::signup))
        .route("/logout", post(auth::logout))
        .nest("/admin", admin_routes)
        .route("/500", get(error_page))
        .route("/_health/db", get(health))
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn(security_headers))
                .layer(CompressionLayer::new())
                .layer(from_fn(set_request_context))
                .layer(from_fn_with_state(state.clone(), write_access_log))
                .layer(from_fn(log_responses))
                .layer(from_fn(serve_static_assets))
                .layer(from_fn(render_error_pages))
                .layer(from_fn_with_state(state.clone(), session::attach_session))
                .layer(from_fn(csrf::enforce_csrf))
                .layer(from_fn(inject_template_locals))
                .layer(from_fn_with_state(state.clone(), resolve_current_user)),
        )
        .with_state(state)
}

/// Tail of the chain: the static-asset layer has already had its chance, so
/// an unmatched path is a plain 404.
async fn not_found(Extension(locals): Extension<TemplateLocals>) -> Response {
    render_not_found_response(&locals)
}

/// Render the generic error page on demand.
async fn error_page(Extension(locals): Extension<TemplateLocals>) -> Response {
    render_error_page_response(&locals)
}

async fn health(State(state): State<HttpState>) -> Response {
    match state.health.ping().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}

/// Map a failed repository call to a pipeline error bound for the terminal
/// error handler.
pub(super) fn repo_failure(
    source: &'static str,
    err: &RepoError,
    locals: &TemplateLocals,
) -> PipelineError {
    PipelineError::from_error(
        source,
        StatusCode::INTERNAL_SERVER_ERROR,
        err,
        locals.clone(),
    )
}
