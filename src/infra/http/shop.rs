//! Shop route group: storefront, cart, orders.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::{
    error::PipelineError,
    orders::CheckoutError,
    session::{CurrentUser, SessionHandle, TemplateLocals},
};
use crate::domain::entities::FlashMessage;
use crate::presentation::views::{
    CartTemplate, CartView, IndexTemplate, LayoutContext, OrdersTemplate, OrdersView,
    ProductDetailView, ProductGridView, ProductTemplate, render_not_found_response,
    render_template_response,
};

use super::{HttpState, repo_failure};

pub(super) async fn index(
    State(state): State<HttpState>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Result<Response, PipelineError> {
    let products = state
        .catalog
        .storefront()
        .await
        .map_err(|err| repo_failure("infra::http::shop::index", &err, &locals))?;

    let content = ProductGridView::new("Shop", &products);
    let view = LayoutContext::new(&locals, handle.take_flash(), "Shop", "/", content);
    Ok(render_template_response(IndexTemplate { view }, StatusCode::OK))
}

pub(super) async fn product_list(
    State(state): State<HttpState>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Result<Response, PipelineError> {
    let products = state
        .catalog
        .storefront()
        .await
        .map_err(|err| repo_failure("infra::http::shop::product_list", &err, &locals))?;

    let content = ProductGridView::new("All Products", &products);
    let view = LayoutContext::new(&locals, handle.take_flash(), "Products", "/products", content);
    Ok(render_template_response(IndexTemplate { view }, StatusCode::OK))
}

pub(super) async fn product_detail(
    State(state): State<HttpState>,
    Extension(locals): Extension<TemplateLocals>,
    Path(id): Path<String>,
) -> Result<Response, PipelineError> {
    // A garbled id cannot name a product; render the 404 page rather than a
    // bare rejection.
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(render_not_found_response(&locals));
    };

    let product = state
        .catalog
        .product_detail(id)
        .await
        .map_err(|err| repo_failure("infra::http::shop::product_detail", &err, &locals))?;

    match product {
        Some(record) => {
            let title = record.title.clone();
            let content = ProductDetailView::from(&record);
            let view = LayoutContext::new(&locals, Vec::new(), title, "/products", content);
            Ok(render_template_response(ProductTemplate { view }, StatusCode::OK))
        }
        None => Ok(render_not_found_response(&locals)),
    }
}

pub(super) async fn cart(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Result<Response, PipelineError> {
    let lines = state
        .cart
        .lines(user.0.id)
        .await
        .map_err(|err| repo_failure("infra::http::shop::cart", &err, &locals))?;

    let view = LayoutContext::new(
        &locals,
        handle.take_flash(),
        "Your Cart",
        "/cart",
        CartView::new(&lines),
    );
    Ok(render_template_response(CartTemplate { view }, StatusCode::OK))
}

#[derive(Debug, Deserialize)]
pub(super) struct CartForm {
    product_id: String,
}

pub(super) async fn cart_add(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
    Form(form): Form<CartForm>,
) -> Result<Response, PipelineError> {
    let Ok(product_id) = Uuid::parse_str(&form.product_id) else {
        handle.push_flash(FlashMessage::error("That product does not exist."));
        return Ok(Redirect::to("/cart").into_response());
    };

    state
        .cart
        .add_product(user.0.id, product_id)
        .await
        .map_err(|err| repo_failure("infra::http::shop::cart_add", &err, &locals))?;

    Ok(Redirect::to("/cart").into_response())
}

pub(super) async fn cart_delete_item(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(locals): Extension<TemplateLocals>,
    Form(form): Form<CartForm>,
) -> Result<Response, PipelineError> {
    if let Ok(product_id) = Uuid::parse_str(&form.product_id) {
        state
            .cart
            .remove_product(user.0.id, product_id)
            .await
            .map_err(|err| repo_failure("infra::http::shop::cart_delete_item", &err, &locals))?;
    }

    Ok(Redirect::to("/cart").into_response())
}

pub(super) async fn create_order(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Result<Response, PipelineError> {
    match state.orders.place_order(user.0.id).await {
        Ok(_) => Ok(Redirect::to("/orders").into_response()),
        Err(CheckoutError::EmptyCart) => {
            handle.push_flash(FlashMessage::error("Your cart is empty."));
            Ok(Redirect::to("/cart").into_response())
        }
        Err(CheckoutError::Repo(err)) => Err(repo_failure(
            "infra::http::shop::create_order",
            &err,
            &locals,
        )),
    }
}

pub(super) async fn orders(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Result<Response, PipelineError> {
    let orders = state
        .orders
        .history(user.0.id)
        .await
        .map_err(|err| repo_failure("infra::http::shop::orders", &err, &locals))?;

    let view = LayoutContext::new(
        &locals,
        handle.take_flash(),
        "Your Orders",
        "/orders",
        OrdersView::new(&orders),
    );
    Ok(render_template_response(OrdersTemplate { view }, StatusCode::OK))
}
