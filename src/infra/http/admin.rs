//! Admin route group: product management, scoped to the acting user's own
//! products.

use axum::{
    Extension, Form,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::application::{
    catalog::parse_price_cents,
    error::PipelineError,
    repos::{ProductParams, RepoError},
    session::{CurrentUser, SessionHandle, TemplateLocals},
};
use crate::domain::entities::FlashMessage;
use crate::presentation::views::{
    AdminProductListView, AdminProductsTemplate, LayoutContext, ProductFormTemplate,
    ProductFormView, render_template_response,
};

use super::{HttpState, repo_failure};

pub(super) async fn products(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Result<Response, PipelineError> {
    let records = state
        .catalog
        .owned_by(user.0.id)
        .await
        .map_err(|err| repo_failure("infra::http::admin::products", &err, &locals))?;

    let view = LayoutContext::new(
        &locals,
        handle.take_flash(),
        "Admin Products",
        "/admin/products",
        AdminProductListView::new(&user.0, &records),
    );
    Ok(render_template_response(
        AdminProductsTemplate { view },
        StatusCode::OK,
    ))
}

pub(super) async fn add_product_form(
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Response {
    let view = LayoutContext::new(
        &locals,
        handle.take_flash(),
        "Add Product",
        "/admin/add-product",
        ProductFormView::blank(),
    );
    render_template_response(ProductFormTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductForm {
    title: String,
    image_url: String,
    price: String,
    description: String,
}

impl ProductForm {
    fn into_params(self, handle: &SessionHandle) -> Option<ProductParams> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            handle.push_flash(FlashMessage::error("Title must not be empty."));
            return None;
        }
        let Some(price_cents) = parse_price_cents(&self.price) else {
            handle.push_flash(FlashMessage::error("Price must be a positive amount."));
            return None;
        };
        Some(ProductParams {
            title,
            description: self.description.trim().to_string(),
            image_url: self.image_url.trim().to_string(),
            price_cents,
        })
    }
}

pub(super) async fn add_product(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
    Form(form): Form<ProductForm>,
) -> Result<Response, PipelineError> {
    let Some(params) = form.into_params(&handle) else {
        return Ok(Redirect::to("/admin/add-product").into_response());
    };

    state
        .catalog
        .create(user.0.id, params)
        .await
        .map_err(|err| repo_failure("infra::http::admin::add_product", &err, &locals))?;

    Ok(Redirect::to("/admin/products").into_response())
}

pub(super) async fn edit_product_form(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
    Path(id): Path<String>,
) -> Result<Response, PipelineError> {
    let Ok(id) = Uuid::parse_str(&id) else {
        return Ok(Redirect::to("/admin/products").into_response());
    };

    let record = state
        .catalog
        .editable(id, user.0.id)
        .await
        .map_err(|err| repo_failure("infra::http::admin::edit_product_form", &err, &locals))?;

    match record {
        Some(record) => {
            let view = LayoutContext::new(
                &locals,
                handle.take_flash(),
                "Edit Product",
                "/admin/products",
                ProductFormView::for_record(&record),
            );
            Ok(render_template_response(
                ProductFormTemplate { view },
                StatusCode::OK,
            ))
        }
        None => Ok(Redirect::to("/admin/products").into_response()),
    }
}

// No serde(flatten) here: the urlencoded deserializer behind `Form` cannot
// handle it, so the shared fields are spelled out.
#[derive(Debug, Deserialize)]
pub(super) struct EditProductForm {
    product_id: String,
    title: String,
    image_url: String,
    price: String,
    description: String,
}

impl EditProductForm {
    fn split(self) -> (String, ProductForm) {
        (
            self.product_id,
            ProductForm {
                title: self.title,
                image_url: self.image_url,
                price: self.price,
                description: self.description,
            },
        )
    }
}

pub(super) async fn edit_product(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
    Form(form): Form<EditProductForm>,
) -> Result<Response, PipelineError> {
    let (product_id, fields) = form.split();
    let Ok(id) = Uuid::parse_str(&product_id) else {
        return Ok(Redirect::to("/admin/products").into_response());
    };
    let Some(params) = fields.into_params(&handle) else {
        return Ok(Redirect::to(&format!("/admin/edit-product/{id}")).into_response());
    };

    match state.catalog.update(id, user.0.id, params).await {
        Ok(()) => Ok(Redirect::to("/admin/products").into_response()),
        Err(RepoError::NotFound) => {
            handle.push_flash(FlashMessage::error("Product not found."));
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(err) => Err(repo_failure(
            "infra::http::admin::edit_product",
            &err,
            &locals,
        )),
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct DeleteProductForm {
    product_id: String,
}

pub(super) async fn delete_product(
    State(state): State<HttpState>,
    Extension(user): Extension<CurrentUser>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
    Form(form): Form<DeleteProductForm>,
) -> Result<Response, PipelineError> {
    let Ok(id) = Uuid::parse_str(&form.product_id) else {
        return Ok(Redirect::to("/admin/products").into_response());
    };

    match state.catalog.delete(id, user.0.id).await {
        Ok(()) => Ok(Redirect::to("/admin/products").into_response()),
        Err(RepoError::NotFound) => {
            handle.push_flash(FlashMessage::error("Product not found."));
            Ok(Redirect::to("/admin/products").into_response())
        }
        Err(err) => Err(repo_failure(
            "infra::http::admin::delete_product",
            &err,
            &locals,
        )),
    }
}
