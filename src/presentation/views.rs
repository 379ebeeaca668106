use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::application::error::ErrorReport;
use crate::application::session::TemplateLocals;
use crate::domain::entities::{
    CartLine, FlashMessage, OrderWithItems, ProductRecord, UserRecord,
};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, TemplateRenderError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => {
            let mut response = (StatusCode::INTERNAL_SERVER_ERROR, err.public_message).into_response();
            ErrorReport::from_error(err.source, StatusCode::INTERNAL_SERVER_ERROR, &err)
                .attach(&mut response);
            response
        }
    }
}

/// Everything the base layout needs, wrapped around page content.
///
/// `is_authenticated` and `csrf_token` come from the per-request template
/// locals and are therefore present on every rendered view.
pub struct LayoutContext<T> {
    pub page_title: String,
    pub path: String,
    pub is_authenticated: bool,
    pub csrf_token: String,
    pub flash: Vec<FlashMessage>,
    pub content: T,
}

impl<T> LayoutContext<T> {
    pub fn new(
        locals: &TemplateLocals,
        flash: Vec<FlashMessage>,
        page_title: impl Into<String>,
        path: impl Into<String>,
        content: T,
    ) -> Self {
        Self {
            page_title: page_title.into(),
            path: path.into(),
            is_authenticated: locals.is_authenticated,
            csrf_token: locals.csrf_token.clone(),
            flash,
            content,
        }
    }

    /// Layout without flash messages, for error pages rendered outside the
    /// normal handler flow.
    pub fn bare(
        locals: &TemplateLocals,
        page_title: impl Into<String>,
        path: impl Into<String>,
        content: T,
    ) -> Self {
        Self::new(locals, Vec::new(), page_title, path, content)
    }
}

pub fn format_price(cents: i64) -> String {
    format!("${}.{:02}", cents / 100, cents % 100)
}

#[derive(Clone)]
pub struct ProductCard {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub price: String,
}

impl From<&ProductRecord> for ProductCard {
    fn from(record: &ProductRecord) -> Self {
        Self {
            id: record.id.to_string(),
            title: record.title.clone(),
            image_url: record.image_url.clone(),
            price: format_price(record.price_cents),
        }
    }
}

pub struct ProductGridView {
    pub heading: String,
    pub products: Vec<ProductCard>,
}

impl ProductGridView {
    pub fn new(heading: impl Into<String>, records: &[ProductRecord]) -> Self {
        Self {
            heading: heading.into(),
            products: records.iter().map(ProductCard::from).collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub view: LayoutContext<ProductGridView>,
}

pub struct ProductDetailView {
    pub id: String,
    pub title: String,
    pub image_url: String,
    pub description: String,
    pub price: String,
}

impl From<&ProductRecord> for ProductDetailView {
    fn from(record: &ProductRecord) -> Self {
        Self {
            id: record.id.to_string(),
            title: record.title.clone(),
            image_url: record.image_url.clone(),
            description: record.description.clone(),
            price: format_price(record.price_cents),
        }
    }
}

#[derive(Template)]
#[template(path = "product.html")]
pub struct ProductTemplate {
    pub view: LayoutContext<ProductDetailView>,
}

pub struct CartLineView {
    pub product_id: String,
    pub title: String,
    pub quantity: i64,
    pub line_total: String,
}

pub struct CartView {
    pub lines: Vec<CartLineView>,
    pub total: String,
}

impl CartView {
    pub fn new(lines: &[CartLine]) -> Self {
        let total: i64 = lines.iter().map(CartLine::line_total_cents).sum();
        Self {
            lines: lines
                .iter()
                .map(|line| CartLineView {
                    product_id: line.product.id.to_string(),
                    title: line.product.title.clone(),
                    quantity: line.quantity,
                    line_total: format_price(line.line_total_cents()),
                })
                .collect(),
            total: format_price(total),
        }
    }
}

#[derive(Template)]
#[template(path = "cart.html")]
pub struct CartTemplate {
    pub view: LayoutContext<CartView>,
}

pub struct OrderItemView {
    pub title: String,
    pub quantity: i64,
    pub price: String,
}

pub struct OrderView {
    pub id: String,
    pub total: String,
    pub items: Vec<OrderItemView>,
}

pub struct OrdersView {
    pub orders: Vec<OrderView>,
}

impl OrdersView {
    pub fn new(orders: &[OrderWithItems]) -> Self {
        Self {
            orders: orders
                .iter()
                .map(|entry| OrderView {
                    id: entry.order.id.to_string(),
                    total: format_price(entry.order.total_cents),
                    items: entry
                        .items
                        .iter()
                        .map(|item| OrderItemView {
                            title: item.title.clone(),
                            quantity: item.quantity,
                            price: format_price(item.price_cents),
                        })
                        .collect(),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "orders.html")]
pub struct OrdersTemplate {
    pub view: LayoutContext<OrdersView>,
}

pub struct LoginView;

#[derive(Template)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub view: LayoutContext<LoginView>,
}

pub struct SignupView;

#[derive(Template)]
#[template(path = "auth/signup.html")]
pub struct SignupTemplate {
    pub view: LayoutContext<SignupView>,
}

pub struct AdminProductRow {
    pub id: String,
    pub title: String,
    pub price: String,
}

pub struct AdminProductListView {
    pub owner_name: String,
    pub products: Vec<AdminProductRow>,
}

impl AdminProductListView {
    pub fn new(owner: &UserRecord, records: &[ProductRecord]) -> Self {
        Self {
            owner_name: owner.name.clone(),
            products: records
                .iter()
                .map(|record| AdminProductRow {
                    id: record.id.to_string(),
                    title: record.title.clone(),
                    price: format_price(record.price_cents),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/products.html")]
pub struct AdminProductsTemplate {
    pub view: LayoutContext<AdminProductListView>,
}

/// Shared create/edit form. `product_id` is empty for the create flow; the
/// template switches the action on `editing`.
pub struct ProductFormView {
    pub heading: String,
    pub editing: bool,
    pub product_id: String,
    pub title: String,
    pub image_url: String,
    pub description: String,
    pub price: String,
}

impl ProductFormView {
    pub fn blank() -> Self {
        Self {
            heading: "Add Product".to_string(),
            editing: false,
            product_id: String::new(),
            title: String::new(),
            image_url: String::new(),
            description: String::new(),
            price: String::new(),
        }
    }

    pub fn for_record(record: &ProductRecord) -> Self {
        Self {
            heading: "Edit Product".to_string(),
            editing: true,
            product_id: record.id.to_string(),
            title: record.title.clone(),
            image_url: record.image_url.clone(),
            description: record.description.clone(),
            price: format!("{}.{:02}", record.price_cents / 100, record.price_cents % 100),
        }
    }
}

#[derive(Template)]
#[template(path = "admin/product_form.html")]
pub struct ProductFormTemplate {
    pub view: LayoutContext<ProductFormView>,
}

pub struct NotFoundView;

#[derive(Template)]
#[template(path = "404.html")]
pub struct NotFoundTemplate {
    pub view: LayoutContext<NotFoundView>,
}

pub struct ErrorPageView;

#[derive(Template)]
#[template(path = "500.html")]
pub struct ErrorTemplate {
    pub view: LayoutContext<ErrorPageView>,
}

pub fn render_not_found_response(locals: &TemplateLocals) -> Response {
    let view = LayoutContext::bare(locals, "Page Not Found", "/404", NotFoundView);
    let mut response = render_template_response(NotFoundTemplate { view }, StatusCode::NOT_FOUND);
    ErrorReport::from_message(
        "presentation::views::render_not_found_response",
        StatusCode::NOT_FOUND,
        "Resource not found",
    )
    .attach(&mut response);
    response
}

/// The uniform error page. Always 500, whatever the underlying failure was.
pub fn render_error_page_response(locals: &TemplateLocals) -> Response {
    let view = LayoutContext::bare(locals, "Error!", "/500", ErrorPageView);
    render_template_response(ErrorTemplate { view }, StatusCode::INTERNAL_SERVER_ERROR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prices_format_with_two_digit_cents() {
        assert_eq!(format_price(1299), "$12.99");
        assert_eq!(format_price(5), "$0.05");
        assert_eq!(format_price(100), "$1.00");
    }

    #[test]
    fn error_page_carries_auth_flag() {
        let locals = TemplateLocals {
            is_authenticated: true,
            csrf_token: "token".to_string(),
        };
        let view = LayoutContext::bare(&locals, "Error!", "/500", ErrorPageView);
        let html = ErrorTemplate { view }.render().expect("render error page");
        assert!(html.contains("Something went wrong"));
        assert!(html.contains("Logout"));
    }

    #[test]
    fn anonymous_layout_offers_login() {
        let locals = TemplateLocals::default();
        let view = LayoutContext::bare(&locals, "Page Not Found", "/404", NotFoundView);
        let html = NotFoundTemplate { view }.render().expect("render 404 page");
        assert!(html.contains("Login"));
        assert!(!html.contains("Logout"));
    }
}
