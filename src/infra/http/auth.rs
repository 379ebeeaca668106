//! Auth route group: login, signup, logout.

use axum::{
    Extension, Form,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;

use crate::application::{
    accounts::{LoginOutcome, SignupOutcome},
    error::PipelineError,
    session::{SessionHandle, TemplateLocals},
};
use crate::domain::entities::FlashMessage;
use crate::presentation::views::{
    LayoutContext, LoginTemplate, LoginView, SignupTemplate, SignupView,
    render_template_response,
};

use super::HttpState;

pub(super) async fn login_form(
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Response {
    let view = LayoutContext::new(&locals, handle.take_flash(), "Login", "/login", LoginView);
    render_template_response(LoginTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub(super) struct LoginForm {
    email: String,
    password: String,
}

pub(super) async fn login(
    State(state): State<HttpState>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
    Form(form): Form<LoginForm>,
) -> Result<Response, PipelineError> {
    match state.accounts.verify_login(&form.email, &form.password).await {
        Ok(LoginOutcome::Verified(user)) => {
            handle.log_in(user.id);
            Ok(Redirect::to("/").into_response())
        }
        Ok(LoginOutcome::InvalidCredentials) => {
            handle.push_flash(FlashMessage::error("Invalid email or password."));
            Ok(Redirect::to("/login").into_response())
        }
        Err(err) => Err(PipelineError::from_error(
            "infra::http::auth::login",
            StatusCode::INTERNAL_SERVER_ERROR,
            &err,
            locals,
        )),
    }
}

pub(super) async fn signup_form(
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
) -> Response {
    let view = LayoutContext::new(&locals, handle.take_flash(), "Signup", "/signup", SignupView);
    render_template_response(SignupTemplate { view }, StatusCode::OK)
}

#[derive(Debug, Deserialize)]
pub(super) struct SignupForm {
    email: String,
    password: String,
    #[serde(default)]
    name: String,
}

pub(super) async fn signup(
    State(state): State<HttpState>,
    Extension(handle): Extension<SessionHandle>,
    Extension(locals): Extension<TemplateLocals>,
    Form(form): Form<SignupForm>,
) -> Result<Response, PipelineError> {
    match state
        .accounts
        .sign_up(&form.email, &form.name, &form.password)
        .await
    {
        Ok(SignupOutcome::Created(_)) => {
            handle.push_flash(FlashMessage::info("Account created, please log in."));
            Ok(Redirect::to("/login").into_response())
        }
        Ok(SignupOutcome::EmailTaken) => {
            handle.push_flash(FlashMessage::error(
                "E-mail exists already, please pick a different one.",
            ));
            Ok(Redirect::to("/signup").into_response())
        }
        Ok(SignupOutcome::Rejected(reason)) => {
            handle.push_flash(FlashMessage::error(reason));
            Ok(Redirect::to("/signup").into_response())
        }
        Err(err) => Err(PipelineError::from_error(
            "infra::http::auth::signup",
            StatusCode::INTERNAL_SERVER_ERROR,
            &err,
            locals,
        )),
    }
}

pub(super) async fn logout(Extension(handle): Extension<SessionHandle>) -> Response {
    handle.destroy();
    Redirect::to("/").into_response()
}
