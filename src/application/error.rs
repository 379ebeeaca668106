use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::session::TemplateLocals, config::LoadError, infra::error::InfraError,
};

/// Diagnostic payload attached to error responses so the logging layer can
/// emit source and cause chain without re-deriving them.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Marker for responses produced by a failed pipeline step. The centralized
/// error renderer replaces any response carrying this extension with the
/// generic error page.
#[derive(Debug, Clone)]
pub struct ErrorOutcome {
    pub locals: TemplateLocals,
}

/// A failure raised by a middleware step or route handler.
///
/// The report keeps the status the failure would deserve (403 for CSRF, 503
/// for a broken store); the terminal renderer deliberately ignores it and
/// responds with a uniform 500 page, matching the observed behavior of the
/// system this replaces.
#[derive(Debug)]
pub struct PipelineError {
    report: ErrorReport,
    locals: TemplateLocals,
}

impl PipelineError {
    pub fn new(
        source: &'static str,
        status: StatusCode,
        detail: impl Into<String>,
        locals: TemplateLocals,
    ) -> Self {
        Self {
            report: ErrorReport::from_message(source, status, detail),
            locals,
        }
    }

    pub fn from_error(
        source: &'static str,
        status: StatusCode,
        error: &dyn StdError,
        locals: TemplateLocals,
    ) -> Self {
        Self {
            report: ErrorReport::from_error(source, status, error),
            locals,
        }
    }

    pub fn report(&self) -> &ErrorReport {
        &self.report
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let mut response = self.report.status.into_response();
        response.extensions_mut().insert(ErrorOutcome {
            locals: self.locals,
        });
        self.report.attach(&mut response);
        response
    }
}

/// Process-level failures surfaced by the startup sequencer.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
