use std::{net::SocketAddr, process, sync::Arc};

use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

use bottega::{
    application::{
        accounts::AccountService,
        auth::AuthService,
        cart::CartService,
        catalog::CatalogService,
        error::AppError,
        orders::OrderService,
        repos::{CartsRepo, HealthProbe, OrdersRepo, ProductsRepo, SessionsRepo, UsersRepo},
    },
    config,
    infra::{
        access_log::AccessLog,
        db::PostgresRepositories,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    // The listener is bound only after the database connection resolves; a
    // failed connection leaves the process non-serving.
    let pool = PostgresRepositories::connect(
        &settings.database.url,
        settings.database.max_connections.get(),
    )
    .await
    .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    let repositories = Arc::new(PostgresRepositories::new(pool));

    let (access_log, log_writer) = AccessLog::spawn(
        &settings.access_log.path,
        settings.access_log.queue_capacity.get() as usize,
    )
    .await
    .map_err(AppError::from)?;

    let state = build_http_state(repositories, access_log, &settings);
    let router = http::build_router(state);

    let bind_addr = settings.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(target: "bottega::server", addr = %bind_addr, "listening");

    let result = axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    log_writer.abort();
    let _ = log_writer.await;

    result
}

fn build_http_state(
    repositories: Arc<PostgresRepositories>,
    access_log: AccessLog,
    settings: &config::Settings,
) -> HttpState {
    let users: Arc<dyn UsersRepo> = repositories.clone();
    let sessions: Arc<dyn SessionsRepo> = repositories.clone();
    let products: Arc<dyn ProductsRepo> = repositories.clone();
    let carts: Arc<dyn CartsRepo> = repositories.clone();
    let orders: Arc<dyn OrdersRepo> = repositories.clone();
    let health: Arc<dyn HealthProbe> = repositories;

    let ttl_secs = i64::try_from(settings.session.ttl.as_secs()).unwrap_or(i64::MAX);

    HttpState {
        auth: Arc::new(AuthService::new(users.clone())),
        accounts: Arc::new(AccountService::new(users)),
        catalog: Arc::new(CatalogService::new(products.clone())),
        cart: Arc::new(CartService::new(carts.clone(), products)),
        orders: Arc::new(OrderService::new(orders, carts)),
        sessions,
        health,
        access_log,
        session_ttl: time::Duration::seconds(ttl_secs),
    }
}
