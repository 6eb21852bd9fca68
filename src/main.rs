use std::{error::Error as StdError, process, sync::Arc, time::Duration};

use shopfront::{
    application::{
        auth::AuthService,
        current_user::CurrentUserResolver,
        error::AppError,
        products::ProductService,
        repos::{ProductsRepo, UsersRepo},
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AppState},
        telemetry,
        uploads::ImageStorage,
    },
};
use sqlx::postgres::PgPool;
use tower_sessions::ExpiredDeletion;
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const EXPIRED_SESSION_SWEEP: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    let mut causes = Vec::new();
    let mut current = StdError::source(error);
    while let Some(cause) = current {
        causes.push(cause.to_string());
        current = cause.source();
    }

    let log = || error!(error = %error, causes = ?causes, "shopfront exited with an error");
    if dispatcher::has_been_set() {
        log();
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, log);
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(InfraError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_and_migrate(&settings).await?;
    pool.close().await;
    info!(target = "shopfront::migrate", "migrations applied");
    Ok(())
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let secret = settings
        .require_session_secret()
        .map_err(InfraError::from)?
        .to_owned();

    let pool = connect_and_migrate(&settings).await?;
    let repositories = Arc::new(PostgresRepositories::new(pool.clone()));
    repositories
        .health_check()
        .await
        .map_err(InfraError::database("check database health"))?;
    let state = build_state(repositories, &settings)?;

    let session_store = PostgresStore::new(pool);
    let deletion_task = tokio::spawn(
        session_store
            .clone()
            .continuously_delete_expired(EXPIRED_SESSION_SWEEP),
    );

    let router = http::build_router(state, session_store, &settings.session, &secret);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(target = "shopfront::serve", addr = %addr, "listening");

    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")));

    deletion_task.abort();
    let _ = deletion_task.await;

    result
}

/// Connect, then apply application and session-table migrations in that order.
async fn connect_and_migrate(settings: &config::Settings) -> Result<PgPool, AppError> {
    let database_url = settings.require_database_url().map_err(InfraError::from)?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::database("connect to the database"))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::database("apply migrations"))?;

    PostgresStore::new(pool.clone())
        .migrate()
        .await
        .map_err(InfraError::database("migrate the session table"))?;

    Ok(pool)
}

fn build_state(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> Result<AppState, AppError> {
    let users_repo: Arc<dyn UsersRepo> = repositories.clone();
    let products_repo: Arc<dyn ProductsRepo> = repositories;

    let directory = settings.uploads.directory.clone();
    let images = ImageStorage::new(directory.clone()).map_err(|source| {
        InfraError::UploadDirectory {
            path: directory,
            source,
        }
    })?;

    Ok(AppState {
        auth: Arc::new(AuthService::new(users_repo.clone())),
        products: Arc::new(ProductService::new(products_repo)),
        current_user: Arc::new(CurrentUserResolver::new(users_repo)),
        images: Arc::new(images),
        public_directory: settings.assets.public_directory.clone(),
        body_limit: settings.uploads.body_limit(),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target = "shopfront::serve", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target = "shopfront::serve", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!(target = "shopfront::serve", "shutdown signal received");
}
