use std::{future::IntoFuture, process, sync::Arc};

use shelfrate::{
    application::{
        catalog::CatalogService,
        engagement::EngagementService,
        error::AppError,
        identity::{AuthPolicy, IdentityService},
        repos::{BooksRepo, EngagementRepo, SeedRepo, StoreHealth, TokensRepo, UsersRepo},
        seed::{FixtureSource, SeedService},
    },
    cache::{CacheConfig, MemoryCacheStore, ViewCache},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Seed(_) => run_seed(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    if settings.seed.on_startup {
        seed_service(&repositories)
            .load(&FixtureSource::from_path(settings.seed.fixture.as_deref()))
            .await?;
    }

    let state = build_api_state(repositories, &settings);
    serve_http(&settings, state).await
}

async fn run_seed(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    seed_service(&repositories)
        .load(&FixtureSource::from_path(settings.seed.fixture.as_deref()))
        .await?;
    Ok(())
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::Migration(err.to_string())))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn seed_service(repositories: &Arc<PostgresRepositories>) -> SeedService {
    let seed_repo: Arc<dyn SeedRepo> = repositories.clone();
    SeedService::new(seed_repo)
}

fn build_api_state(repositories: Arc<PostgresRepositories>, settings: &config::Settings) -> ApiState {
    let cache_config = CacheConfig::from(&settings.cache);
    let store = Arc::new(MemoryCacheStore::new(&cache_config));
    let cache = ViewCache::new(store, &cache_config);

    let books: Arc<dyn BooksRepo> = repositories.clone();
    let engagement: Arc<dyn EngagementRepo> = repositories.clone();
    let users: Arc<dyn UsersRepo> = repositories.clone();
    let tokens: Arc<dyn TokensRepo> = repositories.clone();
    let health: Arc<dyn StoreHealth> = repositories;

    ApiState {
        catalog: Arc::new(CatalogService::new(books, cache.clone())),
        engagement: Arc::new(EngagementService::new(engagement, cache)),
        identity: Arc::new(IdentityService::new(
            users,
            tokens,
            AuthPolicy::from(&settings.auth),
        )),
        health,
    }
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let addr = settings.server.addr;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| AppError::from(InfraError::Bind { addr, source }))?;
    info!(%addr, "listening");

    let (signal_tx, signal_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signal_tx.send(());
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        if signal_rx.await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::from(InfraError::from(err)))?;
            info!("server stopped");
        }
        () = deadline => {
            warn!(
                grace_seconds = grace.as_secs(),
                "in-flight requests did not finish before the shutdown deadline"
            );
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
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
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received; draining in-flight requests");
}
