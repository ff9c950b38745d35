use auth202_core::{
    auth::{Authenticator, SessionStore},
    cli::{self, Cli, Commands, DbCommands, UserCommands},
    config::{Config, LogFormat},
    create_app, db,
    health::{HealthChecker, PostgresChecker, RedisChecker},
    mq::{MqServer, RedisBroker},
    services::{Repositories, Services},
    AppState,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    match args.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Db(DbCommands::Migrate) => cli::handle_db_migrate(&config).await,
        Commands::User(UserCommands::Add {
            user_name,
            password,
        }) => cli::handle_user_add(&config, &user_name, &password).await,
        Commands::Config => cli::handle_config_validate(&config).await,
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let pool = db::create_pool(&config).await?;
    db::migrate(&pool).await?;

    let repositories = Repositories::postgres(pool.clone());
    let services = Services::from_repositories(&repositories);
    let authenticator = Authenticator::new(
        Arc::clone(&repositories.users),
        SessionStore::new(config.session_ttl_secs),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let broker = RedisBroker::new(&config.redis_url)?;
    let mq_server = MqServer::new(
        Arc::new(broker),
        Arc::new(services.handler_registry()),
        authenticator.clone(),
        config.auth_policy,
    )
    .with_workers(config.mq_workers)
    .with_poll_timeout(Duration::from_secs(config.mq_poll_timeout_secs));
    let workers = mq_server.start(shutdown_rx.clone());

    let sessions = authenticator.sessions().clone();
    let mut purge_shutdown = shutdown_rx;
    let purger = tokio::spawn(async move {
        let mut interval = tokio::time::interval(SESSION_PURGE_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let purged = sessions.purge_expired().await;
                    if purged > 0 {
                        tracing::debug!(purged, "expired sessions purged");
                    }
                }
                _ = purge_shutdown.changed() => break,
            }
        }
    });

    let health = HealthChecker::new()
        .critical("postgres", PostgresChecker::new(pool))
        .optional("redis", RedisChecker::new(config.redis_url.clone()));

    let app = create_app(AppState {
        services,
        authenticator,
        policy: config.auth_policy,
        login_path: config.login_path.clone(),
        health,
        cors_allowed_origins: config.cors_allowed_origins.clone(),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    tracing::info!(policy = %config.auth_policy, "listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    for worker in workers {
        let _ = worker.await;
    }
    let _ = purger.await;

    Ok(())
}
