use collage_services::{
    BUILD_BRANCH, BUILD_COMMIT, BUILD_DATE, config::Config, database, rate_limit::RateLimiter,
    routes_with_limiter, storage::StorageBackend, telemetry,
};
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config: Config = Config::init()?;

    telemetry::init_tracing(&config)?;

    print_build_info();

    info!(
        environment = %config.environment(),
        server_addr = %config.server_addr(),
        port = %config.port(),
        "Configuration loaded"
    );

    let pool = database::create_pool(&config).await?;
    database::migrate(&pool).await?;
    let sql_storage = database::PgStorage::new(pool);

    let file_storage = StorageBackend::from_config(&config)?;
    info!(backend = file_storage.kind(), "File storage ready");

    let rate_limiter = RateLimiter::new(
        config.contribution_rate_limit(),
        config.contribution_rate_window(),
    );
    spawn_limiter_pruning(rate_limiter.clone());

    let route = routes_with_limiter(sql_storage, file_storage, config.clone(), rate_limiter);

    let addr = SocketAddr::from((config.server_addr().parse::<IpAddr>()?, config.port()));

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, route).await?;

    Ok(())
}

/// Forget users whose contribution window has elapsed.
fn spawn_limiter_pruning(limiter: RateLimiter) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(limiter.window());
        loop {
            ticker.tick().await;
            limiter.prune(Instant::now());
        }
    });
}

fn print_build_info() {
    info!("===========================================");
    info!("  Collage Services");
    info!("===========================================");
    info!("Build Date:   {}", BUILD_DATE);
    info!("Build Commit: {}", BUILD_COMMIT);
    info!("Build Branch: {}", BUILD_BRANCH);
    info!("===========================================");
}
