use internship_intake::{
    config::Config,
    database::pool::{create_pool, run_migrations},
    routes, utils::time, AppState,
};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    run_migrations(&pool).await?;

    let server_address = config.server_address.clone();
    let sweep_every = Duration::from_secs(config.deadline_sweep_secs.max(1));
    let app_state = AppState::new(pool, config)?;

    {
        let state = app_state.clone();
        tokio::spawn(async move {
            loop {
                match state.internships.close_expired(time::now()).await {
                    Ok(0) => {}
                    Ok(closed) => info!(closed, "Closed internships past their deadline"),
                    Err(e) => tracing::error!(error = ?e, "Deadline sweeper error"),
                }
                tokio::time::sleep(sweep_every).await;
            }
        });
    }

    let app = routes::router(app_state).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = server_address.parse()?;
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
