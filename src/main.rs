use dotenvy::dotenv;
use tracing::info;

use plangate::infra::{
    app::create_app,
    background::{run_cancellation_loop, run_reconciliation_loop},
    setup::init_app_state,
};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    // Read bind address from config before moving app_state
    let bind_addr = app_state.config.bind_addr;
    let cancellation_poll_secs = app_state.config.cancellation_poll_secs;
    let reconciliation_interval_secs = app_state.config.reconciliation_interval_secs;

    let subscriptions = app_state.subscription_use_cases.clone();
    let reconciliation = app_state.reconciliation_use_cases.clone();

    let app = create_app(app_state);

    // Spawn background workers (after tracing is initialized)
    tokio::spawn(async move {
        run_cancellation_loop(subscriptions, cancellation_poll_secs).await;
    });
    tokio::spawn(async move {
        run_reconciliation_loop(reconciliation, reconciliation_interval_secs).await;
    });

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Backend listening at {}", &listener.local_addr()?);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
