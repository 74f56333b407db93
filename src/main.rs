use clap::Parser;
use intake_gateway::config::{Args, FormsConfig};
use intake_gateway::handlers::router;
use intake_gateway::policy::FormPolicies;
use intake_gateway::reclaimer::Reclaimer;
use intake_gateway::state::AppState;
use intake_gateway::submission::TracingSink;
use intake_gateway::visitor::VisitorStore;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let forms = FormsConfig::load(&args.forms_config)?;
    let policies = Arc::new(FormPolicies::new(forms));

    // One store for the process, shared by admission, introspection and the reclaimer
    let store = Arc::new(VisitorStore::new());
    let reclaimer = Reclaimer::new(Arc::clone(&store), args.reclaim_interval(), args.idle_threshold()).spawn();

    if args.admin_token.is_none() {
        tracing::warn!("No admin token configured; admin endpoints are disabled");
    }
    let state = Arc::new(AppState::new(
        store,
        policies,
        Arc::new(TracingSink),
        args.admin_token.clone(),
    ));
    let app = router(state);

    let addr = format!("{}:{}", args.bind, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "Gateway listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reclaimer.shutdown().await;
    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
