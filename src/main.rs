use std::sync::Arc;

use mailbridge::config::Config;
use mailbridge::dispatch::ProcessDispatcher;
use mailbridge::identity::{FileIdentityStore, IdentityStore};
use mailbridge::outbound::ResendClient;
use mailbridge::pipeline::MailPipeline;
use mailbridge::server::{self, AppState};
use mailbridge::session::FileSessionRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // Config is loaded once; invalid config is fatal.
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    eprintln!("📬 Mail Bridge v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Receive: AgentMail webhook | Send: Resend");
    eprintln!("   From: {}", config.from_address);
    eprintln!("   Agent: {}", config.agent_bin);

    let identities = Arc::new(FileIdentityStore::new(config.identity_links_path.clone()));

    // Show who is linked at startup, the one time the table is read outside
    // a resolution call.
    let linked: Vec<String> = identities
        .load()
        .await
        .into_iter()
        .map(|(identity, _)| identity)
        .collect();
    eprintln!(
        "   Linked identities: {}",
        if linked.is_empty() {
            "(none)".to_string()
        } else {
            linked.join(", ")
        }
    );

    let pipeline = MailPipeline::new(
        identities,
        Arc::new(FileSessionRegistry::new(
            config.session_registry_path.clone(),
        )),
        Arc::new(ProcessDispatcher::new(config.agent_bin.clone())),
        Arc::new(ResendClient::new(
            config.resend_api_key.clone(),
            config.from_address.clone(),
        )),
        config.signature.clone(),
    );

    let app = server::routes(AppState {
        pipeline: Arc::new(pipeline),
        from_address: config.from_address.clone(),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    eprintln!("   Webhook: http://0.0.0.0:{}/webhook", config.port);
    eprintln!("   Health:  http://0.0.0.0:{}/health\n", config.port);

    tracing::info!(port = config.port, "Mail bridge started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Mail bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
