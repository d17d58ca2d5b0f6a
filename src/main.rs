use akash_faucet::handlers::render_index;
use akash_faucet::service::run_pruner;
use akash_faucet::{AppState, Args, CliWallet, FaucetService, SystemClock, app};
use anyhow::Context;
use clap::Parser; // for cli
use std::sync::Arc;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // parse cli arguments
    let args = Args::parse();

    let env_filter = if args.debug {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Some(dir) = &args.static_dir {
        anyhow::ensure!(dir.is_dir(), "static dir {} is not a directory", dir.display());
    }

    let wallet_config = args.wallet_config();
    let faucet_config = args.faucet_config();

    info!("Wallet: {} (sender {})", wallet_config.binary, wallet_config.sender);
    info!("Chain: {} via {}", wallet_config.chain.chain_id, wallet_config.chain.node);
    info!("Amount: {} ({})", faucet_config.amount_label, faucet_config.amount);
    info!(
        "Rate limit: 1 request per address per {} seconds",
        faucet_config.rate_window.as_secs()
    );
    info!("Max concurrent wallet processes: {}", faucet_config.max_concurrent);

    let index_html = render_index(&faucet_config, &wallet_config.chain.chain_id);
    let faucet = Arc::new(FaucetService::new(
        faucet_config,
        Arc::new(CliWallet::new(wallet_config)),
        Arc::new(SystemClock),
    ));

    // spawn the background sweeper
    tokio::spawn(run_pruner(faucet.clone(), args.prune_interval()));

    let state = Arc::new(AppState {
        faucet: faucet.clone(),
        index_html,
    });
    let router = app(state, args.static_dir.as_deref());

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Faucet running on http://localhost:{}", args.port);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // queued dispenses fail fast, running ones finish
            faucet.close();
        })
        .await?;

    info!("Shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received terminate signal"),
    }
}
