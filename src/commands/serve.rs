//! `serve`: HTTP surface plus the periodic ingestion trigger.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::Runtime;
use crate::config::Config;
use crate::scheduler::Scheduler;
use crate::server::{self, AppState};
use crate::{Error, Result};

pub async fn run(config: Config) -> Result<()> {
    info!("🚀 Starting up Insider Graph backend...");

    let addr: SocketAddr = config
        .server
        .addr
        .parse()
        .map_err(|e| Error::Config(format!("invalid server.addr {}: {}", config.server.addr, e)))?;

    let runtime = Runtime::connect(config).await?;
    let greeting = runtime.store.ping().await?;
    info!(response = %greeting, "✅ Graph store verified");

    let ingestion = runtime.feed_ingestion()?;
    let state = Arc::new(AppState {
        store: runtime.store.clone(),
        qa: runtime.qa()?,
        ingestion: ingestion.clone(),
        graph_export_limit: runtime.config.server.graph_export_limit,
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler = if runtime.config.scheduler.enabled {
        Some(Scheduler::new(ingestion, &runtime.config.scheduler).spawn(shutdown_rx.clone()))
    } else {
        info!("Scheduler disabled");
        None
    };

    let mut server = tokio::spawn(server::serve(addr, state, shutdown_rx));

    let server_result = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("🛑 Shutting down...");
            let _ = shutdown_tx.send(true);
            (&mut server).await
        }
        finished = &mut server => {
            warn!("HTTP server exited");
            let _ = shutdown_tx.send(true);
            finished
        }
    };

    if let Some(handle) = scheduler {
        if let Err(e) = handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
    }

    // The scheduler has drained its runs; release the store connection.
    drop(runtime);

    server_result.map_err(|e| Error::Io(std::io::Error::other(e)))?
}
