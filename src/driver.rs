//! Echo load driver.
//!
//! Launches every worker up front, then blocks on a completion channel until
//! one unit signal per worker has arrived.

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::client::run_worker;
use crate::config::Config;
use crate::payload::SeedSource;

/// Sends the worker's completion signal when dropped.
///
/// Dropping covers every exit path, panics included.
struct CompletionGuard {
    tx: mpsc::Sender<()>,
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // Channel capacity equals the worker count, so this never sees `Full`.
        let _ = self.tx.try_send(());
    }
}

/// Run `config.clients` echo workers against the configured target.
///
/// Returns the number of completion signals observed, which equals the
/// number of workers launched.
pub async fn run(config: &Config) -> usize {
    run_with_seeds(config, SeedSource::from_time()).await
}

/// Same as [`run`], drawing worker generators from `seeds`.
pub async fn run_with_seeds(config: &Config, seeds: SeedSource) -> usize {
    let clients = config.clients;
    let target: Arc<str> = config.target().into();
    let started = Instant::now();

    info!(address = %target, clients, "Launching echo clients");

    // mpsc::channel panics on zero capacity
    let (tx, mut rx) = mpsc::channel::<()>(clients.max(1));

    for id in 0..clients {
        let guard = CompletionGuard { tx: tx.clone() };
        let target = Arc::clone(&target);
        let rng = seeds.worker_rng(id);

        tokio::spawn(async move {
            let _guard = guard;
            run_worker(id, &target, rng).await;
        });
    }
    drop(tx);

    let mut completed = 0;
    while completed < clients {
        match rx.recv().await {
            Some(()) => completed += 1,
            None => {
                warn!(completed, clients, "Completion channel closed early");
                break;
            }
        }
    }

    info!(
        completed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "All echo clients finished"
    );

    completed
}
