//! Application Startup
//!
//! Opens the store and starts its background tasks.

use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;

use crate::config::Settings;
use crate::infrastructure::integrity::IntegrityCheckResult;
use crate::store::SqlStore;

/// How often pool statistics are published.
const POOL_STATS_INTERVAL: Duration = Duration::from_secs(30);

/// Application instance
pub struct Application {
    store: SqlStore,
    tasks: Vec<JoinHandle<()>>,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let store = SqlStore::open(&settings.sql).await?;
        tracing::info!(
            driver = %store.dialect(),
            master_connections = store.router().total_master_connections(),
            read_connections = store.router().total_read_connections(),
            search_connections = store.router().total_search_connections(),
            "Store ready"
        );

        let mut tasks = Vec::new();
        if let Some(handle) = store.router().spawn_replica_lag_monitor() {
            tracing::info!("Replica lag monitor started");
            tasks.push(handle);
        }
        tasks.push(spawn_pool_stats(store.clone()));

        if settings.sql.run_integrity_check_on_start {
            let (results, scan) = store.check_integrity();
            tasks.push(scan);
            tasks.push(tokio::spawn(report_integrity(results)));
        }

        Ok(Self { store, tasks })
    }

    pub fn store(&self) -> &SqlStore {
        &self.store
    }

    /// Run until interrupted, then close the pools.
    pub async fn run_until_stopped(self) -> Result<()> {
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown signal received");

        for task in &self.tasks {
            task.abort();
        }
        self.store.close().await;
        Ok(())
    }
}

fn spawn_pool_stats(store: SqlStore) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(POOL_STATS_INTERVAL);
        loop {
            ticker.tick().await;
            for stats in store.router().pool_stats() {
                tracing::trace!(pool = %stats.name, size = stats.size, idle = stats.idle, "Pool stats");
            }
        }
    })
}

async fn report_integrity(mut results: tokio::sync::mpsc::Receiver<IntegrityCheckResult>) {
    let mut orphans = 0;
    let mut failures = 0;
    while let Some(result) = results.recv().await {
        if result.err.is_some() {
            failures += 1;
        }
        orphans += result.data.records.len();
    }
    if orphans == 0 && failures == 0 {
        tracing::info!("Integrity check found no orphaned records");
    } else {
        tracing::warn!(orphans, failures, "Integrity check finished with findings");
    }
}
