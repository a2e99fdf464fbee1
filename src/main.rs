//! # Chat Store
//!
//! Runs the persistence layer on its own: connects every pool, applies
//! migrations and schema fixups, then keeps the replica lag monitor and the
//! optional integrity check running until interrupted.
//!
//! Fatal schema or connection errors exit with a code distinct per failure
//! category.

use std::time::Duration;

use anyhow::Result;
use tracing::{error, info};

use chat_store::config::Settings;
use chat_store::infrastructure::database::SchemaError;
use chat_store::startup::Application;

/// Time given to the log writer before a fatal exit.
const LOG_FLUSH_DELAY: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment and config files
    let settings = Settings::load()?;

    // Initialize tracing subscriber for structured logging
    chat_store::telemetry::init_tracing(&settings.log_format);

    info!(
        driver = %settings.sql.driver_name,
        replicas = settings.sql.data_source_replicas.len(),
        search_replicas = settings.sql.data_source_search_replicas.len(),
        environment = %settings.environment,
        "Configuration loaded"
    );

    let application = match Application::build(settings).await {
        Ok(application) => application,
        Err(e) => match e.downcast_ref::<SchemaError>() {
            Some(fatal) => {
                let code = fatal.exit_code();
                error!(kind = %fatal.kind, exit_code = code, error = ?e, "Fatal store initialization error");
                tokio::time::sleep(LOG_FLUSH_DELAY).await;
                std::process::exit(code);
            }
            None => return Err(e),
        },
    };

    info!("Store running");
    application.run_until_stopped().await?;

    Ok(())
}
