pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod reconcile;
pub mod status;
pub mod workspace;

use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber. Safe to call more than once; later
/// calls are ignored.
pub fn init_tracing() {
    let result = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    if result.is_ok() {
        tracing::info!("{} v{} starting", config::APP_NAME, config::APP_VERSION);
    }
}
