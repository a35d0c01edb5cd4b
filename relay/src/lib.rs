pub mod client;
pub mod config;
pub mod errors;
pub mod metrics_defs;
pub mod payload;
pub mod service;
pub mod track;

use shared::http::run_http_service;

use crate::client::HttpAnalyticsClient;
use crate::errors::RelayError;
use crate::service::RelayService;

/// Bind the listener and serve tracking requests until the process is
/// stopped.
pub async fn run(config: config::Config) -> Result<(), RelayError> {
    let client = HttpAnalyticsClient::new(config.vendor.clone());
    let service = RelayService::new(client);

    tracing::info!(
        host = %config.listener.host,
        port = config.listener.port,
        event_url = %config.vendor.event_url,
        "starting analytics relay"
    );

    run_http_service(&config.listener.host, config.listener.port, service).await
}
