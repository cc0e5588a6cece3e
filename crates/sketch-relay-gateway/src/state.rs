//! Gateway shared state.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use sketch_relay_core::config::Config;
use sketch_relay_rooms::{Relay, RelayHandle, RelaySettings};

/// Shared gateway state accessible from all connections and handlers.
pub struct GatewayState {
    pub config: Arc<Config>,
    pub relay: RelayHandle,
    pub started_at: DateTime<Utc>,
    #[cfg(feature = "metrics")]
    pub prometheus: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(config: Arc<Config>, relay: RelayHandle) -> Self {
        Self {
            config,
            relay,
            started_at: Utc::now(),
            #[cfg(feature = "metrics")]
            prometheus: None,
        }
    }

    /// Spawn a relay configured from `config` and wrap it in gateway state.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_relay(config: Config) -> Self {
        let relay = Relay::spawn(RelaySettings::from(&config));
        Self::new(Arc::new(config), relay)
    }

    #[cfg(feature = "metrics")]
    pub fn with_prometheus(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
