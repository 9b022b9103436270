//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::AuthProbe;
use crate::bus::BusClient;
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub bus: Arc<dyn BusClient>,
    pub probe: Arc<dyn AuthProbe>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(bus: Arc<dyn BusClient>, probe: Arc<dyn AuthProbe>, config: AppConfig) -> Self {
        Self {
            bus,
            probe,
            config: Arc::new(config),
        }
    }
}
