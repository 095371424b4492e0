use std::sync::Arc;

use crate::config::Config;
use crate::gateway::PaymentGateway;
use crate::store::Store;

/// Shared handles every handler receives.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PaymentGateway>, config: Config) -> Self {
        Self {
            store,
            gateway,
            config: Arc::new(config),
        }
    }
}
