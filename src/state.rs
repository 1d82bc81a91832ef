use std::sync::Arc;

use crate::{
    config::Config, controller::HttpGateController, events::EventBus, gates::GateService,
    store::{GateStore, RedisGateStore},
};

#[derive(Clone)]
pub struct AppState {
    pub gates: Arc<GateService>,
    pub events: Arc<EventBus>,
}

impl AppState {
    pub async fn new(config: &Config) -> Self {
        let store: Arc<dyn GateStore> = Arc::new(RedisGateStore::connect(&config.redis_url).await);
        let controller = Arc::new(HttpGateController::with_timeout(
            &config.gate_controller_url,
            config.gate_controller_timeout,
        ));

        Self {
            gates: Arc::new(GateService::new(store, controller)),
            events: Arc::new(EventBus::new()),
        }
    }
}
