use std::sync::Arc;

use crate::{
    auth::identity::IdentityService, config::AppConfig, store::DriveStore,
    storage::ObjectStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DriveStore>,
    pub storage: Arc<dyn ObjectStorage>,
    pub identity: IdentityService,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn DriveStore>,
        storage: Arc<dyn ObjectStorage>,
        identity: IdentityService,
    ) -> Self {
        Self {
            config: Arc::new(config),
            store,
            storage,
            identity,
        }
    }
}
