pub mod cds;
pub mod config;
pub mod error;
pub mod logging;
pub mod platform;
pub mod ssdp;
pub mod watcher;
pub mod web;

pub mod state {
    use crate::cds::clients::ClientManager;
    use crate::cds::service::CdsService;
    use crate::cds::storage::StorageBackend;
    use crate::cds::subscription::SubscriptionBus;
    use crate::cds::transcode::TranscodeDispatcher;
    use crate::{config::AppConfig, platform::PlatformInfo};
    use std::sync::Arc;

    #[derive(Clone)]
    pub struct AppState {
        pub config: Arc<AppConfig>,
        pub platform_info: Arc<PlatformInfo>,
        pub storage: Arc<dyn StorageBackend>,
        pub subscriptions: Arc<SubscriptionBus>,
        pub clients: Arc<ClientManager>,
        pub transcode: Arc<TranscodeDispatcher>,
        pub service: Arc<CdsService>,
    }
}
