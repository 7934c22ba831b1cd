use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use opendlna::cds::autoscan::AutoscanScheduler;
use opendlna::cds::clients::{ClientManager, ClientProfile};
use opendlna::cds::gena::HttpNotifySink;
use opendlna::cds::importer::Importer;
use opendlna::cds::service::CdsService;
use opendlna::cds::storage::sqlite::SqliteStorage;
use opendlna::cds::storage::StorageBackend;
use opendlna::cds::subscription::SubscriptionBus;
use opendlna::cds::transcode::TranscodeDispatcher;
use opendlna::config::AppConfig;
use opendlna::logging::init_logging;
use opendlna::platform::filesystem::create_platform_filesystem_manager;
use opendlna::platform::PlatformInfo;
use opendlna::state::AppState;
use opendlna::watcher::integration::WatcherIntegration;
use opendlna::watcher::CrossPlatformWatcher;
use opendlna::{ssdp, web};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging().context("Failed to initialize logging")?;

    let config = Arc::new(AppConfig::from_args().await?);
    let platform_info = Arc::new(PlatformInfo::detect().await.context("Failed to detect platform")?);

    info!("Starting {} ({})", config.server.name, config.server.uuid);
    info!("Media directory: {}", config.get_primary_media_dir().display());

    let storage: Arc<dyn StorageBackend> = Arc::new(
        SqliteStorage::new(&config.get_database_path(), true)
            .await
            .context("Failed to open database")?,
    );

    let notify_sink = Arc::new(HttpNotifySink::new());
    let subscriptions = Arc::new(SubscriptionBus::new(storage.clone(), notify_sink).await);

    let client_profiles: Vec<ClientProfile> = config.clients.iter().map(ClientProfile::from_config).collect();
    let clients = Arc::new(ClientManager::new(storage.clone(), client_profiles));
    clients.reload_observations().await;

    let transcode = Arc::new(TranscodeDispatcher::new(config.transcoding.clone()));
    let service = Arc::new(CdsService::new(storage.clone(), subscriptions.clone(), config.presentation.clone()));

    let filesystem = Arc::from(create_platform_filesystem_manager());
    let importer = Arc::new(Importer::new(filesystem, storage.clone(), subscriptions.clone()));

    let scan_dirs: Vec<std::path::PathBuf> =
        config.media.directories.iter().map(|d| std::path::PathBuf::from(&d.path)).collect();

    if config.media.scan_on_startup {
        for dir in &scan_dirs {
            match importer.scan(dir).await {
                Ok(changed) => info!(path = %dir.display(), containers_touched = changed.upnp.len(), "startup media scan complete"),
                Err(e) => tracing::warn!(path = %dir.display(), error = %e, "startup media scan failed"),
            }
        }
    }

    let autoscan = AutoscanScheduler::new(importer.clone(), storage.clone());
    let mut watch_roots = autoscan.start(&config.autoscan).await;

    if config.media.watch_for_changes {
        watch_roots.extend(scan_dirs.iter().cloned());
        watch_roots.sort();
        watch_roots.dedup();

        let watcher = Arc::new(CrossPlatformWatcher::new());
        let watcher_integration = Arc::new(WatcherIntegration::new(importer.clone(), watcher));
        watcher_integration.start(&watch_roots).await.context("Failed to start filesystem watcher")?;
    }

    let app_state = AppState {
        config: config.clone(),
        platform_info,
        storage,
        subscriptions,
        clients,
        transcode,
        service,
    };

    ssdp::run_ssdp_service(app_state.clone()).context("Failed to start SSDP service")?;

    let app = web::create_router(app_state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .await
        .context("HTTP server failed")?;

    Ok(())
}
