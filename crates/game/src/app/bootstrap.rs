use engine::{resolve_app_paths, LoopConfig, Scene, StartupError};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{
    self, load_tuning, CatalogError, FileProgressStorage, RoomCatalog, TUNING_FILE_NAME,
};

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<dyn Scene>,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("room catalog is invalid: {0}")]
    Catalog(#[from] CatalogError),
}

pub(crate) fn build_app() -> Result<AppWiring, BootstrapError> {
    init_tracing();
    info!("=== Cavern Relay Startup ===");

    let paths = resolve_app_paths()?;
    info!(
        root = %paths.root.display(),
        save_dir = %paths.save_dir.display(),
        "paths_resolved"
    );

    let tuning = load_tuning(&paths.assets_dir.join(TUNING_FILE_NAME));
    let catalog = RoomCatalog::builtin()?;
    info!(
        rooms = catalog.registered_room_count(),
        ids = ?catalog.room_ids().collect::<Vec<_>>(),
        "room_catalog_ready"
    );

    let storage = Box::new(FileProgressStorage::in_dir(&paths.save_dir));
    let scene = gameplay::build_scene(tuning, catalog, storage);

    Ok(AppWiring {
        config: LoopConfig::default(),
        scene,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}
