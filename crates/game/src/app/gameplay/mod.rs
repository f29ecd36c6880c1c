mod bullets;
mod camera;
mod enemy;
mod hud;
mod physics;
mod player;
mod progress;
mod room_loader;
mod rooms;
mod scene_impl;
mod session;
mod tuning;

use std::sync::Arc;

use engine::Scene;

pub(crate) use progress::{FileProgressStorage, ProgressStorage};
pub(crate) use rooms::{CatalogError, RoomCatalog};
pub(crate) use tuning::{load_tuning, TUNING_FILE_NAME};

use enemy::CrawlerFactory;
use progress::ProgressStore;
use scene_impl::CavernScene;
use session::GameSession;
use tuning::Tuning;

/// Wires the long-lived services together and hands the engine its scene.
pub(crate) fn build_scene(
    tuning: Tuning,
    catalog: RoomCatalog,
    storage: Box<dyn ProgressStorage>,
) -> Box<dyn Scene> {
    let progress = ProgressStore::load(storage);
    let factory = Box::new(CrawlerFactory::new(&tuning));
    let session = GameSession::new(tuning, Arc::new(catalog), progress, factory);
    Box::new(CavernScene::new(session))
}
