use mongodb::Database;
use resident_house_config::Settings;
use resident_house_services::{
    AuthService, ChangeFeed, LocalObjectStore, ObjectStore,
    dao::{
        bulletin::BulletinDao, chat::ChatDao, log::{PackageLogDao, VisitorLogDao},
        user::UserDao,
    },
};
use std::sync::Arc;

use crate::ws::storage::WsStorage;

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub settings: Settings,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserDao>,
    pub chats: Arc<ChatDao>,
    pub visitors: Arc<VisitorLogDao>,
    pub packages: Arc<PackageLogDao>,
    pub bulletin: Arc<BulletinDao>,
    pub storage: Arc<dyn ObjectStore>,
    pub feed: Arc<ChangeFeed>,
    pub ws_storage: Arc<WsStorage>,
}

impl AppState {
    pub fn new(db: Database, settings: Settings) -> Self {
        let storage: Arc<dyn ObjectStore> = Arc::new(LocalObjectStore::new(
            settings.storage.root_dir.clone(),
            &settings.storage.public_base_url,
        ));
        Self::with_storage(db, settings, storage)
    }

    /// Same as [`AppState::new`] with a caller-provided object store.
    pub fn with_storage(db: Database, settings: Settings, storage: Arc<dyn ObjectStore>) -> Self {
        let auth = Arc::new(AuthService::new(settings.jwt.clone(), settings.auth.clone()));
        let users = Arc::new(UserDao::new(&db));
        let chats = Arc::new(ChatDao::new(&db, settings.database.transactions));
        let visitors = Arc::new(VisitorLogDao::new(&db));
        let packages = Arc::new(PackageLogDao::new(&db));
        let bulletin = Arc::new(BulletinDao::new(&db));
        let feed = Arc::new(ChangeFeed::new());
        let ws_storage = Arc::new(WsStorage::new());

        Self {
            db,
            settings,
            auth,
            users,
            chats,
            visitors,
            packages,
            bulletin,
            storage,
            feed,
            ws_storage,
        }
    }
}
