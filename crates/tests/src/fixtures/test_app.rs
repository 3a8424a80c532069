use mongodb::Database;
use resident_house_api::{build_router, state::AppState};
use resident_house_config::Settings;
use resident_house_db::indexes::ensure_indexes;
use std::net::SocketAddr;
use std::path::Path;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// A running test application with its own MongoDB database and storage root.
pub struct TestApp {
    pub addr: SocketAddr,
    pub base_url: String,
    pub db: Database,
    pub settings: Settings,
    pub client: reqwest::Client,
    storage_dir: TempDir,
}

impl TestApp {
    /// Spawn a new test server connected to the test MongoDB.
    ///
    /// Requires a running MongoDB at localhost:27017.
    /// Set RESIDENT__DATABASE__URL env var to override the connection string.
    /// Each test gets a unique database name for isolation.
    pub async fn spawn() -> Self {
        Self::spawn_with_settings(|_| {}).await
    }

    /// Spawn a test server with customized settings.
    ///
    /// The `mutator` closure receives a `&mut Settings` after test defaults are
    /// applied, allowing tests to tweak specific fields.
    pub async fn spawn_with_settings(mutator: impl FnOnce(&mut Settings)) -> Self {
        let db_name = format!("resident_house_test_{}", uuid::Uuid::new_v4().simple());
        let storage_dir = TempDir::new().expect("Failed to create storage dir");

        let mut settings = Settings::load().unwrap_or_else(|_| test_settings());
        // Allow env var override for database URL
        if let Ok(url) = std::env::var("RESIDENT__DATABASE__URL") {
            settings.database.url = url;
        }
        settings.database.name = db_name.clone();
        settings.storage.root_dir = storage_dir.path().to_string_lossy().into_owned();
        settings.auth.expose_reset_token = true;
        mutator(&mut settings);

        let db = resident_house_db::connect(&settings.database)
            .await
            .expect("Failed to connect to MongoDB");

        ensure_indexes(&db).await.expect("Failed to create indexes");

        let app_state = AppState::new(db.clone(), settings.clone());
        let app = build_router(app_state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let base_url = format!("http://{}", addr);
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            addr,
            base_url,
            db,
            settings,
            client,
            storage_dir,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn ws_url(&self, token: &str) -> String {
        format!("ws://{}/ws?token={}", self.addr, token)
    }

    /// Root directory of the object store.
    pub fn storage_root(&self) -> &Path {
        self.storage_dir.path()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let db = self.db.clone();
        // Best effort cleanup: drop the test database
        tokio::spawn(async move {
            let _ = db.drop().await;
        });
    }
}

fn test_settings() -> Settings {
    Settings {
        app: resident_house_config::AppSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        },
        database: resident_house_config::DatabaseSettings {
            url: "mongodb://localhost:27017".to_string(),
            name: "resident_house_test".to_string(),
            max_pool_size: Some(5),
            min_pool_size: Some(1),
            transactions: false,
        },
        jwt: resident_house_config::JwtSettings {
            secret: "test-secret-key-for-jwt-signing-minimum-32-chars".to_string(),
            access_token_ttl_secs: 3600,
            refresh_token_ttl_secs: 604800,
            reset_token_ttl_secs: 900,
            issuer: "resident-house".to_string(),
        },
        auth: resident_house_config::AuthSettings {
            min_password_len: 6,
            expose_reset_token: true,
        },
        storage: resident_house_config::StorageSettings {
            root_dir: String::new(),
            public_base_url: "/api/storage".to_string(),
        },
    }
}
