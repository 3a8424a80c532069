use bson::{Document, doc};
use mongodb::{Client, Database, options::ClientOptions};
use resident_house_config::DatabaseSettings;
use thiserror::Error;
use tracing::info;

const APP_NAME: &str = "resident-house";

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
    #[error("database.transactions is enabled but the server at {0} is standalone; transactions need a replica set or a sharded cluster")]
    TransactionsUnsupported(String),
}

/// Deployment shape reported by the server's `hello` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topology {
    Standalone,
    ReplicaSet(String),
    Sharded,
}

impl Topology {
    fn from_hello(reply: &Document) -> Self {
        if reply.get_str("msg") == Ok("isdbgrid") {
            return Topology::Sharded;
        }
        match reply.get_str("setName") {
            Ok(name) => Topology::ReplicaSet(name.to_string()),
            Err(_) => Topology::Standalone,
        }
    }

    pub fn supports_transactions(&self) -> bool {
        !matches!(self, Topology::Standalone)
    }
}

/// Opens the pool, greets the server through the app database and refuses
/// to start with transactional sends on a standalone server.
pub async fn connect(settings: &DatabaseSettings) -> Result<Database, ConnectError> {
    let mut client_options = ClientOptions::parse(&settings.url).await?;
    client_options.app_name = Some(APP_NAME.to_string());
    if let Some(max_pool) = settings.max_pool_size {
        client_options.max_pool_size = Some(max_pool);
    }
    if let Some(min_pool) = settings.min_pool_size {
        client_options.min_pool_size = Some(min_pool);
    }
    let hosts = client_options
        .hosts
        .iter()
        .map(|host| host.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let client = Client::with_options(client_options)?;
    let db = client.database(&settings.name);

    let hello = db.run_command(doc! { "hello": 1 }).await?;
    let topology = Topology::from_hello(&hello);
    if settings.transactions && !topology.supports_transactions() {
        return Err(ConnectError::TransactionsUnsupported(hosts));
    }

    info!(
        db = %settings.name,
        %hosts,
        ?topology,
        transactions = settings.transactions,
        "Connected to MongoDB"
    );
    Ok(db)
}
