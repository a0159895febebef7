mod schema;
pub mod queries;

pub use schema::init_db;

use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::config::GatewaySettings;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Application state holding the order store pool and gateway configuration.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    /// Gateway credentials, resolved once at startup (no global settings)
    pub gateway: GatewaySettings,
    /// Base URL for checkout success/cancel redirects
    pub base_url: String,
}

/// Upper bound on how long a connection waits for a locked database.
/// Store I/O must never block a webhook delivery indefinitely.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn create_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path)
        .with_init(|conn| conn.busy_timeout(BUSY_TIMEOUT));
    Pool::builder().max_size(10).build(manager)
}
