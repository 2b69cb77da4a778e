//! Database layer - connection pool and repositories

pub mod pharmacies;
pub mod pool;
pub mod requests;
pub mod responses;

pub use pharmacies::{PharmacyRepository, PharmacyWithDistance};
pub use pool::{
    ConnectionFactory, PgConnectionFactory, PgPool, PgPooledConnection, Pool, PoolConfig,
    PoolStatus, PooledConnection,
};
pub use requests::RequestRepository;
pub use responses::ResponseRepository;

/// Embedded migrations, applied at startup when enabled in state options.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
