//! Database layer
//!
//! Supports SQLite (default) and MySQL behind the `DatabasePool` trait, so
//! repositories and services never need to know which backend is configured.
//!
//! # Usage
//!
//! ```ignore
//! use tagpress::config::DatabaseConfig;
//! use tagpress::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
