pub mod client;
pub mod migration;
pub mod models;
pub mod record_repository;

pub use client::PostgresClient;
pub use migration::MigrationRunner;
pub use record_repository::PostgresRecordRepository;
