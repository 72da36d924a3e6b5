mod client;
mod config;
mod inventory_store;

pub use client::PostgresClient;
pub use config::PostgresConfig;
pub use inventory_store::{quote_identifier, PostgresInventoryStore};
