pub mod codec;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod providers;
pub mod store;

pub use codec::SecretCodec;
pub use config::AiraConfig;
pub use dispatch::{list_models, resolve_model_identifier, Dispatcher};
pub use error::AiraError;
pub use providers::{ChatAdapter, Provider, ProviderRequest};
pub use store::{create_store, MemoryStore, PgStore, Store};
