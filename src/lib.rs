pub mod config;
pub mod config_store;
pub mod daemon;
pub mod domains;
pub mod error;
pub mod ids;
pub mod interfaces;
pub mod providers;
pub mod services;
pub mod store;

pub use crate::config::Config;
pub use crate::error::{AiRegistryError, Result};
pub use crate::services::registry::AiRegistry;
pub use crate::store::AiStore;
