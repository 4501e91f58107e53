mod seed;
mod store_config;

pub use seed::SeedNode;
pub use store_config::{StoreConfig, StoreConfigError};
