mod settings;

pub use settings::{DispatchConfig, GatewayConfig, Settings, StorageConfig};
