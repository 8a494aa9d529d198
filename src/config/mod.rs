mod sync_config;

pub use sync_config::{ConfigError, RemoteTarget, SyncConfig, get_config_file_path};
