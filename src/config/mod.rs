mod settings;

use config::{Config, Environment, File};

use crate::utils::HubError;
use settings::PartialSettings;

pub use settings::{HubSettings, LogSettings, ServerSettings, Settings};

/// Default location of the optional configuration file, without extension.
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Loads the configuration from the default file and environment variables.
pub fn load_config() -> Result<Settings, HubError> {
    load_config_from(DEFAULT_CONFIG_PATH)
}

/// Loads the configuration from `path` (any format the `config` crate knows,
/// extension optional, file optional) and `HUBSUB_*` environment variables,
/// then merges the result with default values.
///
/// Environment keys use `__` between sections: `HUBSUB_SERVER__PORT=9000`,
/// `HUBSUB_HUB__SEND_BUFFER=128`.
pub fn load_config_from(path: &str) -> Result<Settings, HubError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix("HUBSUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}
