mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{ClientSettings, LogSettings, ServerSettings, Settings};

/// Prefix of the environment variables read by `load_config`,
/// e.g. `PUBSUB_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "PUBSUB";

/// Loads the configuration from the optional `config/default` file and
/// `PUBSUB_*` environment variables, the latter taking precedence.
/// Values that are not given anywhere fall back to `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();
    let server = partial.server;
    let client = partial.client;
    let log = partial.log;

    Ok(Settings {
        server: ServerSettings {
            host: server
                .as_ref()
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server
                .as_ref()
                .and_then(|s| s.port)
                .unwrap_or(default.server.port),
            path: server
                .as_ref()
                .and_then(|s| s.path.clone())
                .unwrap_or(default.server.path),
        },
        client: ClientSettings {
            url: client
                .as_ref()
                .and_then(|c| c.url.clone())
                .unwrap_or(default.client.url),
            topic: client
                .as_ref()
                .and_then(|c| c.topic.clone())
                .unwrap_or(default.client.topic),
            reconnect_delay_ms: client
                .as_ref()
                .and_then(|c| c.reconnect_delay_ms)
                .unwrap_or(default.client.reconnect_delay_ms),
            connect_timeout_ms: client
                .as_ref()
                .and_then(|c| c.connect_timeout_ms)
                .unwrap_or(default.client.connect_timeout_ms),
        },
        log: LogSettings {
            level: log
                .and_then(|l| l.level)
                .unwrap_or(default.log.level),
        },
    })
}

#[cfg(test)]
mod tests;
