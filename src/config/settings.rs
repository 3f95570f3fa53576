use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Includes settings for the broker server, the clients and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub client: ClientSettings,
    pub log: LogSettings,
}

/// Configuration settings for the server.
///
/// Defines the host and port the server will bind to and the path clients
/// are expected to connect on.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub path: String,
}

impl ServerSettings {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration settings shared by the producing and consuming clients.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientSettings {
    pub url: String,
    pub topic: String,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values are filled from
/// the defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub client: Option<PartialClientSettings>,
    pub log: Option<PartialLogSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialClientSettings {
    pub url: Option<String>,
    pub topic: Option<String>,
    pub reconnect_delay_ms: Option<u64>,
    pub connect_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLogSettings {
    pub level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 7070,
                path: "/events".to_string(),
            },
            client: ClientSettings {
                url: "ws://127.0.0.1:7070/events".to_string(),
                topic: "accounts".to_string(),
                reconnect_delay_ms: 1000,
                connect_timeout_ms: 1000,
            },
            log: LogSettings {
                level: "info".to_string(),
            },
        }
    }
}
