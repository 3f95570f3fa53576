use std::env;
use std::fs;

use serial_test::serial;
use tempfile::TempDir;

use super::{Settings, load_config};

/// Run `f` with a fresh temporary directory as the current directory.
fn in_temp_dir<F: FnOnce()>(f: F) {
    let tmp = TempDir::new().expect("create tempdir");
    let orig = env::current_dir().expect("current_dir");
    env::set_current_dir(tmp.path()).expect("set current dir");
    f();
    env::set_current_dir(orig).expect("restore cwd");
}

#[test]
fn test_default_settings() {
    let settings = Settings::default();
    assert_eq!(settings.server.host, "127.0.0.1");
    assert_eq!(settings.server.port, 7070);
    assert_eq!(settings.server.path, "/events");
    assert_eq!(settings.server.addr(), "127.0.0.1:7070");
    assert_eq!(settings.client.url, "ws://127.0.0.1:7070/events");
    assert_eq!(settings.client.topic, "accounts");
    assert_eq!(settings.client.reconnect_delay_ms, 1000);
    assert_eq!(settings.client.connect_timeout_ms, 1000);
    assert_eq!(settings.log.level, "info");
}

#[test]
#[serial]
fn test_load_config_without_sources_uses_defaults() {
    in_temp_dir(|| {
        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.server.port, 7070);
        assert_eq!(cfg.client.topic, "accounts");
    });
}

#[test]
#[serial]
fn test_load_config_from_file_overrides_defaults() {
    in_temp_dir(|| {
        fs::create_dir_all("config").expect("create config dir");
        let toml = r#"
            [server]
            host = "0.0.0.0"
            port = 9000

            [client]
            topic = "vehicles"
            reconnect_delay_ms = 250
        "#;
        fs::write("config/default.toml", toml).expect("write config file");

        let cfg = load_config().expect("load_config failed");
        assert_eq!(cfg.server.host, "0.0.0.0");
        assert_eq!(cfg.server.port, 9000);
        // untouched keys keep their defaults
        assert_eq!(cfg.server.path, "/events");
        assert_eq!(cfg.client.topic, "vehicles");
        assert_eq!(cfg.client.reconnect_delay_ms, 250);
        assert_eq!(cfg.client.connect_timeout_ms, 1000);
        assert_eq!(cfg.log.level, "info");
    });
}

#[test]
#[serial]
fn test_env_overrides_file() {
    in_temp_dir(|| {
        fs::create_dir_all("config").expect("create config dir");
        fs::write("config/default.toml", "[server]\nport = 9000\n").expect("write config file");

        temp_env::with_vars(
            [
                ("PUBSUB_SERVER__PORT", Some("9100")),
                ("PUBSUB_CLIENT__URL", Some("ws://broker:9100/events")),
                ("PUBSUB_LOG__LEVEL", Some("debug")),
            ],
            || {
                let cfg = load_config().expect("load_config failed");
                assert_eq!(cfg.server.port, 9100);
                assert_eq!(cfg.client.url, "ws://broker:9100/events");
                assert_eq!(cfg.log.level, "debug");
                assert_eq!(cfg.server.host, "127.0.0.1");
            },
        );
    });
}
