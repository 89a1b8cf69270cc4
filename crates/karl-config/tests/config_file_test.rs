#![allow(clippy::unwrap_used)]
// Loading and saving config files on disk.

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::ExposeSecret;

use karl_config::{
    Config, DeviceEntry, KeySource, load_config_from, resolve_local_key, save_config_to,
};

const SAMPLE: &str = r#"
reconnect_delay = "12s"

[[devices]]
name = "Bedroom"
id = "bf0123456789abcdef"
key = "0123456789abcdef"

[[devices]]
name = "Office"
id = "bf9876543210fedcba"
key = "fedcba9876543210"
key_env = "KARL_CONFIG_FILE_TEST_UNSET"
"#;

#[test]
fn loads_devices_and_delay_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, SAMPLE).unwrap();

    let cfg = load_config_from(&path).unwrap();

    assert_eq!(cfg.reconnect_delay().unwrap(), Duration::from_secs(12));
    assert_eq!(cfg.defaults.output, "table");
    assert_eq!(cfg.devices.len(), 2);
    assert_eq!(cfg.devices[1].key_env.as_deref(), Some("KARL_CONFIG_FILE_TEST_UNSET"));

    let devices = cfg.device_configs().unwrap();
    assert_eq!(devices[0].id, "bf0123456789abcdef");
    assert_eq!(devices[0].name, "Bedroom");
    assert_eq!(devices[1].local_key.expose_secret(), "fedcba9876543210");
}

#[test]
fn missing_file_yields_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
    assert!(cfg.devices.is_empty());
    assert_eq!(cfg.reconnect_delay, "5s");
}

#[test]
fn malformed_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "devices = 3").unwrap();

    assert!(load_config_from(&path).is_err());
}

#[test]
fn saved_config_loads_back() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let mut cfg = Config::default();
    cfg.devices.push(DeviceEntry {
        name: "Living room".into(),
        id: "bfaaaa".into(),
        key: Some("aaaabbbbccccdddd".into()),
        key_env: None,
    });
    save_config_to(&cfg, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[[devices]]"));
    assert!(!text.contains("key_env"));

    let loaded = load_config_from(&path).unwrap();
    assert_eq!(loaded, cfg);

    let (_, source) = resolve_local_key(&loaded.devices[0]).unwrap();
    assert_eq!(source, KeySource::Plaintext);
}
