//! CLI wrappers over `karl_config`: honour `--config` and resolve the
//! device set a command operates on.

use std::path::PathBuf;

use clap::ValueEnum;
use secrecy::SecretString;

use karl_config::Config;
use karl_core::DeviceConfig;

use crate::cli::{ColorMode, GlobalOpts, OutputFormat};
use crate::error::CliError;

/// Id of the stand-in device used when no devices are configured.
pub const DEMO_DEVICE_ID: &str = "karl-demo";

/// Config file path: `--config` / `KARL_CONFIG`, else the platform default.
pub fn config_path(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(karl_config::config_path)
}

/// Load and validate the config selected by the global flags.
pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = karl_config::load_config_from(&config_path(global))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Fill `--output` and `--color` from the config's `[defaults]` when the
/// flags were not given.
///
/// An unreadable config leaves the built-in defaults in place; the command
/// that needs the file reports the problem itself.
pub fn apply_defaults(global: &mut GlobalOpts) -> Result<(), CliError> {
    let Ok(cfg) = karl_config::load_config_from(&config_path(global)) else {
        return Ok(());
    };
    if global.output.is_none() {
        global.output = Some(parse_default::<OutputFormat>(
            "defaults.output",
            &cfg.defaults.output,
        )?);
    }
    if global.color.is_none() {
        global.color = Some(parse_default::<ColorMode>(
            "defaults.color",
            &cfg.defaults.color,
        )?);
    }
    Ok(())
}

fn parse_default<T: ValueEnum>(field: &str, value: &str) -> Result<T, CliError> {
    T::from_str(value, true).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!(
            "unknown value '{value}', expected one of: {}",
            T::value_variants()
                .iter()
                .filter_map(|v| v.to_possible_value())
                .map(|v| v.get_name().to_owned())
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

/// Resolve the devices to bridge, optionally narrowed to one name or id.
///
/// Falls back to a single demo device when none are configured.
pub fn select_devices(cfg: &Config, only: Option<&str>) -> Result<Vec<DeviceConfig>, CliError> {
    if let Some(wanted) = only {
        let entry = cfg.device(wanted).ok_or_else(|| CliError::NotFound {
            resource_type: "device".into(),
            identifier: wanted.into(),
            list_command: "devices".into(),
        })?;
        return Ok(vec![karl_config::device_config(entry)?]);
    }

    if cfg.devices.is_empty() {
        tracing::info!("no devices configured, using a demo device");
        return Ok(vec![demo_device()]);
    }

    Ok(cfg.device_configs()?)
}

fn demo_device() -> DeviceConfig {
    DeviceConfig::new(
        DEMO_DEVICE_ID,
        "Karl (demo)",
        SecretString::from("0000000000000000"),
    )
}
