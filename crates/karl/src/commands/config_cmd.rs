//! Config subcommand handlers.

use std::io::BufRead;

use secrecy::SecretString;

use karl_config::{Config, DeviceEntry, KEYRING_SERVICE, save_config_to, store_local_key};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Copy of `cfg` with every plaintext key replaced by a marker.
fn redacted(cfg: &Config) -> Config {
    let mut shown = cfg.clone();
    for device in &mut shown.devices {
        if device.key.is_some() {
            device.key = Some("****".into());
        }
    }
    shown
}

fn starter(name: String, id: String, key_env: String) -> Config {
    Config {
        devices: vec![DeviceEntry {
            name,
            id,
            key: None,
            key_env: Some(key_env),
        }],
        ..Config::default()
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color_mode());

    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path(global).display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load(global)?;
            let shown = redacted(&cfg);
            let out = output::render_single(&global.output_format(), &shown, |c| {
                toml::to_string_pretty(c).unwrap_or_else(|e| format!("serialization failed: {e}"))
            });
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            name,
            id,
            key_env,
            force,
        } => {
            let path = config::config_path(global);
            if path.exists() && !force {
                return Err(CliError::Conflict {
                    resource_type: "config file".into(),
                    identifier: path.display().to_string(),
                });
            }

            let cfg = starter(name, id, key_env);
            cfg.validate()?;
            save_config_to(&cfg, &path)?;
            output::print_status(
                &format!("Wrote {}", path.display()),
                color,
                global.quiet,
            );
            Ok(())
        }

        ConfigCommand::SetKey { device } => {
            let cfg = config::load(global)?;
            let entry = cfg.device(&device).ok_or_else(|| CliError::NotFound {
                resource_type: "device".into(),
                identifier: device.clone(),
                list_command: "devices".into(),
            })?;

            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            let key = SecretString::from(line.trim().to_owned());

            store_local_key(&entry.id, &key)?;
            output::print_status(
                &format!("Stored local key for '{}' in keyring '{KEYRING_SERVICE}'", entry.name),
                color,
                global.quiet,
            );
            Ok(())
        }
    }
}
