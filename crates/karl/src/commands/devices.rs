//! Device listing.

use serde::Serialize;
use tabled::Tabled;

use karl_config::{Config, DeviceEntry, resolve_local_key};
use karl_core::accessory_uuid;

use crate::cli::GlobalOpts;
use crate::config;
use crate::error::CliError;
use crate::output;

// ── Listing model ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct DeviceSummary {
    name: String,
    id: String,
    accessory_uuid: String,
    /// `env`, `keyring`, `config`, or `missing`.
    key_source: String,
}

impl From<&DeviceEntry> for DeviceSummary {
    fn from(d: &DeviceEntry) -> Self {
        let key_source = resolve_local_key(d)
            .map_or_else(|_| "missing".to_owned(), |(_, source)| source.to_string());
        Self {
            name: d.name.clone(),
            id: d.id.clone(),
            accessory_uuid: accessory_uuid(&d.id).to_string(),
            key_source,
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Accessory UUID")]
    uuid: String,
    #[tabled(rename = "Key")]
    key: String,
}

impl From<&DeviceSummary> for DeviceRow {
    fn from(d: &DeviceSummary) -> Self {
        Self {
            name: d.name.clone(),
            id: d.id.clone(),
            uuid: d.accessory_uuid.clone(),
            key: d.key_source.clone(),
        }
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg: Config = config::load(global)?;
    let summaries: Vec<DeviceSummary> = cfg.devices.iter().map(DeviceSummary::from).collect();

    let out = output::render_list(
        &global.output_format(),
        &summaries,
        |d| DeviceRow::from(d),
        |d| d.id.clone(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
