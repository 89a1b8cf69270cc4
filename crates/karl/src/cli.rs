//! Clap derive structures for the `karl` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// karl -- bridge Stadler Form Karl humidifiers to a smart-home host
#[derive(Debug, Parser)]
#[command(
    name = "karl",
    version,
    about = "Bridge Stadler Form Karl humidifiers to a smart-home host",
    long_about = "Inspect the configured Karl humidifiers, manage the bridge \
        configuration, and exercise the full translation and reconnect \
        pipeline against simulated appliances.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "KARL_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format [default: table, or `defaults.output` from the config]
    #[arg(long, short = 'o', env = "KARL_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output [default: auto, or `defaults.color` from the config]
    #[arg(long, global = true)]
    pub color: Option<ColorMode>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

impl GlobalOpts {
    /// Selected output format, `table` when neither flag nor config set one.
    pub fn output_format(&self) -> OutputFormat {
        self.output.clone().unwrap_or(OutputFormat::Table)
    }

    /// Selected color mode, `auto` when neither flag nor config set one.
    pub fn color_mode(&self) -> ColorMode {
        self.color.clone().unwrap_or(ColorMode::Auto)
    }
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List configured humidifiers
    #[command(alias = "dev", alias = "d")]
    Devices,

    /// Run the bridge against simulated appliances
    #[command(alias = "sim")]
    Simulate(SimulateArgs),

    /// Manage the bridge configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SIMULATE
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Host-side write to apply, e.g. target-humidity=60 (repeatable)
    #[arg(long = "set", value_name = "PROPERTY=VALUE")]
    pub sets: Vec<String>,

    /// Only bridge this device (name or id)
    #[arg(long, short = 'd')]
    pub device: Option<String>,

    /// Device report to push after the writes, as a JSON envelope such as
    /// '{"dps":{"14":52}}' (repeatable)
    #[arg(long = "report", value_name = "JSON")]
    pub reports: Vec<String>,

    /// Drop every link once and wait for the session to reconnect
    #[arg(long)]
    pub drop_link: bool,

    /// Override the configured reconnect delay (e.g. 250ms, 5s)
    #[arg(long, value_name = "DURATION")]
    pub reconnect_delay: Option<String>,

    /// How long to let reports settle before printing (e.g. 200ms)
    #[arg(long, value_name = "DURATION", default_value = "200ms")]
    pub settle: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display current resolved configuration (keys redacted)
    Show,

    /// Write a starter config file
    Init {
        /// Device name shown by the host
        #[arg(long, default_value = "Karl")]
        name: String,

        /// Device id from the vendor app
        #[arg(long, default_value = "your-device-id")]
        id: String,

        /// Environment variable holding the local key
        #[arg(long, default_value = "KARL_LOCAL_KEY")]
        key_env: String,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Store a device's local key in the system keyring (read from stdin)
    SetKey {
        /// Device name or id
        device: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
