#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
use clap::{Args, Parser, Subcommand};

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "money-notes")]
#[command(about = "Import expense notes and settle shared bills")]
pub struct CliConfig {
    #[arg(long, short = 'C', default_value = "money.toml", help = "TOML configuration file")]
    pub config: String,

    #[arg(long, help = "Store file, overriding the configuration")]
    pub store: Option<String>,

    #[arg(long, short, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log JSON lines to stderr")]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Import new notes of a resource
    Import(ImportArgs),
    /// Analyze the sharings of a tag and print who pays whom
    Event(EventArgs),
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    #[arg(short, long, help = "Stored or configured resource, by name or id")]
    pub resource: Option<String>,

    #[arg(short, long, help = "Note link, creating or updating the resource")]
    pub link: Option<String>,

    #[arg(short = 'n', long, help = "Name for a resource given by --link")]
    pub name: Option<String>,

    #[arg(short = 't', long, help = "tx, order or sharing")]
    pub scope: Option<String>,

    #[arg(long, help = "csv, json, yaml or html; defaults to the link's extension")]
    pub format: Option<String>,

    #[arg(short, long, help = "Currency applied to every note")]
    pub currency: Option<String>,

    #[arg(short, long, help = "Multiplier applied to every amount")]
    pub scale: Option<f64>,

    #[arg(long = "set", value_name = "FIELD=VALUE", help = "Value forced onto every note; repeatable")]
    pub overrides: Vec<String>,

    #[arg(short, long, help = "Import every note, ignoring the cursor")]
    pub force: bool,

    #[arg(long, help = "Directory for the rejected notes log")]
    pub rejected_dir: Option<String>,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Args)]
pub struct EventArgs {
    #[arg(short, long, help = "Tag of the sharings, by name or id")]
    pub tag: String,

    #[arg(short, long, help = "Currency to settle in")]
    pub currency: String,

    #[arg(short, long = "rate", help = "Conversion rate such as usd=24500; repeatable")]
    pub rates: Vec<String>,

    #[arg(long, help = "Skip sharings without a conversion rate")]
    pub ignore_unknown: bool,

    #[arg(long, help = "Save the event under this name")]
    pub save: Option<String>,
}
