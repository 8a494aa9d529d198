use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::application::data::LogLevel;
use crate::config::RemoteTarget;

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Mirror a local directory to a remote host over ssh")]
pub struct Cli {
    #[clap(long, short, default_value = "info", value_enum, global = true)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Watch the root and keep the remote replica in sync
    Watch(WatchArgs),
    /// Show what was synced
    History(HistoryArgs),
}

#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// The directory to mirror
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Config file, defaults to rmirror.yaml in the root
    #[clap(long, short)]
    pub config: Option<PathBuf>,

    /// Remote replica as HOST:PATH, overriding the config file
    #[clap(long, value_parser = parse_remote)]
    pub remote: Option<RemoteTarget>,

    /// Skip uploading the whole tree on startup
    #[clap(long)]
    pub no_initial_sync: bool,
}

#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// The mirrored directory
    #[clap(long, short, default_value = ".")]
    pub root: PathBuf,

    /// Only show changes from this long ago, e.g. 30s, 15m, 2h, 1d
    #[clap(long, value_parser = parse_duration)]
    pub last: Option<Duration>,

    /// Only show changes touching this root-relative path, following renames
    #[clap(long)]
    pub follow: Option<String>,
}

fn parse_remote(value: &str) -> Result<RemoteTarget, String> {
    value.parse().map_err(|err| format!("{err}"))
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (amount, unit) = value.split_at(split);
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("'{value}' does not start with a number"))?;
    let seconds = match unit {
        "" | "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        _ => return Err(format!("Unknown duration unit '{unit}'")),
    };
    amount
        .checked_mul(seconds)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("'{value}' is too long"))
}
