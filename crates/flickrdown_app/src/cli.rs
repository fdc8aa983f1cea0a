use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(
    name = "flickrdown",
    version,
    about = "Download photos from Flickr into a dated local archive"
)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(long, value_name = "FILE", env = "FLICKRDOWN_CONFIG")]
    pub config: PathBuf,

    /// One of trace, debug, info, warn, error, fatal.
    #[arg(
        long,
        value_name = "LEVEL",
        default_value = "info",
        value_parser = flickrdown_logging::parse_level
    )]
    pub log_level: LevelFilter,

    /// Also write the log to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Archive one window of uploads and exit.
    Run(RunArgs),
    /// Keep archiving new uploads whenever a trigger fires.
    Watch(WatchArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// First day to process (YYYY-MM-DD). Defaults to the saved watermark.
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<NaiveDate>,

    /// Day after the last one to process (YYYY-MM-DD). Defaults to one day after the start.
    #[arg(long, value_name = "DATE")]
    pub end_date: Option<NaiveDate>,

    /// Process the window one UTC day at a time, stopping at the first failing day.
    #[arg(long)]
    pub by_day: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct WatchArgs {
    /// Start of the first pass when no watermark has been saved yet.
    #[arg(long, value_name = "DATE")]
    pub start_date: Option<NaiveDate>,

    /// Directory whose changes trigger a pass. Overrides the config file.
    #[arg(long, value_name = "DIR")]
    pub watch_dir: Option<PathBuf>,

    /// Seconds between periodic passes. Overrides the config file.
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    pub sweep_interval_secs: Option<u64>,
}
