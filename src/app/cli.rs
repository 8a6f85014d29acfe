//! Command-line argument definitions (clap).

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "upswatch-agent")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "SNMP polling and logging agent for UPS fleets", long_about = None)]
pub struct Args {
    // === Modes ===
    /// Test SNMP connectivity to every configured device and exit
    #[arg(long, help_heading = "Modes")]
    pub test: bool,

    /// Poll every device once, print its current status, and exit
    #[arg(long = "show-status", help_heading = "Modes")]
    pub show_status: bool,

    /// Export logged records for one device to the given file
    #[arg(long, value_name = "FILE", requires = "device", help_heading = "Modes")]
    pub export: Option<PathBuf>,

    // === Export options ===
    /// Device name to export records for
    #[arg(long, value_name = "NAME", help_heading = "Export options")]
    pub device: Option<String>,

    /// Only export records at or after this time (YYYY-MM-DDTHH:MM:SS)
    #[arg(long, value_name = "TIME", help_heading = "Export options")]
    pub since: Option<String>,

    /// Only export records at or before this time (YYYY-MM-DDTHH:MM:SS)
    #[arg(long, value_name = "TIME", help_heading = "Export options")]
    pub until: Option<String>,

    // === Config & Debug ===
    /// Path to the configuration file (default: config.json)
    #[arg(short = 'c', long, value_name = "PATH", help_heading = "Config & Debug")]
    pub config: Option<PathBuf>,

    /// Set log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(long = "log-level", help_heading = "Config & Debug")]
    pub log_level: Option<String>,
}
