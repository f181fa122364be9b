//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(name = "tailserve", about = "Serve a directory and tail growing files in the browser")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, short = 'p', default_value_t = 8000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    pub bind: String,

    /// Directory to serve (default: current directory)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Append combined-format access logs to this file instead of the
    /// diagnostic log
    #[arg(long)]
    pub access_log: Option<PathBuf>,
}
