use clap::Parser;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "rouilleftp", about = "A FTP client written in Rust.")]
pub struct Cli {
    /// FTP server host (overrides the configuration file)
    pub host: Option<String>,

    /// FTP server control port (overrides the configuration file)
    pub port: Option<u16>,

    /// Path to the configuration file
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Enable verbose mode
    #[arg(short, long)]
    pub verbose: bool,
}
