//! Server Deck - start, stop and deploy to remote server processes
//!
//! This is the binary entry point. All logic lives in the workspace crates.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::Result;

mod headless;

/// Server Deck - drive a management server from the command line
#[derive(Parser, Debug)]
#[command(name = "srvdeck")]
#[command(about = "Start, stop and deploy to remote server processes", long_about = None)]
struct Args {
    /// Management server base URL (overrides config.toml)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Directory holding .srvdeck/config.toml
    #[arg(long, value_name = "DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Count running servers
    Summary,
    /// List every server
    List,
    /// Query one server's status
    Status { name: String },
    /// Start a server and wait until it is ready
    Start { name: String },
    /// Stop a running server
    Stop { name: String },
    /// Copy files into a running server's deployment folder
    Deploy {
        name: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload a ZIP archive and wait for extraction
    UploadZip { archive: PathBuf },
    /// Write a default .srvdeck/config.toml
    Init,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();

    if let Err(e) = srvdeck_core::logging::init() {
        eprintln!("Warning: logging disabled: {e}");
    }

    let base_dir = args
        .config_dir
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    headless::runner::run(&base_dir, args.base_url.as_deref(), args.command).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_deploy_with_files() {
        let args = Args::try_parse_from(["srvdeck", "deploy", "web1", "a.war", "b.war"]).unwrap();
        assert_eq!(
            args.command,
            Command::Deploy {
                name: "web1".to_string(),
                files: vec![PathBuf::from("a.war"), PathBuf::from("b.war")],
            }
        );
    }

    #[test]
    fn test_deploy_requires_files() {
        assert!(Args::try_parse_from(["srvdeck", "deploy", "web1"]).is_err());
    }

    #[test]
    fn test_global_overrides() {
        let args = Args::try_parse_from([
            "srvdeck",
            "--base-url",
            "http://deck:9000",
            "upload-zip",
            "site.zip",
        ])
        .unwrap();
        assert_eq!(args.base_url.as_deref(), Some("http://deck:9000"));
        assert_eq!(
            args.command,
            Command::UploadZip {
                archive: PathBuf::from("site.zip")
            }
        );
    }
}
