mod commands;
mod error;

use crate::error::{ErrorKind, Result};
use clap::{ArgAction, Parser, Subcommand};
use exn::ResultExt;
use imgdex_cache::{Database, SqliteStore};
use imgdex_config::Config;
use imgdex_index::ImageInfoIndex;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "imgdex", version, about = "Index image metadata across a directory tree", long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Log more; repeat for even more. Ignored when RUST_LOG is set
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Index every image under a directory
    Scan { directory: PathBuf },
    /// Print the dimensions and bit depth of image files
    Get {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Forget what is known about files
    Forget {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show how many files are indexed
    Stats,
    /// Discard every indexed entry
    Reset,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn open_index(config: &Config) -> Result<ImageInfoIndex> {
    if let Some(parent) = config.database.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.or_raise(|| ErrorKind::Database)?;
    }
    let db = Database::connect(&config.database).await.or_raise(|| ErrorKind::Database)?;
    ImageInfoIndex::open(Arc::new(SqliteStore::from(&db)), config.cache_size)
        .await
        .or_raise(|| ErrorKind::Index)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let index = open_index(&config).await?;
    let result = match cli.command {
        Command::Scan { directory } => commands::scan(&index, &directory, config.concurrency).await,
        Command::Get { files } => commands::get(&index, &files).await,
        Command::Forget { files } => commands::forget(&index, &files).await,
        Command::Stats => commands::stats(&index).await,
        Command::Reset => index.store().reset().await.or_raise(|| ErrorKind::Index),
    };
    index.close().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use rstest::rstest;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[rstest]
    #[case(&["imgdex", "stats"], 0)]
    #[case(&["imgdex", "-vv", "stats"], 2)]
    #[case(&["imgdex", "get", "-v", "a.png", "b.png"], 1)]
    fn test_verbosity(#[case] args: &[&str], #[case] expected: u8) {
        assert_eq!(Cli::try_parse_from(args).unwrap().verbose, expected);
    }

    #[test]
    fn test_get_requires_files() {
        assert!(Cli::try_parse_from(["imgdex", "get"]).is_err());
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::try_parse_from(["imgdex", "scan", "photos", "--config", "imgdex.yaml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("imgdex.yaml")));
        assert!(matches!(cli.command, Command::Scan { directory } if directory == PathBuf::from("photos")));
    }
}
