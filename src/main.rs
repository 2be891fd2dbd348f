use clap::Parser;
use file_explorer::config::{default_resources_dir, Config, ThumbnailSize};
use file_explorer::{launch, Result};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Build thumbnails and data references for every supported file under a root directory
#[derive(Parser, Debug)]
#[command(name = "file-explorer", version, about)]
struct Args {
    /// JSON configuration file; command line values override it
    #[arg(long, env = "FILEEXPLORER_CONFIG")]
    config: Option<PathBuf>,

    /// Directory tree to scan
    #[arg(long, env = "FILEEXPLORER_ROOT_DIR", required_unless_present = "config")]
    root_dir: Option<PathBuf>,

    /// Where `thumbnails/` and `files/` are created
    #[arg(long, env = "FILEEXPLORER_RESOURCES_DIR")]
    resources_dir: Option<PathBuf>,

    /// SQLite status store
    #[arg(long, env = "FILEEXPLORER_DATABASE_PATH", required_unless_present = "config")]
    database_path: Option<PathBuf>,

    /// Supported extensions, e.g. `.png,.pdf`
    #[arg(long = "extensions", value_delimiter = ',')]
    extensions: Vec<String>,

    /// Thumbnails are shrunk to fit a square of this many pixels
    #[arg(long)]
    thumbnail_size: Option<u32>,
}

impl Args {
    fn into_config(self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::new(
                self.root_dir.clone().unwrap_or_default(),
                default_resources_dir(),
                self.database_path.clone().unwrap_or_default(),
            ),
        };

        if let Some(root_dir) = self.root_dir {
            config.root_dir = root_dir;
        }
        if let Some(resources_dir) = self.resources_dir {
            config.resources_dir = resources_dir;
        }
        if let Some(database_path) = self.database_path {
            config.database_path = database_path;
        }
        if !self.extensions.is_empty() {
            config = config.with_extensions(self.extensions);
        }
        if let Some(side) = self.thumbnail_size {
            config.thumbnail_size = ThumbnailSize {
                width: side,
                height: side,
            };
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;

    // Without a web tier in this process the walk is the whole job
    let summary = launch(config)?.wait().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
