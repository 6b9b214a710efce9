use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;

use crate::store::StoreSpec;

#[derive(Debug, Parser)]
#[command(name = "bucketfm", version, about = "Terminal browser for an object-storage gateway bucket")]
pub struct Cli {
    /// Base URL of the storage gateway.
    #[arg(long, env = "BUCKETFM_GATEWAY_URL", default_value = "http://127.0.0.1:5000")]
    pub gateway_url: String,

    #[arg(long, env = "BUCKETFM_BUCKET", default_value = "test")]
    pub bucket: String,

    /// Browse an in-process bucket instead of the gateway.
    #[arg(long)]
    pub memory: bool,

    /// Fill the in-process bucket with a few sample objects.
    #[arg(long, requires = "memory")]
    pub seed_demo: bool,

    /// Where downloads are written (defaults to the working directory).
    #[arg(long, env = "BUCKETFM_DOWNLOAD_DIR")]
    pub download_dir: Option<PathBuf>,

    #[arg(long, env = "BUCKETFM_WORKERS", default_value_t = 2)]
    pub workers: usize,

    #[arg(long, env = "BUCKETFM_TIMEOUT_SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    #[arg(long, env = "BUCKETFM_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub store: StoreSpec,
    pub download_dir: PathBuf,
    pub workers: usize,
    pub log_file: PathBuf,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        if cli.bucket.trim().is_empty() {
            bail!("bucket name must not be empty");
        }
        if cli.workers == 0 {
            bail!("at least one worker is required");
        }

        let store = if cli.memory {
            StoreSpec::Memory {
                bucket: cli.bucket,
                seed_demo: cli.seed_demo,
            }
        } else {
            StoreSpec::Gateway {
                base_url: cli.gateway_url,
                bucket: cli.bucket,
                timeout: Duration::from_secs(cli.timeout_secs.max(1)),
            }
        };

        let download_dir = match cli.download_dir {
            Some(dir) => dir,
            None => env::current_dir()?,
        };
        if !download_dir.is_dir() {
            bail!("download directory does not exist: {}", download_dir.display());
        }

        let log_file = cli
            .log_file
            .unwrap_or_else(|| env::temp_dir().join("bucketfm.log"));

        Ok(Self {
            store,
            download_dir,
            workers: cli.workers,
            log_file,
        })
    }

    pub fn bucket(&self) -> &str {
        match &self.store {
            StoreSpec::Gateway { bucket, .. } | StoreSpec::Memory { bucket, .. } => bucket,
        }
    }
}
