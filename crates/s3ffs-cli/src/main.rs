//! 🚀 s3ffs: the front door. Loads config, sets up logging, runs the source, reports.
//!
//! 🎬 *[narrator voice]* "It all started with a simple main() function..."
//! Everything interesting happens in the library. This binary is the manager. 🦆

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::Table;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// 🪣 Stream a flat file from S3 to a CloudEvents sink, a batch of lines at a time.
///
/// Configuration comes from the environment (K_SINK, S3_BUCKET, ... or S3FFS_*) and,
/// optionally, a TOML file that wins on conflicts.
#[derive(Debug, Parser)]
#[command(name = "s3ffs", version)]
struct Cli {
    /// 🔧 TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 📋 print the run summary as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 📡 RUST_LOG drives the verbosity, same as every other binary worth its salt
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let result = async {
        let app_config = s3ffs::load_config(cli.config.as_deref())
            .context("💀 Couldn't load the configuration. Check the env vars and the file, something obvious is probably missing.")?;
        s3ffs::run(app_config).await
    }
    .await;

    match result {
        Ok(summary) => {
            if cli.json {
                println!("{}", serde_json::to_string(&summary)?);
            } else {
                let mut table = Table::new();
                table.set_header(vec!["errorCount", "sentCount"]);
                table.add_row(vec![summary.error_count.to_string(), summary.sent_count.to_string()]);
                println!("{table}");
            }
            Ok(())
        }
        Err(err) => {
            error!("💀 error: {}", err);
            // -- 🧅 peel the onion, one layer at a time
            let mut smells_like_connection_trouble = false;
            for cause in err.chain().skip(1) {
                error!("⚠️  cause: {}", cause);
                let cause_str = cause.to_string();
                if cause_str.contains("error sending request")
                    || cause_str.contains("Connection refused")
                    || cause_str.contains("connection refused")
                    || cause_str.contains("dns error")
                    || cause_str.contains("dispatch failure")
                {
                    smells_like_connection_trouble = true;
                }
            }
            if smells_like_connection_trouble {
                error!(
                    "🔧 hint: looks like something isn't reachable. Check S3_URL / S3_REGION and \
                    that the object store is up. If you're using MinIO in Docker, `docker ps` is your friend."
                );
            }
            std::process::exit(1);
        }
    }
}
