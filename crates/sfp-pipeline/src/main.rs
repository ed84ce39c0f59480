//! SFP Pipeline - streaming and bulk ingestion of retail sale lines

use anyhow::{Context, Result};
use clap::Parser;
use sfp_common::config::{ConsumerConfig, KafkaConfig, ProducerConfig, StoreConfig};
use sfp_common::logging::{init_logging, LogConfig, LogLevel};
use sfp_pipeline::consumer::SalesConsumer;
use sfp_pipeline::etl::{clean_csv_file, BulkLoader};
use sfp_pipeline::producer::SalesProducer;
use sfp_pipeline::sink::PostgresSink;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "sfp-pipeline")]
#[command(author, version, about = "SFP sale-line ingestion pipeline")]
struct Cli {
    /// Pipeline role to run
    #[command(subcommand)]
    role: Role,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Role {
    /// Emit synthetic sale-line events onto the sales topic
    Produce {
        /// Number of events to emit
        #[arg(short, long)]
        count: Option<u64>,

        /// Pause between events in milliseconds
        #[arg(long)]
        interval_ms: Option<u64>,
    },

    /// Consume the sales topic into PostgreSQL with batched flushes
    Consume {
        /// Records accumulated before a flush
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Bulk-load a historical CSV dataset through the copy protocol
    Load {
        /// CSV file with the canonical eight columns
        #[arg(short, long)]
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::from_env()
        .context("Invalid logging configuration")?
        .with_level(log_level)
        .with_file_prefix("sfp-pipeline");
    init_logging(&log_config)?;

    match cli.role {
        Role::Produce { count, interval_ms } => {
            let kafka = KafkaConfig::from_env()?;
            let mut settings = ProducerConfig::from_env()?;
            if let Some(count) = count {
                settings.event_count = count;
            }
            if let Some(interval_ms) = interval_ms {
                settings.send_interval_ms = interval_ms;
            }

            SalesProducer::new(kafka, settings)
                .context("Failed to create producer")?
                .run()
                .await?;
        }
        Role::Consume { batch_size } => {
            let kafka = KafkaConfig::from_env()?;
            let mut settings = ConsumerConfig::from_env()?;
            if let Some(batch_size) = batch_size {
                settings.batch_size = batch_size;
            }

            let store = StoreConfig::from_env()?;
            let sink = PostgresSink::connect(&store)
                .await
                .context("Failed to connect to the store")?;

            SalesConsumer::new(&kafka, settings, sink)
                .context("Failed to create consumer")?
                .run()
                .await?;
        }
        Role::Load { file } => {
            info!(file = %file.display(), "Cleaning dataset");
            let cleaned = clean_csv_file(&file).context("Failed to clean dataset")?;

            let store = StoreConfig::from_env()?;
            let loader = BulkLoader::connect(&store)
                .await
                .context("Failed to connect to the store")?;
            let rows = loader
                .load(&cleaned.records)
                .await
                .context("Bulk load failed")?;

            info!(
                rows,
                dropped = cleaned.report.dropped(),
                "Bulk load finished"
            );
        }
    }

    Ok(())
}
