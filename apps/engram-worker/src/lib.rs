pub mod worker;

// std
use std::path::PathBuf;

// crates.io
use clap::Parser;
use tracing_subscriber::EnvFilter;

// self
use engram_service::EngramService;
use engram_storage::{db::Db, vector::VectorStore};

#[derive(Debug, Parser)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = engram_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let vector = VectorStore::new(&config.storage.qdrant)?;

	vector.ensure_collection().await?;

	let service = EngramService::new(config, db, vector);

	worker::run_worker(service).await
}
