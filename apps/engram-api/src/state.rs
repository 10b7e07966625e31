use std::sync::Arc;

use engram_service::EngramService;
use engram_storage::{db::Db, vector::VectorStore};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<EngramService>,
}
impl AppState {
	pub async fn new(config: engram_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let vector = VectorStore::new(&config.storage.qdrant)?;

		vector.ensure_collection().await?;

		Ok(Self { service: Arc::new(EngramService::new(config, db, vector)) })
	}
}
