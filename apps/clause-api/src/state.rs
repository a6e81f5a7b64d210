use std::sync::Arc;

use clause_service::{ClauseService, SessionRegistry};
use clause_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ClauseService>,
	pub sessions: Arc<SessionRegistry>,
}
impl AppState {
	pub async fn new(config: clause_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let service = ClauseService::new(config, db)?;

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: ClauseService) -> Self {
		Self { service: Arc::new(service), sessions: Arc::new(SessionRegistry::new()) }
	}
}
