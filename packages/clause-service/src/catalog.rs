use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use clause_domain::facet::{Facet, FacetCatalog};

use crate::{ClauseService, FacetSource, Result, Session};

struct Cached {
	catalog: Arc<FacetCatalog>,
	loaded_at: Instant,
}

/// Read-mostly facet catalog with a bounded staleness window and a single refreshing writer.
pub struct CatalogCache {
	ttl: Duration,
	current: RwLock<Option<Cached>>,
	refresh: Mutex<()>,
}
impl CatalogCache {
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, current: RwLock::new(None), refresh: Mutex::new(()) }
	}

	/// Returns the cached catalog while it is fresh; otherwise reloads it.
	pub async fn get(&self, source: &dyn FacetSource) -> Result<Arc<FacetCatalog>> {
		if let Some(catalog) = self.fresh().await {
			return Ok(catalog);
		}

		let _writer = self.refresh.lock().await;

		// Another caller may have refreshed while this one waited.
		if let Some(catalog) = self.fresh().await {
			return Ok(catalog);
		}

		self.reload(source).await
	}

	/// Reloads unconditionally. On failure the previous catalog, if any, stays in place.
	pub async fn refresh(&self, source: &dyn FacetSource) -> Result<Arc<FacetCatalog>> {
		let _writer = self.refresh.lock().await;

		self.reload(source).await
	}

	async fn fresh(&self) -> Option<Arc<FacetCatalog>> {
		let current = self.current.read().await;

		current
			.as_ref()
			.filter(|cached| cached.loaded_at.elapsed() < self.ttl)
			.map(|cached| cached.catalog.clone())
	}

	async fn reload(&self, source: &dyn FacetSource) -> Result<Arc<FacetCatalog>> {
		match source.load().await {
			Ok(rows) => {
				let catalog = Arc::new(FacetCatalog::from_rows(rows));

				*self.current.write().await =
					Some(Cached { catalog: catalog.clone(), loaded_at: Instant::now() });

				info!(
					lob = catalog.values(Facet::LineOfBusiness).count(),
					state = catalog.values(Facet::Jurisdiction).count(),
					version = catalog.values(Facet::DocumentVersion).count(),
					"Facet catalog loaded."
				);

				Ok(catalog)
			},
			Err(err) => {
				let stale = self.current.read().await.as_ref().map(|cached| cached.catalog.clone());

				match stale {
					Some(catalog) => {
						warn!(error = %err, "Facet catalog refresh failed. Serving the previous catalog.");

						Ok(catalog)
					},
					None => Err(err),
				}
			},
		}
	}
}

impl ClauseService {
	/// Legal values per facet for an authenticated caller.
	pub async fn facets(
		&self,
		session: &mut Session,
		now: time::OffsetDateTime,
	) -> Result<Arc<FacetCatalog>> {
		session.require(now, self.session_ttl())?;

		self.catalog.get(self.seams.facets.as_ref()).await
	}

	/// Forces a catalog reload. Used by the background refresh task.
	pub async fn refresh_catalog(&self) -> Result<Arc<FacetCatalog>> {
		self.catalog.refresh(self.seams.facets.as_ref()).await
	}
}
