pub mod audit;
pub mod auth;
pub mod catalog;
pub mod documents;
pub mod gateway;
pub mod pg;
pub mod search;
pub mod session;

mod error;

pub use audit::AuditEntry;
pub use documents::Download;
pub use error::{Error, Result};
pub use search::{SearchItem, SearchResponse};
pub use session::{Session, SessionRegistry, SessionState};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::{Map, Value};

use clause_config::Config;
use clause_domain::{
	audit::AuditRecord,
	facet::FacetRow,
	identity::{AccessRecord, AuthMode},
	present::SourceRef,
	query::{CompileOptions, CompiledRequest},
};
use clause_storage::db::Db;

use crate::{
	auth::Argon2Verifier,
	catalog::CatalogCache,
	documents::StageFetcher,
	gateway::{HttpBackend, ProcedureBackend},
	pg::PgStore,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Looks up access rows for a normalized username.
pub trait IdentityStore
where
	Self: Send + Sync,
{
	fn candidates<'a>(
		&'a self,
		normalized: &'a str,
		local_part: &'a str,
	) -> BoxFuture<'a, Result<Vec<AccessRecord>>>;
}

/// Compares a submitted secret with its stored form.
pub trait SecretVerifier
where
	Self: Send + Sync,
{
	fn verify(&self, secret: &str, stored: &str) -> bool;
}

/// Projects the distinct facet values of the corpus.
pub trait FacetSource
where
	Self: Send + Sync,
{
	fn load(&self) -> BoxFuture<'_, Result<Vec<FacetRow>>>;
}

/// The external retrieval and ranking engine.
pub trait SearchBackend
where
	Self: Send + Sync,
{
	/// Returns raw rows keyed by the backend's own column names.
	fn search<'a>(
		&'a self,
		request: &'a CompiledRequest,
	) -> BoxFuture<'a, Result<Vec<Map<String, Value>>>>;

	/// The role the backend executes searches under, recorded with every audit entry.
	fn backend_role(&self) -> BoxFuture<'_, Result<String>>;
}

/// Append-only audit store.
pub trait AuditSink
where
	Self: Send + Sync,
{
	fn append<'a>(&'a self, record: &'a AuditRecord) -> BoxFuture<'a, Result<()>>;

	fn recent(&self, limit: u32) -> BoxFuture<'_, Result<Vec<AuditEntry>>>;
}

/// Resolves a source reference to file bytes.
pub trait DocumentFetcher
where
	Self: Send + Sync,
{
	fn fetch<'a>(&'a self, source: &'a SourceRef) -> BoxFuture<'a, Result<Vec<u8>>>;
}

#[derive(Clone)]
pub struct Seams {
	pub identities: Arc<dyn IdentityStore>,
	pub verifier: Arc<dyn SecretVerifier>,
	pub facets: Arc<dyn FacetSource>,
	pub backend: Arc<dyn SearchBackend>,
	pub audit: Arc<dyn AuditSink>,
	pub documents: Arc<dyn DocumentFetcher>,
}
impl Seams {
	/// Postgres-backed stores, the configured search backend, argon2 secrets and the local stage.
	pub fn postgres(cfg: &Config, db: Db) -> Self {
		let store = Arc::new(PgStore::new(db.clone()));
		let backend: Arc<dyn SearchBackend> = match cfg.backend.http.as_ref() {
			Some(http) if cfg.backend.kind == "http" => Arc::new(HttpBackend::new(
				http.clone(),
				cfg.backend.timeout_ms,
				cfg.backend.role_label.clone(),
			)),
			_ => Arc::new(ProcedureBackend::new(
				db,
				cfg.backend.procedure.clone(),
				cfg.backend.role_label.clone(),
			)),
		};

		Self {
			identities: store.clone(),
			verifier: Arc::new(Argon2Verifier),
			facets: store.clone(),
			backend,
			audit: store,
			documents: Arc::new(StageFetcher::new(cfg.documents.stage_root.clone())),
		}
	}
}

pub struct ClauseService {
	pub cfg: Config,
	pub seams: Seams,
	pub(crate) catalog: CatalogCache,
	pub(crate) compile_opts: CompileOptions,
	pub(crate) auth_mode: AuthMode,
}
impl ClauseService {
	pub fn new(cfg: Config, db: Db) -> Result<Self> {
		let seams = Seams::postgres(&cfg, db);

		Self::with_seams(cfg, seams)
	}

	pub fn with_seams(cfg: Config, seams: Seams) -> Result<Self> {
		let Some(auth_mode) = AuthMode::parse(&cfg.security.auth_mode) else {
			return Err(Error::Misconfigured {
				message: format!("Unknown auth mode {:?}.", cfg.security.auth_mode),
			});
		};
		let catalog = CatalogCache::new(std::time::Duration::from_secs(cfg.catalog.cache_ttl_secs));
		let compile_opts = CompileOptions::from_config(&cfg.search);

		Ok(Self { cfg, seams, catalog, compile_opts, auth_mode })
	}

	pub fn session_ttl(&self) -> time::Duration {
		time::Duration::seconds(i64::try_from(self.cfg.security.session_ttl_secs).unwrap_or(i64::MAX))
	}

	pub fn unconstrained_sentinel(&self) -> &str {
		&self.compile_opts.unconstrained_sentinel
	}
}
