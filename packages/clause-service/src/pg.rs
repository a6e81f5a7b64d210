use clause_domain::{audit::AuditRecord, facet::FacetRow, identity::AccessRecord};
use clause_storage::{
	db::Db,
	queries::{self, InsertAuditArgs},
};

use crate::{
	AuditEntry, AuditSink, BoxFuture, Error, FacetSource, IdentityStore, Result, audit,
};

/// Identity, facet and audit stores backed by one Postgres pool.
pub struct PgStore {
	db: Db,
}
impl PgStore {
	pub fn new(db: Db) -> Self {
		Self { db }
	}
}

impl IdentityStore for PgStore {
	fn candidates<'a>(
		&'a self,
		normalized: &'a str,
		local_part: &'a str,
	) -> BoxFuture<'a, Result<Vec<AccessRecord>>> {
		Box::pin(async move {
			let rows = queries::find_access_candidates(&self.db, normalized, local_part).await?;

			Ok(rows
				.into_iter()
				.map(|row| AccessRecord {
					user_name: row.user_name,
					display_name: row.display_name,
					app_role: row.app_role,
					is_active: row.is_active,
					secret_hash: row.secret_hash,
				})
				.collect())
		})
	}
}

impl FacetSource for PgStore {
	fn load(&self) -> BoxFuture<'_, Result<Vec<FacetRow>>> {
		Box::pin(async move {
			let rows = queries::distinct_facets(&self.db).await?;

			Ok(rows
				.into_iter()
				.map(|row| FacetRow { lob: row.lob, state: row.state, version: row.version })
				.collect())
		})
	}
}

impl AuditSink for PgStore {
	fn append<'a>(&'a self, record: &'a AuditRecord) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			let result_count = i32::try_from(record.result_count).map_err(|_| Error::AuditWrite {
				message: "Result count does not fit the audit column.".to_string(),
			})?;
			let args = InsertAuditArgs {
				search_text: &record.search_text,
				lob: record.lob.as_deref(),
				state: record.state.as_deref(),
				version: record.version.as_deref(),
				query_text: record.query_text.as_ref(),
				query_output: &record.query_output,
				result_count,
				user_name: &record.user_name,
				app_role: &record.app_role,
				backend_role: &record.backend_role,
				outcome: record.outcome.as_str(),
				error_detail: record.error_detail.as_deref(),
				search_ts: record.search_ts,
			};

			queries::insert_audit(&self.db.pool, args)
				.await
				.map_err(|err| Error::AuditWrite { message: err.to_string() })?;

			Ok(())
		})
	}

	fn recent(&self, limit: u32) -> BoxFuture<'_, Result<Vec<AuditEntry>>> {
		Box::pin(async move {
			let rows = queries::recent_audits(&self.db, i64::from(limit)).await?;

			rows.into_iter().map(audit::entry_from_row).collect()
		})
	}
}
