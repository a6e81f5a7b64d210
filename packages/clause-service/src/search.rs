use std::time::Duration;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use clause_domain::{
	audit::{self, SearchAttempt},
	present::{self, PresentedRow},
	query::{self, SearchRequest},
};

use crate::{ClauseService, Error, Result, Session};

const UNKNOWN_BACKEND_ROLE: &str = "UNKNOWN";

#[derive(Debug, Clone, Serialize)]
pub struct SearchItem {
	#[serde(flatten)]
	pub row: PresentedRow,
	/// Per-session handle for downloading the source document, when the row has one.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub document_handle: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
	pub items: Vec<SearchItem>,
	pub result_count: u32,
	/// False when the results were delivered but their audit record could not be written.
	pub audited: bool,
}

impl ClauseService {
	/// One search submission: gate, compile, execute, rank, audit, redact.
	///
	/// Exactly one audit record is attempted once the session gate passes, whether the search
	/// succeeds or fails. An unauthenticated call has no side effects.
	pub async fn search(
		&self,
		session: &mut Session,
		req: SearchRequest,
		now: OffsetDateTime,
	) -> Result<SearchResponse> {
		let identity = session.require(now, self.session_ttl())?.clone();
		let backend_role = self.backend_role().await;
		let attempt = SearchAttempt::new(
			&req.query_text,
			&req.facets,
			&self.compile_opts,
			&identity,
			&backend_role,
			now,
		);
		let max_detail = self.cfg.audit.error_detail_max_chars;
		let compiled = match query::compile(&req, &self.compile_opts) {
			Ok(compiled) => compiled,
			Err(err) => {
				let record = attempt.failed(None, &err.message, max_detail);

				self.record_failure(&record).await;

				return Err(err.into());
			},
		};
		let rows = match self.execute(&compiled).await {
			Ok(rows) => rows,
			Err(err) => {
				let detail = match err {
					Error::Backend { message } => message,
					other => other.to_string(),
				};
				let record = attempt.failed(Some(&compiled), &detail, max_detail);

				self.record_failure(&record).await;

				return Err(Error::Backend { message: audit::bound_detail(&detail, max_detail) });
			},
		};
		let ranked = present::rank(rows, compiled.limit());
		let record = attempt.succeeded(&compiled, &ranked);
		let audited = self.record_audit(&record).await.is_ok();
		let items = present::redact(ranked, &identity.app_role)
			.into_iter()
			.map(|row| {
				let document_handle =
					row.source_ref.clone().map(|source| session.register_document(source));

				SearchItem { row, document_handle }
			})
			.collect::<Vec<_>>();
		let result_count = items.len() as u32;

		info!(
			target: "audit",
			event = "search",
			subject_id = %identity.subject_id,
			app_role = %identity.app_role,
			outcome = record.outcome.as_str(),
			result_count,
			audited,
			"Search completed."
		);

		Ok(SearchResponse { items, result_count, audited })
	}

	/// Audits a submission whose body could not be read as a search request and returns the
	/// error to surface. Like [`Self::search`], nothing is recorded without a live session.
	pub async fn reject_search(
		&self,
		session: &mut Session,
		detail: &str,
		now: OffsetDateTime,
	) -> Error {
		let identity = match session.require(now, self.session_ttl()) {
			Ok(identity) => identity.clone(),
			Err(err) => return err,
		};
		let backend_role = self.backend_role().await;
		let attempt = SearchAttempt::new(
			"",
			&Default::default(),
			&self.compile_opts,
			&identity,
			&backend_role,
			now,
		);
		let max_detail = self.cfg.audit.error_detail_max_chars;
		let record = attempt.failed(None, detail, max_detail);

		self.record_failure(&record).await;

		Error::InvalidRequest { message: audit::bound_detail(detail, max_detail) }
	}

	async fn record_failure(&self, record: &audit::AuditRecord) {
		info!(
			target: "audit",
			event = "search",
			subject_id = %record.user_name,
			app_role = %record.app_role,
			outcome = record.outcome.as_str(),
			error = record.error_detail.as_deref().unwrap_or_default(),
			"Search failed."
		);

		// The write failure is already logged by the recorder; the caller sees the search error.
		let _ = self.record_audit(record).await;
	}

	/// Backend role for the audit record. Bounded by the backend timeout; falls back to `UNKNOWN`.
	async fn backend_role(&self) -> String {
		let timeout_ms = self.cfg.backend.timeout_ms;

		match tokio::time::timeout(
			Duration::from_millis(timeout_ms),
			self.seams.backend.backend_role(),
		)
		.await
		{
			Ok(Ok(role)) => role,
			Ok(Err(err)) => {
				warn!(error = %err, "Failed to read the backend role.");

				UNKNOWN_BACKEND_ROLE.to_string()
			},
			Err(_) => {
				warn!(timeout_ms, "Backend role lookup timed out.");

				UNKNOWN_BACKEND_ROLE.to_string()
			},
		}
	}
}
