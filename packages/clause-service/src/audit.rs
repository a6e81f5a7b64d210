use serde::Serialize;
use time::OffsetDateTime;
use tracing::error;
use uuid::Uuid;

use clause_domain::audit::{AuditOutcome, AuditRecord};
use clause_storage::models::AuditRow;

use crate::{ClauseService, Error, Result, Session};

pub const DEFAULT_AUDIT_PAGE: u32 = 50;
pub const MAX_AUDIT_PAGE: u32 = 500;

/// A stored audit record with its row id.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
	pub audit_id: Uuid,
	#[serde(flatten)]
	pub record: AuditRecord,
}

impl ClauseService {
	/// Appends one audit record. A failure is logged for operators and returned as `AuditWrite`.
	pub async fn record_audit(&self, record: &AuditRecord) -> Result<()> {
		match self.seams.audit.append(record).await {
			Ok(()) => Ok(()),
			Err(err) => {
				let message = match err {
					Error::AuditWrite { message } => message,
					other => other.to_string(),
				};

				error!(
					target: "audit",
					event = "audit_write_failed",
					user_name = %record.user_name,
					outcome = record.outcome.as_str(),
					error = %message,
					"Audit record could not be written."
				);

				Err(Error::AuditWrite { message })
			},
		}
	}

	/// Most recent audit entries, newest first. Requires the ADMIN role.
	pub async fn recent_audits(
		&self,
		session: &mut Session,
		limit: Option<u32>,
		now: OffsetDateTime,
	) -> Result<Vec<AuditEntry>> {
		let identity = session.require(now, self.session_ttl())?;

		if !identity.app_role.is_admin() {
			return Err(Error::Forbidden {
				message: "Audit records are visible to administrators only.".to_string(),
			});
		}

		let limit = limit.unwrap_or(DEFAULT_AUDIT_PAGE).clamp(1, MAX_AUDIT_PAGE);

		self.seams.audit.recent(limit).await
	}
}

pub(crate) fn entry_from_row(row: AuditRow) -> Result<AuditEntry> {
	let outcome = match row.outcome.as_str() {
		"SUCCESS" => AuditOutcome::Success,
		"FAILURE" => AuditOutcome::Failure,
		other => {
			return Err(Error::Storage {
				message: format!("Audit row {} has unknown outcome {other:?}.", row.audit_id),
			});
		},
	};
	let result_count = u32::try_from(row.result_count).map_err(|_| Error::Storage {
		message: format!("Audit row {} has a negative result count.", row.audit_id),
	})?;

	Ok(AuditEntry {
		audit_id: row.audit_id,
		record: AuditRecord {
			search_text: row.search_text,
			lob: row.lob,
			state: row.state,
			version: row.version,
			query_text: row.query_text,
			query_output: row.query_output,
			result_count,
			user_name: row.user_name,
			app_role: row.app_role,
			backend_role: row.backend_role,
			search_ts: row.search_ts,
			outcome,
			error_detail: row.error_detail,
		},
	})
}
