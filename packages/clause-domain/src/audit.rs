use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;

use crate::{
	facet::Facet,
	identity::Identity,
	present::ResultRow,
	query::{CompileOptions, CompiledRequest},
};

const UNKNOWN_ERROR: &str = "unknown error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditOutcome {
	Success,
	Failure,
}
impl AuditOutcome {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Success => "SUCCESS",
			Self::Failure => "FAILURE",
		}
	}
}

/// One append-only audit row. The search pipeline builds every record through a
/// [`SearchAttempt`] finisher, so identity is captured at write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
	pub search_text: String,
	pub lob: Option<String>,
	pub state: Option<String>,
	pub version: Option<String>,
	pub query_text: Option<Value>,
	pub query_output: Value,
	pub result_count: u32,
	pub user_name: String,
	pub app_role: String,
	pub backend_role: String,
	#[serde(with = "time::serde::rfc3339")]
	pub search_ts: OffsetDateTime,
	pub outcome: AuditOutcome,
	pub error_detail: Option<String>,
}

/// Who searched for what, captured before the pipeline runs.
#[derive(Debug, Clone)]
pub struct SearchAttempt {
	search_text: String,
	facets: BTreeMap<Facet, Option<String>>,
	user_name: String,
	app_role: String,
	backend_role: String,
	search_ts: OffsetDateTime,
}
impl SearchAttempt {
	pub fn new(
		search_text: &str,
		facets: &BTreeMap<Facet, String>,
		opts: &CompileOptions,
		identity: &Identity,
		backend_role: &str,
		search_ts: OffsetDateTime,
	) -> Self {
		let facets = Facet::ALL
			.into_iter()
			.map(|facet| {
				let value = facets
					.get(&facet)
					.filter(|value| !opts.is_unconstrained(value))
					.map(|value| value.trim().to_string());

				(facet, value)
			})
			.collect();

		Self {
			search_text: search_text.to_string(),
			facets,
			user_name: identity.subject_id.clone(),
			app_role: identity.app_role.to_string(),
			backend_role: backend_role.to_string(),
			search_ts,
		}
	}

	pub fn succeeded(self, compiled: &CompiledRequest, rows: &[ResultRow]) -> AuditRecord {
		let output = serde_json::to_value(rows).unwrap_or_else(|_| Value::Array(Vec::new()));

		self.finish(Some(compiled), output, rows.len() as u32, AuditOutcome::Success, None)
	}

	pub fn failed(
		self,
		compiled: Option<&CompiledRequest>,
		detail: &str,
		max_detail_chars: u32,
	) -> AuditRecord {
		let detail = bound_detail(detail, max_detail_chars);

		self.finish(compiled, Value::Array(Vec::new()), 0, AuditOutcome::Failure, Some(detail))
	}

	fn finish(
		self,
		compiled: Option<&CompiledRequest>,
		query_output: Value,
		result_count: u32,
		outcome: AuditOutcome,
		error_detail: Option<String>,
	) -> AuditRecord {
		let mut facets = self.facets;

		AuditRecord {
			search_text: self.search_text,
			lob: facets.remove(&Facet::LineOfBusiness).flatten(),
			state: facets.remove(&Facet::Jurisdiction).flatten(),
			version: facets.remove(&Facet::DocumentVersion).flatten(),
			query_text: compiled.map(CompiledRequest::to_value),
			query_output,
			result_count,
			user_name: self.user_name,
			app_role: self.app_role,
			backend_role: self.backend_role,
			search_ts: self.search_ts,
			outcome,
			error_detail,
		}
	}
}

/// Trims and truncates error text to at most `max_chars` characters. Never returns an empty string.
pub fn bound_detail(detail: &str, max_chars: u32) -> String {
	let trimmed = detail.trim();

	if trimmed.is_empty() {
		return UNKNOWN_ERROR.to_string();
	}

	trimmed.chars().take(max_chars.max(1) as usize).collect()
}
