use std::{collections::HashMap, time::Duration};

use serde_json::{Map, Value};
use tokio::sync::OnceCell;

use clause_domain::{
	facet::Facet,
	present::{ResultRow, SourceRef},
	query::CompiledRequest,
};
use clause_storage::{
	db::Db,
	queries::{self, SearchCall},
};

use crate::{BoxFuture, ClauseService, Error, Result, SearchBackend};

const DEFAULT_HTTP_BACKEND_ROLE: &str = "SEARCH_SERVICE";

/// Calls a set-returning SQL function with bound parameters.
pub struct ProcedureBackend {
	db: Db,
	procedure: String,
	role_label: Option<String>,
	role: OnceCell<String>,
}
impl ProcedureBackend {
	pub fn new(db: Db, procedure: String, role_label: Option<String>) -> Self {
		Self { db, procedure, role_label, role: OnceCell::new() }
	}
}
impl SearchBackend for ProcedureBackend {
	fn search<'a>(
		&'a self,
		request: &'a CompiledRequest,
	) -> BoxFuture<'a, Result<Vec<Map<String, Value>>>> {
		Box::pin(async move {
			let call = SearchCall {
				text: request.text(),
				state: request.facet(Facet::Jurisdiction),
				lob: request.facet(Facet::LineOfBusiness),
				version: request.facet(Facet::DocumentVersion),
				limit: i32::try_from(request.limit()).unwrap_or(i32::MAX),
			};

			Ok(queries::call_search_procedure(&self.db, &self.procedure, call).await?)
		})
	}

	fn backend_role(&self) -> BoxFuture<'_, Result<String>> {
		Box::pin(async move {
			if let Some(label) = self.role_label.as_ref() {
				return Ok(label.clone());
			}

			let role = self
				.role
				.get_or_try_init(|| async { queries::current_role(&self.db).await })
				.await?;

			Ok(role.clone())
		})
	}
}

/// Posts compiled requests to a managed search service.
pub struct HttpBackend {
	cfg: clause_config::BackendHttp,
	timeout_ms: u64,
	role_label: Option<String>,
}
impl HttpBackend {
	pub fn new(cfg: clause_config::BackendHttp, timeout_ms: u64, role_label: Option<String>) -> Self {
		Self { cfg, timeout_ms, role_label }
	}
}
impl SearchBackend for HttpBackend {
	fn search<'a>(
		&'a self,
		request: &'a CompiledRequest,
	) -> BoxFuture<'a, Result<Vec<Map<String, Value>>>> {
		Box::pin(async move {
			let filter = request.filter_object();

			Ok(clause_providers::search_service::search(
				&self.cfg,
				self.timeout_ms,
				request.text(),
				&filter,
				request.limit(),
			)
			.await?)
		})
	}

	fn backend_role(&self) -> BoxFuture<'_, Result<String>> {
		let role = self.role_label.clone().unwrap_or_else(|| DEFAULT_HTTP_BACKEND_ROLE.to_string());

		Box::pin(async move { Ok(role) })
	}
}

impl ClauseService {
	/// Runs a compiled request against the backend under the configured timeout and normalizes
	/// the returned rows. Every failure surfaces as `Backend`.
	pub async fn execute(&self, request: &CompiledRequest) -> Result<Vec<ResultRow>> {
		let timeout_ms = self.cfg.backend.timeout_ms;
		let rows = match tokio::time::timeout(
			Duration::from_millis(timeout_ms),
			self.seams.backend.search(request),
		)
		.await
		{
			Ok(Ok(rows)) => rows,
			Ok(Err(Error::Backend { message })) => return Err(Error::Backend { message }),
			Ok(Err(err)) => return Err(Error::Backend { message: err.to_string() }),
			Err(_) =>
				return Err(Error::Backend {
					message: format!("Search backend timed out after {timeout_ms} ms."),
				}),
		};

		normalize_rows(rows)
	}
}

/// Canonical column key: surrounding quotes and whitespace removed, upper case.
pub fn column_key(raw: &str) -> String {
	raw.trim().trim_matches('"').trim().to_uppercase()
}

/// Maps backend rows onto [`ResultRow`], matching column names case- and quote-insensitively.
pub fn normalize_rows(rows: Vec<Map<String, Value>>) -> Result<Vec<ResultRow>> {
	rows.into_iter().enumerate().map(|(idx, row)| normalize_row(idx, row)).collect()
}

fn normalize_row(idx: usize, row: Map<String, Value>) -> Result<ResultRow> {
	let columns =
		row.into_iter().map(|(key, value)| (column_key(&key), value)).collect::<HashMap<_, _>>();
	let citation = required_text(&columns, "CITATION", idx)?;
	let excerpt = required_text(&columns, "EXCERPT", idx)?;
	let score = match columns.get("SCORE") {
		Some(Value::Number(number)) => number.as_f64(),
		Some(Value::String(raw)) => raw.trim().parse::<f64>().ok(),
		_ => None,
	}
	.ok_or_else(|| Error::Backend {
		message: format!("Result row {idx} has a missing or non-numeric SCORE column."),
	})?;

	Ok(ResultRow {
		citation,
		excerpt,
		summary: optional_text(&columns, "SUMMARY"),
		answer: optional_text(&columns, "FINAL_ANSWER"),
		score,
		source_ref: optional_text(&columns, "FILE_PATH").map(SourceRef::new),
	})
}

fn required_text(columns: &HashMap<String, Value>, key: &str, idx: usize) -> Result<String> {
	optional_text(columns, key).ok_or_else(|| Error::Backend {
		message: format!("Result row {idx} is missing the {key} column."),
	})
}

fn optional_text(columns: &HashMap<String, Value>, key: &str) -> Option<String> {
	match columns.get(key)? {
		Value::String(text) if !text.trim().is_empty() => Some(text.clone()),
		Value::Number(number) => Some(number.to_string()),
		_ => None,
	}
}
