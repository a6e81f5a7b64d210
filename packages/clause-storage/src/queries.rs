use serde_json::{Map, Value};
use sqlx::PgExecutor;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
	Error, Result,
	db::Db,
	models::{AccessRow, AuditRow, FacetRow},
};

/// Parameters for one call of the search procedure. Facets left as `None` bind SQL NULL.
#[derive(Debug, Clone, Copy)]
pub struct SearchCall<'a> {
	pub text: &'a str,
	pub state: Option<&'a str>,
	pub lob: Option<&'a str>,
	pub version: Option<&'a str>,
	pub limit: i32,
}

pub struct InsertAuditArgs<'a> {
	pub search_text: &'a str,
	pub lob: Option<&'a str>,
	pub state: Option<&'a str>,
	pub version: Option<&'a str>,
	pub query_text: Option<&'a Value>,
	pub query_output: &'a Value,
	pub result_count: i32,
	pub user_name: &'a str,
	pub app_role: &'a str,
	pub backend_role: &'a str,
	pub outcome: &'a str,
	pub error_detail: Option<&'a str>,
	pub search_ts: OffsetDateTime,
}

/// Candidate access rows for a normalized handle: the full identifier, the handle's local part,
/// or stored emails whose local part equals the handle.
///
/// `upper` in Postgres only agrees with the caller's Unicode normalization for ASCII names, so
/// every stored name containing non-ASCII text is returned as well and left for the caller to
/// match.
pub async fn find_access_candidates(
	db: &Db,
	normalized: &str,
	local_part: &str,
) -> Result<Vec<AccessRow>> {
	let rows = sqlx::query_as::<_, AccessRow>(
		"\
SELECT user_name, display_name, app_role, is_active, secret_hash
FROM app_user_access
WHERE upper(btrim(user_name)) = $1
	OR upper(btrim(user_name)) = $2
	OR split_part(upper(btrim(user_name)), '@', 1) = $1
	OR octet_length(user_name) <> char_length(user_name)",
	)
	.bind(normalized)
	.bind(local_part)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn upsert_access(
	db: &Db,
	user_name: &str,
	display_name: Option<&str>,
	app_role: &str,
	is_active: bool,
	secret_hash: Option<&str>,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO app_user_access (user_name, display_name, app_role, is_active, secret_hash)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (user_name) DO UPDATE
SET
	display_name = EXCLUDED.display_name,
	app_role = EXCLUDED.app_role,
	is_active = EXCLUDED.is_active,
	secret_hash = EXCLUDED.secret_hash",
	)
	.bind(user_name)
	.bind(display_name)
	.bind(app_role)
	.bind(is_active)
	.bind(secret_hash)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn distinct_facets(db: &Db) -> Result<Vec<FacetRow>> {
	let rows = sqlx::query_as::<_, FacetRow>(
		"\
SELECT DISTINCT lob, state, version
FROM document_metadata
ORDER BY 1, 2, 3",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Calls the set-returning search function and returns each row as a JSON object keyed by the
/// function's own column names.
pub async fn call_search_procedure(
	db: &Db,
	procedure: &str,
	call: SearchCall<'_>,
) -> Result<Vec<Map<String, Value>>> {
	if !clause_config::is_sql_identifier(procedure) {
		return Err(Error::InvalidArgument(format!(
			"Search procedure {procedure:?} is not a plain SQL identifier."
		)));
	}

	// Only the validated identifier is formatted in. Every value is a bound parameter.
	let sql = format!("SELECT to_jsonb(r) AS row FROM {procedure}($1, $2, $3, $4, $5) AS r");
	let rows: Vec<(Value,)> = sqlx::query_as(sql.as_str())
		.bind(call.text)
		.bind(call.state)
		.bind(call.lob)
		.bind(call.version)
		.bind(call.limit)
		.fetch_all(&db.pool)
		.await?;

	rows.into_iter()
		.map(|(row,)| match row {
			Value::Object(map) => Ok(map),
			other => Err(Error::MalformedRow(format!("Expected a JSON object row, got {other}."))),
		})
		.collect()
}

pub async fn current_role(db: &Db) -> Result<String> {
	let role: String = sqlx::query_scalar("SELECT current_user::text").fetch_one(&db.pool).await?;

	Ok(role)
}

pub async fn insert_audit<'e, E>(executor: E, args: InsertAuditArgs<'_>) -> Result<Uuid>
where
	E: PgExecutor<'e>,
{
	let InsertAuditArgs {
		search_text,
		lob,
		state,
		version,
		query_text,
		query_output,
		result_count,
		user_name,
		app_role,
		backend_role,
		outcome,
		error_detail,
		search_ts,
	} = args;
	let audit_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO policy_search_audit (
	audit_id,
	search_text,
	lob,
	state,
	version,
	query_text,
	query_output,
	result_count,
	user_name,
	app_role,
	backend_role,
	outcome,
	error_detail,
	search_ts
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)",
	)
	.bind(audit_id)
	.bind(search_text)
	.bind(lob)
	.bind(state)
	.bind(version)
	.bind(query_text)
	.bind(query_output)
	.bind(result_count)
	.bind(user_name)
	.bind(app_role)
	.bind(backend_role)
	.bind(outcome)
	.bind(error_detail)
	.bind(search_ts)
	.execute(executor)
	.await?;

	Ok(audit_id)
}

pub async fn recent_audits(db: &Db, limit: i64) -> Result<Vec<AuditRow>> {
	let rows = sqlx::query_as::<_, AuditRow>(
		"\
SELECT
	audit_id,
	search_text,
	lob,
	state,
	version,
	query_text,
	query_output,
	result_count,
	user_name,
	app_role,
	backend_role,
	outcome,
	error_detail,
	search_ts
FROM policy_search_audit
ORDER BY search_ts DESC, audit_id
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
