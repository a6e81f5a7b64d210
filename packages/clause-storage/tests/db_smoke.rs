use serde_json::json;
use time::macros::datetime;

use clause_config::Postgres;
use clause_storage::{
	db::Db,
	queries::{self, InsertAuditArgs, SearchCall},
};
use clause_testkit::TestDatabase;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	db
}

fn audit_args<'a>(query_output: &'a serde_json::Value) -> InsertAuditArgs<'a> {
	InsertAuditArgs {
		search_text: "termination clause",
		lob: None,
		state: Some("CA"),
		version: None,
		query_text: None,
		query_output,
		result_count: 0,
		user_name: "JDOE",
		app_role: "USER",
		backend_role: "search_reader",
		outcome: "SUCCESS",
		error_detail: None,
		search_ts: datetime!(2026-10-16 12:00 UTC),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLAUSE_PG_DSN to run."]
async fn schema_bootstrap_is_idempotent() {
	let Some(base_dsn) = clause_testkit::env_dsn() else {
		eprintln!("Skipping schema_bootstrap_is_idempotent; set CLAUSE_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	db.ensure_schema().await.expect("Second bootstrap must succeed.");

	let count: i64 = sqlx::query_scalar(
		"SELECT count(*) FROM information_schema.tables WHERE table_name = 'policy_search_audit'",
	)
	.fetch_one(&db.pool)
	.await
	.expect("Failed to query schema tables.");

	assert_eq!(count, 1);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLAUSE_PG_DSN to run."]
async fn audit_rows_cannot_be_updated_or_deleted() {
	let Some(base_dsn) = clause_testkit::env_dsn() else {
		eprintln!("Skipping audit_rows_cannot_be_updated_or_deleted; set CLAUSE_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let output = json!([]);
	let audit_id =
		queries::insert_audit(&db.pool, audit_args(&output)).await.expect("Failed to insert audit.");

	sqlx::query("UPDATE policy_search_audit SET user_name = 'SOMEONE_ELSE' WHERE audit_id = $1")
		.bind(audit_id)
		.execute(&db.pool)
		.await
		.expect("Update statement must run.");
	sqlx::query("DELETE FROM policy_search_audit WHERE audit_id = $1")
		.bind(audit_id)
		.execute(&db.pool)
		.await
		.expect("Delete statement must run.");

	let rows = queries::recent_audits(&db, 10).await.expect("Failed to read audits.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].audit_id, audit_id);
	assert_eq!(rows[0].user_name, "JDOE");
	assert_eq!(rows[0].state.as_deref(), Some("CA"));
	assert_eq!(rows[0].lob, None);
	assert_eq!(rows[0].search_ts, datetime!(2026-10-16 12:00 UTC));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLAUSE_PG_DSN to run."]
async fn failure_rows_require_error_detail() {
	let Some(base_dsn) = clause_testkit::env_dsn() else {
		eprintln!("Skipping failure_rows_require_error_detail; set CLAUSE_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let output = json!([]);
	let mut args = audit_args(&output);

	args.outcome = "FAILURE";

	assert!(queries::insert_audit(&db.pool, args).await.is_err());

	let mut args = audit_args(&output);

	args.outcome = "FAILURE";
	args.error_detail = Some("backend timed out");

	queries::insert_audit(&db.pool, args).await.expect("Failure with detail must insert.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLAUSE_PG_DSN to run."]
async fn access_candidates_match_full_name_and_local_part() {
	let Some(base_dsn) = clause_testkit::env_dsn() else {
		eprintln!("Skipping access_candidates_match_full_name_and_local_part; set CLAUSE_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	queries::upsert_access(&db, "jdoe@example.com", Some("J. Doe"), "USER", true, None)
		.await
		.expect("Failed to upsert access.");
	queries::upsert_access(&db, "admin", None, "ADMIN", true, None)
		.await
		.expect("Failed to upsert access.");

	let rows = queries::find_access_candidates(&db, "JDOE", "JDOE")
		.await
		.expect("Failed to find candidates.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].user_name, "jdoe@example.com");

	let rows = queries::find_access_candidates(&db, "ADMIN@CORP.EXAMPLE", "ADMIN")
		.await
		.expect("Failed to find candidates.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].app_role, "ADMIN");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLAUSE_PG_DSN to run."]
async fn access_candidates_include_non_ascii_names() {
	let Some(base_dsn) = clause_testkit::env_dsn() else {
		eprintln!("Skipping access_candidates_include_non_ascii_names; set CLAUSE_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	for user_name in ["\u{FF4A}smith@example.com", "stra\u{DF}e", "other@example.com"] {
		queries::upsert_access(&db, user_name, None, "USER", true, None)
			.await
			.expect("Failed to upsert access.");
	}

	let rows = queries::find_access_candidates(&db, "JSMITH", "JSMITH")
		.await
		.expect("Failed to find candidates.");
	let names = rows.iter().map(|row| row.user_name.as_str()).collect::<Vec<_>>();

	assert!(names.contains(&"\u{FF4A}smith@example.com"));
	assert!(names.contains(&"stra\u{DF}e"));
	assert!(!names.contains(&"other@example.com"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set CLAUSE_PG_DSN to run."]
async fn distinct_facets_and_search_procedure_round_trip() {
	let Some(base_dsn) = clause_testkit::env_dsn() else {
		eprintln!("Skipping distinct_facets_and_search_procedure_round_trip; set CLAUSE_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	sqlx::query(
		"\
INSERT INTO document_metadata (document_id, lob, state, version, file_path)
VALUES
	('d1', 'AUTO', 'CA', 'v1', '@stage/d1.pdf'),
	('d2', 'AUTO', 'CA', 'v1', '@stage/d2.pdf'),
	('d3', 'HOME', NULL, 'v2', NULL)",
	)
	.execute(&db.pool)
	.await
	.expect("Failed to seed metadata.");

	let facets = queries::distinct_facets(&db).await.expect("Failed to read facets.");

	assert_eq!(facets.len(), 2);

	sqlx::query(
		"\
CREATE FUNCTION search_policy_clause(
	query_text text,
	p_state text,
	p_lob text,
	p_version text,
	p_limit integer
)
RETURNS TABLE (\"CITATION\" text, \"EXCERPT\" text, \"SCORE\" double precision)
LANGUAGE sql
AS $$
	SELECT 'Policy-1'::text, query_text || coalesce(p_state, '*'), 0.5::double precision
	LIMIT p_limit
$$",
	)
	.execute(&db.pool)
	.await
	.expect("Failed to create search function.");

	let call = SearchCall { text: "appeal", state: None, lob: Some("AUTO"), version: None, limit: 5 };
	let rows = queries::call_search_procedure(&db, "search_policy_clause", call)
		.await
		.expect("Search procedure must run.");

	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].get("CITATION"), Some(&json!("Policy-1")));
	assert_eq!(rows[0].get("EXCERPT"), Some(&json!("appeal*")));

	let err = queries::call_search_procedure(&db, "search_policy_clause; DROP TABLE x", call).await;

	assert!(err.is_err());

	let role = queries::current_role(&db).await.expect("Failed to read current role.");

	assert!(!role.is_empty());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
