use std::collections::BTreeMap;

use time::macros::datetime;

use clause_domain::{
	audit::{AuditOutcome, SearchAttempt},
	facet::Facet,
	identity::{self, AccessRecord, AppRole, AuthMode, Identity, ResolveError},
	present::{self, ResultRow, SourceRef},
	query::{self, CompileOptions, SearchRequest},
};

fn access(user_name: &str, role: &str, active: bool, secret: &str) -> AccessRecord {
	AccessRecord {
		user_name: user_name.to_string(),
		display_name: Some(format!("{user_name} display")),
		app_role: role.to_string(),
		is_active: active,
		secret_hash: Some(format!("hash:{secret}")),
	}
}

fn verify(secret: &str, stored: &str) -> bool {
	stored.strip_prefix("hash:") == Some(secret)
}

fn result_row(citation: &str, score: f64) -> ResultRow {
	ResultRow {
		citation: citation.to_string(),
		excerpt: format!("Excerpt {citation}"),
		summary: Some(format!("Summary {citation}")),
		answer: Some(format!("Answer {citation}")),
		score,
		source_ref: Some(SourceRef::new(format!("@stage/{citation}.txt"))),
	}
}

fn admin() -> Identity {
	Identity {
		subject_id: "ADMIN@EXAMPLE.COM".to_string(),
		display_name: "Admin".to_string(),
		app_role: AppRole::Admin,
		is_active: true,
	}
}

#[test]
fn resolve_accepts_case_insensitive_identifiers_and_local_parts() {
	let records = [access("jdoe@example.com", "user", true, "pw"), access("admin", "admin", true, "pw")];

	for input in ["jdoe@example.com", "JDOE@EXAMPLE.COM", "jdoe", " JDoe "] {
		let identity = identity::resolve(input, None, AuthMode::TrustedIdentity, &records, verify)
			.unwrap_or_else(|err| panic!("{input:?} must resolve: {err}."));

		assert_eq!(identity.subject_id, "jdoe@example.com");
		assert_eq!(identity.app_role, AppRole::User);
	}
	for input in ["Admin", "admin@corp.example"] {
		let identity = identity::resolve(input, None, AuthMode::TrustedIdentity, &records, verify)
			.unwrap_or_else(|err| panic!("{input:?} must resolve: {err}."));

		assert_eq!(identity.app_role, AppRole::Admin);
	}
	for input in ["jdo", "someone@example.com", "", "   ", "jdoe@example"] {
		assert_eq!(
			identity::resolve(input, None, AuthMode::TrustedIdentity, &records, verify),
			Err(ResolveError::NotAuthorized),
			"{input:?} must not resolve."
		);
	}
}

#[test]
fn resolve_rejects_inactive_records() {
	let records = [access("jdoe", "admin", false, "pw")];

	assert_eq!(
		identity::resolve("jdoe", Some("pw"), AuthMode::Password, &records, verify),
		Err(ResolveError::NotAuthorized)
	);
}

#[test]
fn password_mode_requires_matching_secret() {
	let records = [access("jdoe", "user", true, "correct")];

	assert!(identity::resolve("jdoe", Some("correct"), AuthMode::Password, &records, verify).is_ok());
	assert_eq!(
		identity::resolve("jdoe", Some("wrong"), AuthMode::Password, &records, verify),
		Err(ResolveError::NotAuthorized)
	);
	assert_eq!(
		identity::resolve("jdoe", None, AuthMode::Password, &records, verify),
		Err(ResolveError::NotAuthorized)
	);

	let mut no_secret = access("kim", "user", true, "unused");

	no_secret.secret_hash = None;

	assert_eq!(
		identity::resolve("kim", Some("anything"), AuthMode::Password, &[no_secret], verify),
		Err(ResolveError::NotAuthorized)
	);
}

#[test]
fn full_identifier_match_takes_precedence_over_local_part() {
	let records = [access("jdoe", "user", true, "pw"), access("jdoe@example.com", "admin", true, "pw")];
	let identity =
		identity::resolve("jdoe@example.com", None, AuthMode::TrustedIdentity, &records, verify)
			.expect("Full match must resolve.");

	assert_eq!(identity.subject_id, "jdoe@example.com");
	assert_eq!(identity.app_role, AppRole::Admin);

	let identity = identity::resolve("jdoe", None, AuthMode::TrustedIdentity, &records, verify)
		.expect("Bare handle must resolve to the full match.");

	assert_eq!(identity.subject_id, "jdoe");
}

#[test]
fn local_part_collision_is_a_misconfiguration() {
	let records =
		[access("jdoe@example.com", "user", true, "pw"), access("jdoe@example.org", "admin", true, "pw")];

	assert!(matches!(
		identity::resolve("jdoe", None, AuthMode::TrustedIdentity, &records, verify),
		Err(ResolveError::Ambiguous { .. })
	));

	// An inactive twin does not collide.
	let records =
		[access("jdoe@example.com", "user", true, "pw"), access("jdoe@example.org", "admin", false, "pw")];

	assert!(identity::resolve("jdoe", None, AuthMode::TrustedIdentity, &records, verify).is_ok());
}

#[test]
fn unconstrained_facets_are_omitted_from_the_compiled_request() {
	let opts = CompileOptions::default();

	for sentinel in ["ALL", "all", "", "  "] {
		let req = SearchRequest::new("termination clause")
			.with_facet(Facet::LineOfBusiness, sentinel)
			.with_facet(Facet::Jurisdiction, "CA")
			.with_facet(Facet::DocumentVersion, sentinel);
		let compiled = query::compile(&req, &opts).expect("Request must compile.");

		assert_eq!(compiled.facet(Facet::LineOfBusiness), None);
		assert_eq!(compiled.facet(Facet::DocumentVersion), None);
		assert_eq!(compiled.facet(Facet::Jurisdiction), Some("CA"));
		assert_eq!(compiled.facets().len(), 1);
		assert!(compiled.facets().values().all(|value| !value.is_empty()));
		assert_eq!(compiled.filter_object(), serde_json::json!({ "state": "CA" }));
	}
}

#[test]
fn compile_rejects_blank_query_text() {
	for text in ["", "   ", "\n\t"] {
		let err = query::compile(&SearchRequest::new(text), &CompileOptions::default())
			.expect_err("Blank text must fail.");

		assert!(err.message.contains("query_text"));
	}
}

#[test]
fn compile_clamps_limit_into_range() {
	let opts = CompileOptions::default();

	for (requested, expected) in [(-5, 1), (0, 1), (1, 1), (10, 10), (20, 20), (21, 20), (i64::MAX, 20)] {
		let compiled =
			query::compile(&SearchRequest::new("appeal").with_limit(requested), &opts).expect("compile");

		assert_eq!(compiled.limit(), expected, "requested {requested}");
	}
}

#[test]
fn present_is_sorted_bounded_and_stable_on_sorted_input() {
	let rows = vec![result_row("a", 0.3), result_row("b", 0.9), result_row("c", 0.6), result_row("d", 0.1)];

	for limit in 1..=5 {
		let presented = present::present(rows.clone(), &AppRole::Admin, limit);

		assert!(presented.len() <= limit as usize);
		assert!(presented.windows(2).all(|pair| pair[0].score >= pair[1].score));
	}

	let ranked = present::rank(rows, 10);
	let again = present::rank(ranked.clone(), 10);

	assert_eq!(ranked, again);
}

#[test]
fn role_redaction_withholds_citation_from_non_admins() {
	let rows = vec![result_row("Policy-7 s.3", 0.8)];
	let admin_view = present::present(rows.clone(), &AppRole::Admin, 5);
	let user_view = present::present(rows.clone(), &AppRole::User, 5);
	let other_view = present::present(rows, &AppRole::parse("auditor"), 5);

	assert_eq!(admin_view[0].citation.as_deref(), Some("Policy-7 s.3"));
	assert_eq!(admin_view[0].summary.as_deref(), Some("Summary Policy-7 s.3"));
	assert_eq!(admin_view[0].answer.as_deref(), Some("Answer Policy-7 s.3"));

	for view in [&user_view, &other_view] {
		assert_eq!(view[0].excerpt, "Excerpt Policy-7 s.3");
		assert!(view[0].citation.is_none());
		assert!(view[0].summary.is_none());
		assert!(view[0].answer.is_none());
		assert!(view[0].score.is_none());
	}

	let json = serde_json::to_value(&user_view[0]).expect("Row must serialize.");

	assert!(json.get("citation").is_none());
	assert!(json.get("source_ref").is_none());
}

#[test]
fn audit_records_capture_identity_and_constrained_facets() {
	let opts = CompileOptions::default();
	let req = SearchRequest::new("termination clause")
		.with_facet(Facet::LineOfBusiness, "ALL")
		.with_facet(Facet::Jurisdiction, "CA")
		.with_limit(10);
	let compiled = query::compile(&req, &opts).expect("compile");
	let ts = datetime!(2026-10-16 12:00 UTC);
	let attempt = SearchAttempt::new(&req.query_text, &req.facets, &opts, &admin(), "SEARCH_ROLE", ts);
	let rows = present::rank(vec![result_row("a", 0.2), result_row("b", 0.4)], 10);
	let record = attempt.succeeded(&compiled, &rows);

	assert_eq!(record.outcome, AuditOutcome::Success);
	assert_eq!(record.result_count, 2);
	assert_eq!(record.lob, None);
	assert_eq!(record.state.as_deref(), Some("CA"));
	assert_eq!(record.version, None);
	assert_eq!(record.user_name, "ADMIN@EXAMPLE.COM");
	assert_eq!(record.app_role, "ADMIN");
	assert_eq!(record.backend_role, "SEARCH_ROLE");
	assert_eq!(record.search_ts, ts);
	assert_eq!(record.query_output.as_array().map(Vec::len), Some(2));
	assert_eq!(record.query_text, Some(compiled.to_value()));
	assert!(record.error_detail.is_none());
}

#[test]
fn failed_attempts_carry_bounded_detail_and_zero_results() {
	let opts = CompileOptions::default();
	let facets = BTreeMap::from([(Facet::DocumentVersion, "v3".to_string())]);
	let attempt = SearchAttempt::new("", &facets, &opts, &admin(), "SEARCH_ROLE", datetime!(2026-10-16 12:00 UTC));
	let record = attempt.failed(None, &"x".repeat(5_000), 128);

	assert_eq!(record.outcome, AuditOutcome::Failure);
	assert_eq!(record.result_count, 0);
	assert_eq!(record.query_text, None);
	assert_eq!(record.version.as_deref(), Some("v3"));
	assert_eq!(record.error_detail.as_deref().map(str::len), Some(128));
	assert_eq!(record.query_output, serde_json::json!([]));
}
