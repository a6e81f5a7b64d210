pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_app_user_access.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_app_user_access.sql")),
				"tables/002_document_metadata.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_document_metadata.sql")),
				"tables/003_policy_search_audit.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_policy_search_audit.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
