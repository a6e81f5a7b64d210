use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccessRow {
	pub user_name: String,
	pub display_name: Option<String>,
	pub app_role: String,
	pub is_active: bool,
	pub secret_hash: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FacetRow {
	pub lob: Option<String>,
	pub state: Option<String>,
	pub version: Option<String>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuditRow {
	pub audit_id: Uuid,
	pub search_text: String,
	pub lob: Option<String>,
	pub state: Option<String>,
	pub version: Option<String>,
	pub query_text: Option<Value>,
	pub query_output: Value,
	pub result_count: i32,
	pub user_name: String,
	pub app_role: String,
	pub backend_role: String,
	pub outcome: String,
	pub error_detail: Option<String>,
	pub search_ts: OffsetDateTime,
}
