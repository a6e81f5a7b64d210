use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

/// Hard ceiling on the number of rows a single search may return.
pub const RESULT_LIMIT_CEILING: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub backend: Backend,
	#[serde(default)]
	pub search: Search,
	pub catalog: Catalog,
	pub security: Security,
	#[serde(default)]
	pub audit: Audit,
	pub documents: Documents,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Backend {
	/// One of "procedure" or "http".
	pub kind: String,
	/// Set-returning SQL function called by the procedure backend. Must be a plain identifier,
	/// optionally schema-qualified.
	#[serde(default = "default_procedure")]
	pub procedure: String,
	pub timeout_ms: u64,
	/// Reported as the backend role in audit records when the backend cannot report one itself.
	pub role_label: Option<String>,
	pub http: Option<BackendHttp>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendHttp {
	pub api_base: String,
	pub path: String,
	pub api_key: String,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Search {
	#[serde(default = "default_unconstrained_sentinel")]
	pub unconstrained_sentinel: String,
	#[serde(default = "default_result_limit")]
	pub default_result_limit: u32,
	#[serde(default = "default_result_limit_max")]
	pub result_limit_max: u32,
	#[serde(default = "default_max_query_chars")]
	pub max_query_chars: u32,
	/// Fail the search instead of clamping when the requested limit is out of range.
	#[serde(default)]
	pub reject_out_of_range_limit: bool,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			unconstrained_sentinel: default_unconstrained_sentinel(),
			default_result_limit: default_result_limit(),
			result_limit_max: default_result_limit_max(),
			max_query_chars: default_max_query_chars(),
			reject_out_of_range_limit: false,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
	pub cache_ttl_secs: u64,
	/// Zero disables the background refresh task.
	#[serde(default)]
	pub refresh_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	/// One of "password" or "trusted_identity".
	pub auth_mode: String,
	pub session_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Audit {
	#[serde(default = "default_error_detail_max_chars")]
	pub error_detail_max_chars: u32,
}
impl Default for Audit {
	fn default() -> Self {
		Self { error_detail_max_chars: default_error_detail_max_chars() }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Documents {
	pub stage_root: PathBuf,
}

fn default_procedure() -> String {
	"search_policy_clause".to_string()
}

fn default_unconstrained_sentinel() -> String {
	"ALL".to_string()
}

fn default_result_limit() -> u32 {
	10
}

fn default_result_limit_max() -> u32 {
	RESULT_LIMIT_CEILING
}

fn default_max_query_chars() -> u32 {
	1_000
}

fn default_error_detail_max_chars() -> u32 {
	1_024
}
