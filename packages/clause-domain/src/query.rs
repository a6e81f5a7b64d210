use std::{
	collections::BTreeMap,
	fmt::{Display, Formatter},
};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::facet::Facet;

const MAX_FACET_VALUE_BYTES: usize = 256;

/// A search submission as the caller sent it. Facet values may carry the unconstrained sentinel.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
	pub query_text: String,
	pub facets: BTreeMap<Facet, String>,
	/// Signed so that negative requests reach the clamp instead of failing to parse.
	pub result_limit: Option<i64>,
}
impl SearchRequest {
	pub fn new(query_text: impl Into<String>) -> Self {
		Self { query_text: query_text.into(), ..Default::default() }
	}

	pub fn with_facet(mut self, facet: Facet, value: impl Into<String>) -> Self {
		self.facets.insert(facet, value.into());

		self
	}

	pub fn with_limit(mut self, limit: i64) -> Self {
		self.result_limit = Some(limit);

		self
	}
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
	pub unconstrained_sentinel: String,
	pub default_result_limit: u32,
	pub result_limit_max: u32,
	pub max_query_chars: u32,
	pub reject_out_of_range_limit: bool,
}
impl CompileOptions {
	pub fn from_config(cfg: &clause_config::Search) -> Self {
		Self {
			unconstrained_sentinel: cfg.unconstrained_sentinel.clone(),
			default_result_limit: cfg.default_result_limit,
			result_limit_max: cfg.result_limit_max.min(clause_config::RESULT_LIMIT_CEILING),
			max_query_chars: cfg.max_query_chars,
			reject_out_of_range_limit: cfg.reject_out_of_range_limit,
		}
	}

	/// True when the value means "do not filter on this facet".
	pub fn is_unconstrained(&self, value: &str) -> bool {
		let trimmed = value.trim();

		trimmed.is_empty() || trimmed.eq_ignore_ascii_case(&self.unconstrained_sentinel)
	}
}
impl Default for CompileOptions {
	fn default() -> Self {
		Self::from_config(&clause_config::Search::default())
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidQuery {
	pub message: String,
}
impl Display for InvalidQuery {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.message)
	}
}
impl std::error::Error for InvalidQuery {}

/// The backend-agnostic, parameter-bound form of a search.
///
/// It carries values only. Backends bind them as parameters or serialize them into a request
/// body; there is no rendered command text to interpolate into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompiledRequest {
	text: String,
	facets: BTreeMap<Facet, String>,
	limit: u32,
}
impl CompiledRequest {
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Constrained facets only. Unconstrained facets are absent, never empty strings.
	pub fn facets(&self) -> &BTreeMap<Facet, String> {
		&self.facets
	}

	pub fn facet(&self, facet: Facet) -> Option<&str> {
		self.facets.get(&facet).map(String::as_str)
	}

	pub fn limit(&self) -> u32 {
		self.limit
	}

	/// Filter object for search services that take `{facet: value}` maps.
	pub fn filter_object(&self) -> Value {
		let map = self
			.facets
			.iter()
			.map(|(facet, value)| (facet.key().to_string(), Value::String(value.clone())))
			.collect::<Map<_, _>>();

		Value::Object(map)
	}

	pub fn to_value(&self) -> Value {
		serde_json::json!({
			"text": self.text,
			"facets": self.filter_object(),
			"limit": self.limit,
		})
	}
}

pub fn compile(req: &SearchRequest, opts: &CompileOptions) -> Result<CompiledRequest, InvalidQuery> {
	let text = req.query_text.trim();

	if text.is_empty() {
		return Err(InvalidQuery { message: "query_text must be non-empty.".to_string() });
	}
	if text.chars().count() > opts.max_query_chars as usize {
		return Err(InvalidQuery {
			message: format!("query_text must be at most {} characters.", opts.max_query_chars),
		});
	}

	let mut facets = BTreeMap::new();

	for (facet, value) in &req.facets {
		if opts.is_unconstrained(value) {
			continue;
		}

		let trimmed = value.trim();

		if trimmed.len() > MAX_FACET_VALUE_BYTES {
			return Err(InvalidQuery {
				message: format!(
					"{} filter must be at most {MAX_FACET_VALUE_BYTES} bytes.",
					facet.key()
				),
			});
		}
		if trimmed.chars().any(char::is_control) {
			return Err(InvalidQuery {
				message: format!("{} filter must not contain control characters.", facet.key()),
			});
		}

		facets.insert(*facet, trimmed.to_string());
	}

	let limit = resolve_limit(req.result_limit, opts)?;

	Ok(CompiledRequest { text: text.to_string(), facets, limit })
}

fn resolve_limit(requested: Option<i64>, opts: &CompileOptions) -> Result<u32, InvalidQuery> {
	let max = opts.result_limit_max.max(1);
	let Some(requested) = requested else {
		return Ok(opts.default_result_limit.clamp(1, max));
	};

	if (1..=i64::from(max)).contains(&requested) {
		return Ok(requested as u32);
	}
	if opts.reject_out_of_range_limit {
		return Err(InvalidQuery { message: format!("result_limit must be between 1 and {max}.") });
	}

	Ok(requested.clamp(1, i64::from(max)) as u32)
}
