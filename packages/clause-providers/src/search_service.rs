use std::time::Duration;

use reqwest::Client;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Posts one compiled search to the remote search service and returns its rows as JSON objects.
///
/// The request body is `{ "query_text", "filter", "limit" }`. Constrained facets only appear in
/// `filter`.
pub async fn search(
	cfg: &clause_config::BackendHttp,
	timeout_ms: u64,
	query_text: &str,
	filter: &Value,
	limit: u32,
) -> Result<Vec<Map<String, Value>>> {
	let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base.trim_end_matches('/'), cfg.path);
	let body = serde_json::json!({ "query_text": query_text, "filter": filter, "limit": limit });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_search_response(json)
}

fn parse_search_response(json: Value) -> Result<Vec<Map<String, Value>>> {
	let items = match json {
		Value::Array(items) => items,
		Value::Object(mut map) => match map.remove("results").or_else(|| map.remove("data")) {
			Some(Value::Array(items)) => items,
			_ =>
				return Err(Error::InvalidResponse {
					message: "Search response is missing a results array.".to_string(),
				}),
		},
		_ =>
			return Err(Error::InvalidResponse {
				message: "Search response must be an object or an array.".to_string(),
			}),
	};

	items
		.into_iter()
		.enumerate()
		.map(|(idx, item)| match item {
			Value::Object(map) => Ok(map),
			_ => Err(Error::InvalidResponse {
				message: format!("Search result {idx} is not an object."),
			}),
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_results_data_or_bare_arrays() {
		let row = serde_json::json!({ "CITATION": "Policy-1", "EXCERPT": "text", "SCORE": 0.4 });

		for json in [
			serde_json::json!({ "results": [row.clone()] }),
			serde_json::json!({ "data": [row.clone()] }),
			serde_json::json!([row.clone()]),
		] {
			let rows = parse_search_response(json).expect("Response must parse.");

			assert_eq!(rows.len(), 1);
			assert_eq!(rows[0].get("CITATION"), Some(&Value::from("Policy-1")));
		}
	}

	#[test]
	fn empty_results_are_not_an_error() {
		let rows = parse_search_response(serde_json::json!({ "results": [] }))
			.expect("Empty response must parse.");

		assert!(rows.is_empty());
	}

	#[test]
	fn rejects_missing_array_and_non_object_rows() {
		assert!(matches!(
			parse_search_response(serde_json::json!({ "items": [] })),
			Err(Error::InvalidResponse { .. })
		));
		assert!(matches!(
			parse_search_response(serde_json::json!([1, 2])),
			Err(Error::InvalidResponse { .. })
		));
		assert!(matches!(
			parse_search_response(Value::String("nope".to_string())),
			Err(Error::InvalidResponse { .. })
		));
	}
}
