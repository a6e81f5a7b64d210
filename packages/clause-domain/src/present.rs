use serde::{Deserialize, Serialize};

use crate::identity::AppRole;

/// Opaque, path-like handle a document fetcher can resolve to file bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);
impl SourceRef {
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Last path segment, used as the download file name.
	pub fn file_name(&self) -> &str {
		let trimmed = self.0.trim_end_matches('/');

		trimmed.rsplit('/').next().unwrap_or(trimmed)
	}
}

/// One matched clause as returned by the search backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRow {
	pub citation: String,
	pub excerpt: String,
	pub summary: Option<String>,
	/// Generated brief answer, when the backend produces one.
	pub answer: Option<String>,
	pub score: f64,
	pub source_ref: Option<SourceRef>,
}

/// A result row shaped for a caller's role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresentedRow {
	pub rank: u32,
	pub excerpt: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub citation: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub summary: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub answer: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub score: Option<f64>,
	#[serde(skip)]
	pub source_ref: Option<SourceRef>,
}

/// Sorts by score descending and keeps the first `limit` rows.
///
/// The sort is stable, so ties keep backend order. NaN scores sort last.
pub fn rank(mut rows: Vec<ResultRow>, limit: u32) -> Vec<ResultRow> {
	rows.sort_by(|a, b| score_key(b.score).total_cmp(&score_key(a.score)));
	rows.truncate(limit as usize);

	rows
}

/// Withholds document identity from non-admin roles.
pub fn redact(rows: Vec<ResultRow>, role: &AppRole) -> Vec<PresentedRow> {
	let admin = role.is_admin();

	rows.into_iter()
		.enumerate()
		.map(|(idx, row)| {
			let ResultRow { citation, excerpt, summary, answer, score, source_ref } = row;

			if admin {
				PresentedRow {
					rank: idx as u32 + 1,
					excerpt,
					citation: Some(citation),
					summary,
					answer,
					score: Some(score),
					source_ref,
				}
			} else {
				PresentedRow {
					rank: idx as u32 + 1,
					excerpt,
					citation: None,
					summary: None,
					answer: None,
					score: None,
					source_ref,
				}
			}
		})
		.collect()
}

pub fn present(rows: Vec<ResultRow>, role: &AppRole, limit: u32) -> Vec<PresentedRow> {
	redact(rank(rows, limit), role)
}

fn score_key(score: f64) -> f64 {
	if score.is_nan() { f64::NEG_INFINITY } else { score }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn row(citation: &str, score: f64) -> ResultRow {
		ResultRow {
			citation: citation.to_string(),
			excerpt: format!("excerpt of {citation}"),
			summary: Some(format!("summary of {citation}")),
			answer: None,
			score,
			source_ref: Some(SourceRef::new(format!("@stage/docs/{citation}.txt"))),
		}
	}

	#[test]
	fn ties_keep_backend_order() {
		let ranked = rank(vec![row("a", 0.5), row("b", 0.9), row("c", 0.5), row("d", 0.5)], 10);
		let order = ranked.iter().map(|row| row.citation.as_str()).collect::<Vec<_>>();

		assert_eq!(order, ["b", "a", "c", "d"]);
	}

	#[test]
	fn nan_scores_sort_last() {
		let ranked = rank(vec![row("nan", f64::NAN), row("low", -1.0), row("high", 0.3)], 10);
		let order = ranked.iter().map(|row| row.citation.as_str()).collect::<Vec<_>>();

		assert_eq!(order, ["high", "low", "nan"]);
	}

	#[test]
	fn close_scores_keep_their_order() {
		let ranked = rank(vec![row("low", 0.950_000_000_1), row("high", 0.950_000_000_3)], 10);
		let order = ranked.iter().map(|row| row.citation.as_str()).collect::<Vec<_>>();

		assert_eq!(order, ["high", "low"]);
	}

	#[test]
	fn truncates_after_sorting() {
		let ranked = rank(vec![row("a", 0.1), row("b", 0.2), row("c", 0.3)], 1);

		assert_eq!(ranked.len(), 1);
		assert_eq!(ranked[0].citation, "c");
	}

	#[test]
	fn redacted_rows_keep_download_hook() {
		let presented = present(vec![row("a", 0.1)], &AppRole::User, 5);

		assert_eq!(presented[0].source_ref, Some(SourceRef::new("@stage/docs/a.txt")));
		assert_eq!(presented[0].rank, 1);
	}

	#[test]
	fn file_name_is_last_segment() {
		assert_eq!(SourceRef::new("@stage/policies/ca/termination.pdf").file_name(), "termination.pdf");
		assert_eq!(SourceRef::new("plain.txt").file_name(), "plain.txt");
	}
}
