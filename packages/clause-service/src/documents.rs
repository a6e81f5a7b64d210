use std::{
	io::ErrorKind,
	path::{Component, Path, PathBuf},
};

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use clause_domain::present::SourceRef;

use crate::{BoxFuture, ClauseService, DocumentFetcher, Error, Result, Session};

const FALLBACK_CONTENT_TYPE: &str = "text/plain";

/// File bytes ready to hand to the client.
#[derive(Debug, Clone)]
pub struct Download {
	pub file_name: String,
	pub content_type: &'static str,
	pub bytes: Vec<u8>,
}

/// Reads documents from a local directory that mirrors the document stage.
///
/// A leading `@stage_name/` segment is dropped. The remainder must stay inside the root.
pub struct StageFetcher {
	root: PathBuf,
}
impl StageFetcher {
	pub fn new(root: PathBuf) -> Self {
		Self { root }
	}

	pub fn resolve(&self, source: &SourceRef) -> Result<PathBuf> {
		let raw = source.as_str().trim();
		let relative = match raw.strip_prefix('@') {
			Some(staged) => staged.split_once('/').map(|(_, rest)| rest).unwrap_or(""),
			None => raw,
		};
		let relative = Path::new(relative);

		if relative.as_os_str().is_empty()
			|| !relative.components().all(|component| matches!(component, Component::Normal(_)))
		{
			return Err(Error::Document {
				message: format!("Document reference {raw:?} does not name a staged file."),
			});
		}

		Ok(self.root.join(relative))
	}
}
impl DocumentFetcher for StageFetcher {
	fn fetch<'a>(&'a self, source: &'a SourceRef) -> BoxFuture<'a, Result<Vec<u8>>> {
		Box::pin(async move {
			let path = self.resolve(source)?;

			tokio::fs::read(&path).await.map_err(|err| match err.kind() {
				ErrorKind::NotFound =>
					Error::NotFound { message: format!("Document {:?} is not staged.", source.as_str()) },
				_ => Error::Document {
					message: format!("Failed to read document {:?}: {err}.", source.as_str()),
				},
			})
		})
	}
}

impl ClauseService {
	/// Fetches the document behind a handle issued to this session by an earlier search.
	pub async fn download(
		&self,
		session: &mut Session,
		handle: &Uuid,
		now: OffsetDateTime,
	) -> Result<Download> {
		let subject_id = session.require(now, self.session_ttl())?.subject_id.clone();
		let Some(source) = session.document(handle).cloned() else {
			return Err(Error::NotFound { message: "Unknown document handle.".to_string() });
		};
		let bytes = match self.seams.documents.fetch(&source).await {
			Ok(bytes) => bytes,
			Err(err) => {
				warn!(
					subject_id = %subject_id,
					source = source.as_str(),
					error = %err,
					"Document fetch failed."
				);

				return Err(err);
			},
		};
		let file_name = source.file_name().to_string();

		info!(
			target: "audit",
			event = "download",
			subject_id = %subject_id,
			file_name = %file_name,
			bytes = bytes.len(),
			"Document downloaded."
		);

		Ok(Download { content_type: content_type(&file_name), file_name, bytes })
	}
}

/// Content type from the file extension, `text/plain` when unknown.
pub fn content_type(file_name: &str) -> &'static str {
	let extension = Path::new(file_name)
		.extension()
		.and_then(|ext| ext.to_str())
		.map(str::to_ascii_lowercase)
		.unwrap_or_default();

	match extension.as_str() {
		"pdf" => "application/pdf",
		"doc" => "application/msword",
		"docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
		"htm" | "html" => "text/html",
		"md" => "text/markdown",
		"csv" => "text/csv",
		"json" => "application/json",
		"rtf" => "application/rtf",
		"xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
		_ => FALLBACK_CONTENT_TYPE,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_stage_references_inside_root() {
		let fetcher = StageFetcher::new(PathBuf::from("/srv/stage"));

		assert_eq!(
			fetcher.resolve(&SourceRef::new("@POLICY_DOCS/auto/ca.pdf")).ok(),
			Some(PathBuf::from("/srv/stage/auto/ca.pdf"))
		);
		assert_eq!(
			fetcher.resolve(&SourceRef::new("auto/ca.pdf")).ok(),
			Some(PathBuf::from("/srv/stage/auto/ca.pdf"))
		);

		for raw in ["@POLICY_DOCS/../etc/passwd", "/etc/passwd", "@POLICY_DOCS", "", "./a.pdf"] {
			assert!(
				matches!(fetcher.resolve(&SourceRef::new(raw)), Err(Error::Document { .. })),
				"{raw:?} must be rejected."
			);
		}
	}

	#[test]
	fn content_type_follows_extension() {
		assert_eq!(content_type("policy.PDF"), "application/pdf");
		assert_eq!(content_type("notes.md"), "text/markdown");
		assert_eq!(content_type("clause"), FALLBACK_CONTENT_TYPE);
		assert_eq!(content_type("archive.bin"), FALLBACK_CONTENT_TYPE);
	}

	#[tokio::test]
	async fn missing_files_are_not_found() {
		let fetcher = StageFetcher::new(std::env::temp_dir().join("clause-missing-stage"));
		let err = fetcher.fetch(&SourceRef::new("@S/none.pdf")).await;

		assert!(matches!(err, Err(Error::NotFound { .. })));
	}
}
