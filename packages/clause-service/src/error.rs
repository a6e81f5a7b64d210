pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Not authorized.")]
	NotAuthorized,
	#[error("Authentication required.")]
	Unauthenticated,
	#[error("Forbidden: {message}")]
	Forbidden { message: String },
	#[error("Invalid query: {message}")]
	InvalidQuery { message: String },
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Search backend error: {message}")]
	Backend { message: String },
	#[error("Audit write failed: {message}")]
	AuditWrite { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("Document error: {message}")]
	Document { message: String },
	#[error("Misconfigured: {message}")]
	Misconfigured { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<clause_storage::Error> for Error {
	fn from(err: clause_storage::Error) -> Self {
		match err {
			clause_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			clause_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			clause_storage::Error::MalformedRow(message) => Self::Backend { message },
		}
	}
}

impl From<clause_providers::Error> for Error {
	fn from(err: clause_providers::Error) -> Self {
		if err.is_timeout() {
			return Self::Backend { message: "Search service request timed out.".to_string() };
		}

		Self::Backend { message: err.to_string() }
	}
}

impl From<clause_domain::query::InvalidQuery> for Error {
	fn from(err: clause_domain::query::InvalidQuery) -> Self {
		Self::InvalidQuery { message: err.message }
	}
}
