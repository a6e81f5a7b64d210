use std::fmt::{Display, Formatter};

use serde::{Serialize, Serializer};
use unicode_normalization::UnicodeNormalization;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AppRole {
	Admin,
	User,
	/// Any other role string from the access table, uppercased. Treated as non-admin.
	Other(String),
}
impl AppRole {
	pub fn parse(raw: &str) -> Self {
		let normalized = raw.trim().to_uppercase();

		match normalized.as_str() {
			"ADMIN" => Self::Admin,
			"USER" => Self::User,
			_ => Self::Other(normalized),
		}
	}

	pub fn as_str(&self) -> &str {
		match self {
			Self::Admin => "ADMIN",
			Self::User => "USER",
			Self::Other(role) => role.as_str(),
		}
	}

	pub fn is_admin(&self) -> bool {
		matches!(self, Self::Admin)
	}
}
impl Display for AppRole {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
impl Serialize for AppRole {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
	/// A secret must accompany the username and verify against the stored hash.
	Password,
	/// The caller's identity was established upstream; only the role lookup runs.
	TrustedIdentity,
}
impl AuthMode {
	pub fn parse(raw: &str) -> Option<Self> {
		match raw {
			"password" => Some(Self::Password),
			"trusted_identity" => Some(Self::TrustedIdentity),
			_ => None,
		}
	}
}

/// A resolved principal. Immutable for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
	pub subject_id: String,
	pub display_name: String,
	pub app_role: AppRole,
	pub is_active: bool,
}

/// One row of the identity/role store.
#[derive(Debug, Clone)]
pub struct AccessRecord {
	pub user_name: String,
	pub display_name: Option<String>,
	pub app_role: String,
	pub is_active: bool,
	pub secret_hash: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
	NotAuthorized,
	/// Two distinct active identities matched at the same precedence level.
	Ambiguous { handle: String },
}
impl Display for ResolveError {
	fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::NotAuthorized => f.write_str("Not authorized."),
			Self::Ambiguous { handle } => {
				write!(f, "Multiple active identities match handle {handle:?}.")
			},
		}
	}
}
impl std::error::Error for ResolveError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum MatchKind {
	LocalPart,
	Full,
}

/// Trims, applies NFKC and uppercases a submitted username.
pub fn normalize_username(raw: &str) -> String {
	raw.trim().nfkc().collect::<String>().to_uppercase()
}

/// Text before the first `@`, or the whole handle when there is none.
pub fn local_part(handle: &str) -> &str {
	handle.split_once('@').map(|(local, _)| local).unwrap_or(handle)
}

/// Resolves a submitted username (and secret, in password mode) against candidate access rows.
///
/// A record whose identifier equals the input outranks one matched only through the local part
/// of an email address. Inactive records are considered when choosing the precedence level, so an
/// inactive exact match never falls through to someone else's local-part match.
pub fn resolve<F>(
	input: &str,
	secret: Option<&str>,
	mode: AuthMode,
	records: &[AccessRecord],
	verify_secret: F,
) -> Result<Identity, ResolveError>
where
	F: Fn(&str, &str) -> bool,
{
	let normalized = normalize_username(input);

	if normalized.is_empty() {
		return Err(ResolveError::NotAuthorized);
	}

	let matches = records
		.iter()
		.filter_map(|record| match_kind(&normalized, record).map(|kind| (kind, record)))
		.collect::<Vec<_>>();
	let Some(best) = matches.iter().map(|(kind, _)| *kind).max() else {
		return Err(ResolveError::NotAuthorized);
	};
	let mut active = matches
		.iter()
		.filter(|(kind, record)| *kind == best && record.is_active)
		.map(|(_, record)| *record);
	let Some(record) = active.next() else {
		return Err(ResolveError::NotAuthorized);
	};

	if active.next().is_some() {
		return Err(ResolveError::Ambiguous { handle: normalized });
	}

	if mode == AuthMode::Password {
		let (Some(secret), Some(stored)) = (secret, record.secret_hash.as_deref()) else {
			return Err(ResolveError::NotAuthorized);
		};

		if !verify_secret(secret, stored) {
			return Err(ResolveError::NotAuthorized);
		}
	}

	let display_name = record
		.display_name
		.as_deref()
		.map(str::trim)
		.filter(|name| !name.is_empty())
		.unwrap_or(record.user_name.as_str())
		.to_string();

	Ok(Identity {
		subject_id: record.user_name.clone(),
		display_name,
		app_role: AppRole::parse(&record.app_role),
		is_active: true,
	})
}

fn match_kind(normalized_input: &str, record: &AccessRecord) -> Option<MatchKind> {
	let stored = normalize_username(&record.user_name);

	if stored.is_empty() {
		return None;
	}
	if stored == normalized_input {
		return Some(MatchKind::Full);
	}

	let input_has_domain = normalized_input.contains('@');
	let stored_has_domain = stored.contains('@');

	if input_has_domain && !stored_has_domain && stored == local_part(normalized_input) {
		return Some(MatchKind::LocalPart);
	}
	if !input_has_domain && stored_has_domain && local_part(&stored) == normalized_input {
		return Some(MatchKind::LocalPart);
	}

	None
}
