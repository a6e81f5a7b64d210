use argon2::{
	Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use rand::rngs::OsRng;
use tracing::{error, info, warn};

use clause_domain::identity::{self, Identity, ResolveError};

use crate::{ClauseService, Error, Result, SecretVerifier};

/// Verifies PHC-format argon2 hashes.
pub struct Argon2Verifier;
impl SecretVerifier for Argon2Verifier {
	fn verify(&self, secret: &str, stored: &str) -> bool {
		verify_secret(secret, stored).unwrap_or(false)
	}
}

impl ClauseService {
	/// Resolves a submitted username (and secret in password mode) to an active identity.
	pub async fn authenticate(&self, username: &str, secret: Option<&str>) -> Result<Identity> {
		let normalized = identity::normalize_username(username);

		if normalized.is_empty() {
			return Err(Error::InvalidRequest { message: "username must be non-empty.".to_string() });
		}

		let records = self
			.seams
			.identities
			.candidates(&normalized, identity::local_part(&normalized))
			.await?;
		let verifier = self.seams.verifier.as_ref();

		match identity::resolve(username, secret, self.auth_mode, &records, |secret, stored| {
			verifier.verify(secret, stored)
		}) {
			Ok(identity) => {
				info!(
					target: "audit",
					event = "login",
					subject_id = %identity.subject_id,
					app_role = %identity.app_role,
					"Login succeeded."
				);

				Ok(identity)
			},
			Err(ResolveError::NotAuthorized) => {
				warn!(target: "audit", event = "login_failed", handle = %normalized, "Login rejected.");

				Err(Error::NotAuthorized)
			},
			Err(err @ ResolveError::Ambiguous { .. }) => {
				error!(
					target: "audit",
					event = "login_ambiguous",
					handle = %normalized,
					"Several active identities share this handle."
				);

				Err(Error::Misconfigured { message: err.to_string() })
			},
		}
	}
}

/// Produces the stored form of a secret for the access table.
pub fn hash_secret(secret: &str) -> Result<String> {
	let salt = SaltString::generate(&mut OsRng);
	let hash = Argon2::default()
		.hash_password(secret.as_bytes(), &salt)
		.map_err(|err| Error::InvalidRequest { message: format!("Failed to hash secret: {err}.") })?;

	Ok(hash.to_string())
}

pub fn verify_secret(secret: &str, stored: &str) -> Result<bool> {
	let parsed = PasswordHash::new(stored).map_err(|err| Error::Misconfigured {
		message: format!("Stored secret is not a valid password hash: {err}."),
	})?;

	Ok(Argon2::default().verify_password(secret.as_bytes(), &parsed).is_ok())
}
