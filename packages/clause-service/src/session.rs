use std::{collections::HashMap, sync::Arc};

use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use clause_domain::{identity::Identity, present::SourceRef};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
	Anonymous,
	Authenticated,
}

/// Authentication state of one client connection, plus the document handles issued to it.
#[derive(Debug, Default)]
pub struct Session {
	identity: Option<Identity>,
	established_at: Option<OffsetDateTime>,
	documents: HashMap<Uuid, SourceRef>,
}
impl Session {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn authenticated(identity: Identity, now: OffsetDateTime) -> Self {
		let mut session = Self::new();

		session.login(identity, now);

		session
	}

	pub fn state(&self) -> SessionState {
		if self.identity.is_some() { SessionState::Authenticated } else { SessionState::Anonymous }
	}

	pub fn identity(&self) -> Option<&Identity> {
		self.identity.as_ref()
	}

	pub fn established_at(&self) -> Option<OffsetDateTime> {
		self.established_at
	}

	/// Replaces any previous identity. Handles issued before the login are dropped.
	pub fn login(&mut self, identity: Identity, now: OffsetDateTime) {
		self.documents.clear();

		self.identity = Some(identity);
		self.established_at = Some(now);
	}

	pub fn logout(&mut self) {
		if let Some(identity) = self.identity.take() {
			info!(target: "audit", event = "logout", subject_id = %identity.subject_id, "Session ended.");
		}

		self.established_at = None;
		self.documents.clear();
	}

	/// Gate for every operation. An expired session falls back to anonymous before failing.
	pub fn require(&mut self, now: OffsetDateTime, ttl: Duration) -> Result<&Identity> {
		if self.is_expired(now, ttl) {
			info!(target: "audit", event = "session_expired", "Session expired.");

			self.identity = None;
			self.established_at = None;
			self.documents.clear();
		}

		self.identity.as_ref().ok_or(Error::Unauthenticated)
	}

	pub fn is_expired(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		match self.established_at {
			Some(established_at) =>
				established_at.checked_add(ttl).map(|deadline| now >= deadline).unwrap_or(false),
			None => false,
		}
	}

	pub fn register_document(&mut self, source: SourceRef) -> Uuid {
		let handle = Uuid::new_v4();

		self.documents.insert(handle, source);

		handle
	}

	pub fn document(&self, handle: &Uuid) -> Option<&SourceRef> {
		self.documents.get(handle)
	}
}

/// Sessions keyed by the opaque token handed to the client.
///
/// Each session sits behind its own mutex, so one session runs one request at a time while
/// different sessions proceed concurrently.
#[derive(Debug, Default)]
pub struct SessionRegistry {
	sessions: RwLock<HashMap<Uuid, Arc<Mutex<Session>>>>,
}
impl SessionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn insert(&self, session: Session) -> Uuid {
		let token = Uuid::new_v4();

		self.sessions.write().await.insert(token, Arc::new(Mutex::new(session)));

		token
	}

	pub async fn get(&self, token: &Uuid) -> Option<Arc<Mutex<Session>>> {
		self.sessions.read().await.get(token).cloned()
	}

	pub async fn remove(&self, token: &Uuid) -> Option<Arc<Mutex<Session>>> {
		self.sessions.write().await.remove(token)
	}

	/// Drops sessions that are anonymous or past their TTL. Sessions busy with a request are kept.
	pub async fn prune(&self, now: OffsetDateTime, ttl: Duration) -> usize {
		let mut sessions = self.sessions.write().await;
		let before = sessions.len();

		sessions.retain(|_, session| match session.try_lock() {
			Ok(session) =>
				session.state() == SessionState::Authenticated && !session.is_expired(now, ttl),
			Err(_) => true,
		});

		before - sessions.len()
	}

	pub async fn len(&self) -> usize {
		self.sessions.read().await.len()
	}
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use clause_domain::identity::AppRole;

	use super::*;

	fn identity() -> Identity {
		Identity {
			subject_id: "jdoe".to_string(),
			display_name: "J. Doe".to_string(),
			app_role: AppRole::User,
			is_active: true,
		}
	}

	#[test]
	fn starts_anonymous_and_gates_until_login() {
		let now = datetime!(2026-10-16 12:00 UTC);
		let mut session = Session::new();

		assert_eq!(session.state(), SessionState::Anonymous);
		assert!(matches!(session.require(now, Duration::hours(1)), Err(Error::Unauthenticated)));

		session.login(identity(), now);

		assert_eq!(session.state(), SessionState::Authenticated);
		assert_eq!(
			session.require(now, Duration::hours(1)).map(|id| id.subject_id.clone()).ok(),
			Some("jdoe".to_string())
		);
	}

	#[test]
	fn logout_and_expiry_return_to_anonymous() {
		let now = datetime!(2026-10-16 12:00 UTC);
		let mut session = Session::authenticated(identity(), now);
		let handle = session.register_document(SourceRef::new("@stage/a.pdf"));

		assert!(session.document(&handle).is_some());

		session.logout();

		assert_eq!(session.state(), SessionState::Anonymous);
		assert!(session.document(&handle).is_none());

		session.login(identity(), now);

		let later = now + Duration::hours(2);

		assert!(matches!(session.require(later, Duration::hours(1)), Err(Error::Unauthenticated)));
		assert_eq!(session.state(), SessionState::Anonymous);

		// Re-enterable after expiry.
		session.login(identity(), later);

		assert!(session.require(later, Duration::hours(1)).is_ok());
	}

	#[tokio::test]
	async fn registry_prunes_expired_and_anonymous_sessions() {
		let now = datetime!(2026-10-16 12:00 UTC);
		let registry = SessionRegistry::new();
		let live = registry.insert(Session::authenticated(identity(), now)).await;
		let stale =
			registry.insert(Session::authenticated(identity(), now - Duration::hours(3))).await;
		let anonymous = registry.insert(Session::new()).await;

		assert_eq!(registry.prune(now, Duration::hours(1)).await, 2);
		assert!(registry.get(&live).await.is_some());
		assert!(registry.get(&stale).await.is_none());
		assert!(registry.get(&anonymous).await.is_none());
		assert!(registry.remove(&live).await.is_some());
		assert_eq!(registry.len().await, 0);
	}
}
