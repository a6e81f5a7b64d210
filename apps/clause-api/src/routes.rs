use std::{collections::BTreeMap, sync::Arc};

use axum::{
	Json, Router,
	extract::{Path, Query, State, rejection::JsonRejection},
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use clause_domain::{
	facet::{Facet, FacetCatalog},
	identity::Identity,
	query::SearchRequest,
};
use clause_service::{AuditEntry, Error, SearchResponse, Session};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/auth/login", post(login))
		.route("/v1/auth/logout", post(logout))
		.route("/v1/auth/me", get(me))
		.route("/v1/facets", get(facets))
		.route("/v1/search", post(search))
		.route("/v1/documents/{handle}", get(download))
		.route("/v1/admin/audit", get(admin_audit))
		.with_state(state)
}

#[derive(Debug, Deserialize)]
struct LoginBody {
	username: String,
	#[serde(default)]
	secret: Option<String>,
}

#[derive(Debug, Serialize)]
struct LoginResponse {
	session_token: Uuid,
	identity: Identity,
}

#[derive(Debug, Deserialize)]
struct SearchBody {
	query_text: Option<String>,
	lob: Option<String>,
	state: Option<String>,
	version: Option<String>,
	result_limit: Option<i64>,
}
impl SearchBody {
	fn into_request(self) -> SearchRequest {
		let facets = [
			(Facet::LineOfBusiness, self.lob),
			(Facet::Jurisdiction, self.state),
			(Facet::DocumentVersion, self.version),
		]
		.into_iter()
		.filter_map(|(facet, value)| value.map(|value| (facet, value)))
		.collect::<BTreeMap<_, _>>();

		SearchRequest {
			query_text: self.query_text.unwrap_or_default(),
			facets,
			result_limit: self.result_limit,
		}
	}
}

#[derive(Debug, Serialize)]
struct FacetsResponse {
	unconstrained: String,
	#[serde(flatten)]
	values: FacetCatalog,
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
	limit: Option<u32>,
}

#[derive(Debug, Serialize)]
struct AuditResponse {
	records: Vec<AuditEntry>,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn login(
	State(state): State<AppState>,
	payload: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
	let Json(payload) = payload?;
	let identity = state.service.authenticate(&payload.username, payload.secret.as_deref()).await?;
	let now = OffsetDateTime::now_utc();

	state.sessions.prune(now, state.service.session_ttl()).await;

	let session_token = state.sessions.insert(Session::authenticated(identity.clone(), now)).await;

	Ok(Json(LoginResponse { session_token, identity }))
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
	let (token, session) = session_for(&state, &headers).await?;

	session.lock().await.logout();
	state.sessions.remove(&token).await;

	Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Identity>, ApiError> {
	let (_, session) = session_for(&state, &headers).await?;
	let mut session = session.lock().await;
	let identity =
		session.require(OffsetDateTime::now_utc(), state.service.session_ttl())?.clone();

	Ok(Json(identity))
}

async fn facets(
	State(state): State<AppState>,
	headers: HeaderMap,
) -> Result<Json<FacetsResponse>, ApiError> {
	let (_, session) = session_for(&state, &headers).await?;
	let mut session = session.lock().await;
	let catalog = state.service.facets(&mut session, OffsetDateTime::now_utc()).await?;

	Ok(Json(FacetsResponse {
		unconstrained: state.service.unconstrained_sentinel().to_string(),
		values: FacetCatalog::clone(&catalog),
	}))
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	payload: Result<Json<SearchBody>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
	let (_, session) = session_for(&state, &headers).await?;
	let mut session = session.lock().await;
	let now = OffsetDateTime::now_utc();
	let payload = match payload {
		Ok(Json(payload)) => payload,
		Err(rejection) => {
			let err = state.service.reject_search(&mut session, &rejection.body_text(), now).await;

			return Err(err.into());
		},
	};
	let response = state.service.search(&mut session, payload.into_request(), now).await?;

	Ok(Json(response))
}

async fn download(
	State(state): State<AppState>,
	headers: HeaderMap,
	Path(handle): Path<Uuid>,
) -> Result<Response, ApiError> {
	let (_, session) = session_for(&state, &headers).await?;
	let mut session = session.lock().await;
	let download = state.service.download(&mut session, &handle, OffsetDateTime::now_utc()).await?;
	let disposition =
		format!("attachment; filename=\"{}\"", download.file_name.replace(['"', '\\'], "_"));

	Ok((
		StatusCode::OK,
		[
			(header::CONTENT_TYPE, download.content_type.to_string()),
			(header::CONTENT_DISPOSITION, disposition),
		],
		download.bytes,
	)
		.into_response())
}

async fn admin_audit(
	State(state): State<AppState>,
	headers: HeaderMap,
	Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, ApiError> {
	let (_, session) = session_for(&state, &headers).await?;
	let mut session = session.lock().await;
	let records =
		state.service.recent_audits(&mut session, query.limit, OffsetDateTime::now_utc()).await?;

	Ok(Json(AuditResponse { records }))
}

/// Looks up the session named by the `Authorization: Bearer <token>` header.
async fn session_for(
	state: &AppState,
	headers: &HeaderMap,
) -> Result<(Uuid, Arc<Mutex<Session>>), ApiError> {
	let token = headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "))
		.and_then(|value| Uuid::parse_str(value.trim()).ok())
		.ok_or_else(unauthenticated)?;
	let session = state.sessions.get(&token).await.ok_or_else(unauthenticated)?;

	Ok((token, session))
}

fn unauthenticated() -> ApiError {
	json_error(
		StatusCode::UNAUTHORIZED,
		"unauthenticated",
		"A valid bearer session token is required.",
		None,
	)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	fields: Option<Vec<String>>,
}
impl ApiError {
	fn new(
		status: StatusCode,
		error_code: impl Into<String>,
		message: impl Into<String>,
		fields: Option<Vec<String>>,
	) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), fields }
	}
}

pub fn json_error(
	status: StatusCode,
	code: &str,
	message: impl Into<String>,
	fields: Option<Vec<String>>,
) -> ApiError {
	ApiError::new(status, code, message, fields)
}

impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::NotAuthorized =>
				json_error(StatusCode::UNAUTHORIZED, "not_authorized", err.to_string(), None),
			Error::Unauthenticated => unauthenticated(),
			Error::Forbidden { message } =>
				json_error(StatusCode::FORBIDDEN, "forbidden", message, None),
			Error::InvalidQuery { message } | Error::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message, None),
			Error::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "not_found", message, None),
			Error::Backend { message } =>
				json_error(StatusCode::BAD_GATEWAY, "backend_error", message, None),
			Error::Document { message } =>
				json_error(StatusCode::BAD_GATEWAY, "document_error", message, None),
			Error::AuditWrite { .. } | Error::Misconfigured { .. } | Error::Storage { .. } => {
				tracing::error!(error = %err, "Request failed with an internal error.");

				json_error(
					StatusCode::INTERNAL_SERVER_ERROR,
					"internal_error",
					"Internal error.",
					None,
				)
			},
		}
	}
}

impl From<JsonRejection> for ApiError {
	fn from(rejection: JsonRejection) -> Self {
		json_error(StatusCode::BAD_REQUEST, "invalid_request", rejection.body_text(), None)
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, fields: self.fields };

		(self.status, Json(body)).into_response()
	}
}
