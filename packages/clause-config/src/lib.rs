mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Audit, Backend, BackendHttp, Catalog, Config, Documents, Postgres, RESULT_LIMIT_CEILING,
	Search, Security, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}

	validate_backend(cfg)?;
	validate_search(cfg)?;

	if cfg.catalog.cache_ttl_secs == 0 {
		return Err(Error::Validation {
			message: "catalog.cache_ttl_secs must be greater than zero.".to_string(),
		});
	}
	if !matches!(cfg.security.auth_mode.as_str(), "password" | "trusted_identity") {
		return Err(Error::Validation {
			message: "security.auth_mode must be one of password or trusted_identity.".to_string(),
		});
	}
	if cfg.security.session_ttl_secs == 0 {
		return Err(Error::Validation {
			message: "security.session_ttl_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.audit.error_detail_max_chars == 0 {
		return Err(Error::Validation {
			message: "audit.error_detail_max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.documents.stage_root.as_os_str().is_empty() {
		return Err(Error::Validation {
			message: "documents.stage_root must be non-empty.".to_string(),
		});
	}

	Ok(())
}

/// Accepts `name` or `schema.name` where each part is a plain SQL identifier.
pub fn is_sql_identifier(raw: &str) -> bool {
	let parts = raw.split('.').collect::<Vec<_>>();

	if parts.len() > 2 {
		return false;
	}

	parts.iter().all(|part| {
		let mut chars = part.chars();

		match chars.next() {
			Some(first) if first.is_ascii_alphabetic() || first == '_' =>
				chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
			_ => false,
		}
	})
}

fn validate_backend(cfg: &Config) -> Result<()> {
	let backend = &cfg.backend;

	if backend.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "backend.timeout_ms must be greater than zero.".to_string(),
		});
	}

	match backend.kind.as_str() {
		"procedure" =>
			if !is_sql_identifier(&backend.procedure) {
				return Err(Error::Validation {
					message: "backend.procedure must be a plain SQL identifier, optionally schema-qualified."
						.to_string(),
				});
			},
		"http" => {
			let Some(http) = backend.http.as_ref() else {
				return Err(Error::Validation {
					message: "backend.http is required when backend.kind is http.".to_string(),
				});
			};

			for (label, value) in [
				("backend.http.api_base", &http.api_base),
				("backend.http.path", &http.path),
				("backend.http.api_key", &http.api_key),
			] {
				if value.trim().is_empty() {
					return Err(Error::Validation { message: format!("{label} must be non-empty.") });
				}
			}
		},
		_ => {
			return Err(Error::Validation {
				message: "backend.kind must be one of procedure or http.".to_string(),
			});
		},
	}

	Ok(())
}

fn validate_search(cfg: &Config) -> Result<()> {
	let search = &cfg.search;

	if search.unconstrained_sentinel.trim().is_empty() {
		return Err(Error::Validation {
			message: "search.unconstrained_sentinel must be non-empty.".to_string(),
		});
	}
	if !(1..=RESULT_LIMIT_CEILING).contains(&search.result_limit_max) {
		return Err(Error::Validation {
			message: format!("search.result_limit_max must be in the range 1-{RESULT_LIMIT_CEILING}."),
		});
	}
	if !(1..=search.result_limit_max).contains(&search.default_result_limit) {
		return Err(Error::Validation {
			message: "search.default_result_limit must be between 1 and search.result_limit_max."
				.to_string(),
		});
	}
	if search.max_query_chars == 0 {
		return Err(Error::Validation {
			message: "search.max_query_chars must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.backend.role_label.as_deref().map(|label| label.trim().is_empty()).unwrap_or(false) {
		cfg.backend.role_label = None;
	}

	cfg.search.unconstrained_sentinel = cfg.search.unconstrained_sentinel.trim().to_string();
}
