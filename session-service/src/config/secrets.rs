//! Docker-style secret files: one file per secret, named after the secret.

use secrecy::Secret;
use service_core::error::AppError;
use std::io::ErrorKind;
use std::path::Path;

pub const DEFAULT_SECRETS_DIR: &str = "/run/secrets";

/// File name holding the JWT signing secret.
pub const JWT_SECRET_NAME: &str = "jwt_key";

/// Read `dir/name`. A missing file or directory is `Ok(None)`; any other
/// I/O failure is a configuration error.
pub fn read_secret_file(dir: &Path, name: &str) -> Result<Option<Secret<String>>, AppError> {
    let path = dir.join(name);
    match std::fs::read_to_string(&path) {
        Ok(contents) => {
            tracing::debug!(name = %name, "Loaded secret");
            Ok(Some(Secret::new(
                contents.trim_end_matches(['\r', '\n']).to_string(),
            )))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => {
            tracing::error!(name = %name, error = %e, "Failed to read secret");
            Err(AppError::ConfigError(anyhow::anyhow!(
                "Failed to read secret {} from {}: {}",
                name,
                path.display(),
                e
            )))
        }
    }
}
