//! Secret loading for broker credentials and the analyst API key
//!
//! Secrets are returned as `Zeroizing<String>` so they are wiped from memory
//! when dropped. A 1Password reference is tried first when one is configured;
//! otherwise, or when allowed as a fallback, the environment is read.

use crate::domain::repositories::broker_client::Credentials;
use std::process::Command;
use tracing::{error, info, warn};
use zeroize::Zeroizing;

/// Error type for secret loading operations
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Secret not found: {0}")]
    NotFound(String),

    #[error("1Password CLI error: {0}")]
    OnePasswordError(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Secret validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration for secret loading
#[derive(Debug, Clone)]
pub struct SecretConfig {
    /// Whether to allow loading secrets from environment variables
    pub allow_env_vars: bool,

    /// Whether to require 1Password CLI
    pub require_op_cli: bool,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            allow_env_vars: true,
            require_op_cli: false,
        }
    }
}

/// Load a secret from 1Password CLI or environment variable (with fallback)
///
/// # Arguments
/// - `op_reference`: 1Password reference (e.g., "op://vault/item/field"), if any
/// - `env_var_name`: Environment variable name as fallback
/// - `config`: Configuration for secret loading behavior
pub fn load_secret(
    op_reference: Option<&str>,
    env_var_name: &str,
    config: &SecretConfig,
) -> Result<Zeroizing<String>, SecretError> {
    if let Some(reference) = op_reference {
        match load_from_op_cli(reference) {
            Ok(secret) => {
                info!("Loaded secret from 1Password CLI: {}", env_var_name);
                return Ok(secret);
            }
            Err(e) => {
                if config.require_op_cli {
                    error!("1Password CLI required but failed: {}", e);
                    return Err(e);
                }
                warn!("1Password CLI not available: {}", e);
            }
        }
    } else if config.require_op_cli {
        return Err(SecretError::NotFound(format!(
            "{} (no 1Password reference configured)",
            env_var_name
        )));
    }

    if config.allow_env_vars {
        load_from_env(env_var_name)
    } else {
        error!(
            "Secret loading failed: 1Password CLI unavailable and env vars disabled for {}",
            env_var_name
        );
        Err(SecretError::NotFound(env_var_name.to_string()))
    }
}

/// Load a secret from 1Password CLI
fn load_from_op_cli(reference: &str) -> Result<Zeroizing<String>, SecretError> {
    let output = Command::new("op")
        .arg("read")
        .arg(reference)
        .output()
        .map_err(|e| SecretError::OnePasswordError(format!("Failed to execute 'op' command: {}", e)))?;

    if !output.status.success() {
        let error_msg = String::from_utf8_lossy(&output.stderr);
        return Err(SecretError::OnePasswordError(format!(
            "1Password CLI failed: {}",
            error_msg
        )));
    }

    let secret = String::from_utf8(output.stdout)
        .map_err(|e| SecretError::OnePasswordError(format!("Invalid UTF-8 from 1Password: {}", e)))?
        .trim()
        .to_string();

    if secret.is_empty() {
        return Err(SecretError::OnePasswordError(
            "1Password returned empty secret".to_string(),
        ));
    }

    Ok(Zeroizing::new(secret))
}

/// Load a secret from environment variable (wrapped in Zeroizing)
fn load_from_env(env_var_name: &str) -> Result<Zeroizing<String>, SecretError> {
    match std::env::var(env_var_name) {
        Ok(value) if !value.trim().is_empty() => Ok(Zeroizing::new(value)),
        _ => Err(SecretError::EnvVarNotSet(env_var_name.to_string())),
    }
}

/// Build broker credentials from a login, server and password secret
pub fn broker_credentials(
    login: Option<u64>,
    server: &str,
    config: &SecretConfig,
) -> Result<Credentials, SecretError> {
    let login = login.ok_or_else(|| SecretError::NotFound("GOLDEX_BROKER_LOGIN".to_string()))?;
    let reference = std::env::var("GOLDEX_BROKER_PASSWORD_OP").ok();
    let password = load_secret(reference.as_deref(), "GOLDEX_BROKER_PASSWORD", config)?;
    Ok(Credentials {
        login,
        password,
        server: server.to_string(),
    })
}

/// Load the analyst API key
pub fn analyst_api_key(config: &SecretConfig) -> Result<Zeroizing<String>, SecretError> {
    let reference = std::env::var("ANTHROPIC_API_KEY_OP").ok();
    let key = load_secret(reference.as_deref(), "ANTHROPIC_API_KEY", config)?;
    validate_secret_strength(&key, 32)?;
    Ok(key)
}

/// Validate that a secret meets minimum length requirements
pub fn validate_secret_strength(secret: &str, min_length: usize) -> Result<(), SecretError> {
    if secret.len() < min_length {
        return Err(SecretError::ValidationFailed(format!(
            "Secret too short: {} characters (minimum: {})",
            secret.len(),
            min_length
        )));
    }
    Ok(())
}
