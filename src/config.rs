// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Configuration is loaded from the environment at startup. Invalid values
//! are rejected rather than silently replaced by defaults.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Root directory for encrypted storage | `/data` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `18080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//! | `BOUNDARY_CALL_TIMEOUT_MS` | Max wait for one trusted-boundary call | `10000` |
//! | `NONCE_SESSION_TTL_SECS` | Lifetime of an unused nonce | `600` |
//! | `MAX_SIGNATURES_PER_STATECHAIN` | Partial signatures allowed per key | unlimited |
//! | `SIMULATED_SEALING_KEY` | 64 hex chars; sealing key of the simulated boundary | random per process |

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the encrypted data directory path.
///
/// The data directory is mounted as Gramine's encrypted filesystem in the
/// manifest. The sealed secret, statechain database and audit logs live here.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const BOUNDARY_CALL_TIMEOUT_MS_ENV: &str = "BOUNDARY_CALL_TIMEOUT_MS";
pub const NONCE_SESSION_TTL_SECS_ENV: &str = "NONCE_SESSION_TTL_SECS";
pub const MAX_SIGNATURES_ENV: &str = "MAX_SIGNATURES_PER_STATECHAIN";

/// Without it, sealed secrets written by one process cannot be reopened by
/// the next.
pub const SIMULATED_SEALING_KEY_ENV: &str = "SIMULATED_SEALING_KEY";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 18080;
pub const DEFAULT_BOUNDARY_CALL_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_NONCE_SESSION_TTL_SECS: u64 = 600;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            other => Err(format!("expected `json` or `pretty`, got `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub data_dir: PathBuf,
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub boundary_call_timeout: Duration,
    pub nonce_ttl: Duration,
    pub max_signatures: Option<u64>,
    pub sealing_key: Option<[u8; 32]>,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let data_dir = lookup(DATA_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DATA_ROOT));

        let host = lookup(HOST_ENV).unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port: u16 = parse_or(&lookup, PORT_ENV, DEFAULT_PORT)?;
        let bind_addr = format!("{host}:{port}")
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })?;

        let log_format = parse_or(&lookup, LOG_FORMAT_ENV, LogFormat::default())?;

        let timeout_ms: u64 = parse_or(
            &lookup,
            BOUNDARY_CALL_TIMEOUT_MS_ENV,
            DEFAULT_BOUNDARY_CALL_TIMEOUT_MS,
        )?;
        if timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                name: BOUNDARY_CALL_TIMEOUT_MS_ENV,
                reason: "must be greater than zero".to_string(),
            });
        }

        let ttl_secs: u64 = parse_or(
            &lookup,
            NONCE_SESSION_TTL_SECS_ENV,
            DEFAULT_NONCE_SESSION_TTL_SECS,
        )?;

        let max_signatures = match lookup(MAX_SIGNATURES_ENV) {
            Some(raw) => Some(parse_value::<u64>(MAX_SIGNATURES_ENV, &raw)?),
            None => None,
        };

        let sealing_key = match lookup(SIMULATED_SEALING_KEY_ENV) {
            Some(raw) => Some(parse_sealing_key(&raw)?),
            None => None,
        };

        Ok(Self {
            data_dir,
            bind_addr,
            log_format,
            boundary_call_timeout: Duration::from_millis(timeout_ms),
            nonce_ttl: Duration::from_secs(ttl_secs),
            max_signatures,
            sealing_key,
        })
    }
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_sealing_key(raw: &str) -> Result<[u8; 32], ConfigError> {
    let mut key = [0u8; 32];
    hex::decode_to_slice(raw.trim(), &mut key).map_err(|e| ConfigError::Invalid {
        name: SIMULATED_SEALING_KEY_ENV,
        reason: e.to_string(),
    })?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.data_dir, PathBuf::from("/data"));
        assert_eq!(cfg.bind_addr, "0.0.0.0:18080".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.boundary_call_timeout, Duration::from_secs(10));
        assert_eq!(cfg.nonce_ttl, Duration::from_secs(600));
        assert_eq!(cfg.max_signatures, None);
        assert!(cfg.sealing_key.is_none());
    }

    #[test]
    fn values_are_read() {
        let key = "11".repeat(32);
        let cfg = config(&[
            ("DATA_DIR", "/tmp/sc"),
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("LOG_FORMAT", "JSON"),
            ("BOUNDARY_CALL_TIMEOUT_MS", "250"),
            ("NONCE_SESSION_TTL_SECS", "30"),
            ("MAX_SIGNATURES_PER_STATECHAIN", "5"),
            ("SIMULATED_SEALING_KEY", key.as_str()),
        ])
        .unwrap();

        assert_eq!(cfg.data_dir, PathBuf::from("/tmp/sc"));
        assert_eq!(cfg.bind_addr, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.boundary_call_timeout, Duration::from_millis(250));
        assert_eq!(cfg.nonce_ttl, Duration::from_secs(30));
        assert_eq!(cfg.max_signatures, Some(5));
        assert_eq!(cfg.sealing_key, Some([0x11; 32]));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config(&[("PORT", "not-a-port")]).is_err());
        assert!(config(&[("LOG_FORMAT", "xml")]).is_err());
        assert!(config(&[("BOUNDARY_CALL_TIMEOUT_MS", "0")]).is_err());
        assert!(config(&[("SIMULATED_SEALING_KEY", "abcd")]).is_err());
        assert!(config(&[("HOST", "not a host")]).is_err());
    }
}
