use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Duration;

/// Server settings, read from `LINKVOTE_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
    pub frontend_url: String,
    /// Single allowed origin for credentialed CORS. `None` allows any origin.
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(std::env::vars().collect())
    }

    fn from_vars(vars: HashMap<String, String>) -> anyhow::Result<Self> {
        let var = |name: &str| vars.get(name).filter(|v| !v.is_empty()).cloned();

        let port = var("LINKVOTE_PORT")
            .unwrap_or_else(|| "4000".into())
            .parse()
            .context("LINKVOTE_PORT must be a port number")?;
        let ttl_secs: i64 = var("LINKVOTE_SESSION_TTL_SECS")
            .unwrap_or_else(|| "3600".into())
            .parse()
            .context("LINKVOTE_SESSION_TTL_SECS must be a whole number of seconds")?;
        if ttl_secs <= 0 {
            anyhow::bail!("LINKVOTE_SESSION_TTL_SECS must be positive, got {}", ttl_secs);
        }
        let cookie_secure = match var("LINKVOTE_COOKIE_SECURE").as_deref() {
            None | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => anyhow::bail!("LINKVOTE_COOKIE_SECURE must be true or false, got {:?}", other),
        };

        Ok(Self {
            host: var("LINKVOTE_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            db_path: var("LINKVOTE_DB_PATH").unwrap_or_else(|| "linkvote.db".into()).into(),
            session_ttl: Duration::seconds(ttl_secs),
            cookie_secure,
            frontend_url: var("LINKVOTE_FRONTEND_URL").unwrap_or_else(|| "http://localhost:3000".into()),
            cors_origin: var("LINKVOTE_CORS_ORIGIN"),
        })
    }

    pub fn addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_vars(HashMap::new()).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.db_path, PathBuf::from("linkvote.db"));
        assert_eq!(config.session_ttl, Duration::hours(1));
        assert!(!config.cookie_secure);
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert!(config.cors_origin.is_none());
        assert_eq!(config.addr().unwrap().port(), 4000);
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_vars(vars(&[
            ("LINKVOTE_HOST", "127.0.0.1"),
            ("LINKVOTE_PORT", "8080"),
            ("LINKVOTE_SESSION_TTL_SECS", "60"),
            ("LINKVOTE_COOKIE_SECURE", "true"),
            ("LINKVOTE_CORS_ORIGIN", "https://linkvote.example"),
        ]))
        .unwrap();
        assert_eq!(config.addr().unwrap().to_string(), "127.0.0.1:8080");
        assert_eq!(config.session_ttl, Duration::seconds(60));
        assert!(config.cookie_secure);
        assert_eq!(config.cors_origin.as_deref(), Some("https://linkvote.example"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::from_vars(vars(&[("LINKVOTE_PORT", "http")])).is_err());
        assert!(Config::from_vars(vars(&[("LINKVOTE_SESSION_TTL_SECS", "0")])).is_err());
        assert!(Config::from_vars(vars(&[("LINKVOTE_COOKIE_SECURE", "yes")])).is_err());
    }
}
