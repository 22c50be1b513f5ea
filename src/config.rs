//! Coupa connection settings: credentials, instance host and HTTP options.

use crate::error::ConfigError;
use std::fmt;
use std::time::Duration;

pub const ENV_IDENTIFIER: &str = "IDENTIFIER";
pub const ENV_SECRET: &str = "SECRET";
pub const ENV_INSTANCE: &str = "COUPA_INSTANCE";
pub const ENV_BASE_URL: &str = "COUPA_BASE_URL";
pub const ENV_TIMEOUT_SECS: &str = "COUPA_TIMEOUT_SECS";

/// Suffix appended to the instance name to form the API host.
pub const COUPA_HOST_SUFFIX: &str = "coupahost.com";
/// Scope requested in the client-credentials grant.
pub const INVOICE_READ_SCOPE: &str = "core.invoice.read";

const APP_DIR: &str = "coupa-invoice-downloader";

/// Load `.env` files into the process environment: the per-user config folder first,
/// then the working directory. Variables already set are never overwritten.
pub fn load_env() {
    if let Some(dir) = dirs::config_dir() {
        let env_path = dir.join(APP_DIR).join(".env");
        if env_path.exists() {
            let _ = dotenvy::from_path(&env_path);
        }
    }
    let _ = dotenvy::dotenv();
}

#[derive(Clone)]
pub struct CoupaConfig {
    pub identifier: String,
    pub secret: String,
    pub instance: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl fmt::Debug for CoupaConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoupaConfig")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .field("instance", &self.instance)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl CoupaConfig {
    /// Validate the three required values; every missing one is named in the error.
    pub fn from_parts(
        identifier: Option<String>,
        secret: Option<String>,
        instance: Option<String>,
    ) -> Result<Self, ConfigError> {
        let identifier = present(identifier);
        let secret = present(secret);
        let instance = present(instance);

        let mut missing = Vec::new();
        if identifier.is_none() {
            missing.push(ENV_IDENTIFIER);
        }
        if secret.is_none() {
            missing.push(ENV_SECRET);
        }
        if instance.is_none() {
            missing.push(ENV_INSTANCE);
        }
        match (identifier, secret, instance) {
            (Some(identifier), Some(secret), Some(instance)) => {
                if !instance
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
                {
                    return Err(ConfigError::Invalid {
                        name: ENV_INSTANCE,
                        reason: format!("`{}` is not a host name", instance),
                    });
                }
                Ok(Self {
                    identifier,
                    secret,
                    instance,
                    base_url: None,
                    timeout: None,
                })
            }
            _ => Err(ConfigError::Missing(missing)),
        }
    }

    /// Read every setting from the process environment (call [`load_env`] first).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read every setting through `lookup`, keyed by the `ENV_*` names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::from_parts(
            lookup(ENV_IDENTIFIER),
            lookup(ENV_SECRET),
            lookup(ENV_INSTANCE),
        )?;
        let timeout = match present(lookup(ENV_TIMEOUT_SECS)) {
            Some(raw) => Some(parse_timeout_secs(&raw)?),
            None => None,
        };
        Ok(config
            .with_base_url(lookup(ENV_BASE_URL))
            .with_timeout(timeout))
    }

    pub fn with_base_url(mut self, base_url: Option<String>) -> Self {
        self.base_url = present(base_url);
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// `https://{instance}.coupahost.com` unless a base URL override is set.
    pub fn base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}.{}", self.instance, COUPA_HOST_SUFFIX),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth2/token", self.base_url())
    }

    pub fn scan_url(&self, invoice_id: &str) -> String {
        format!(
            "{}/api/invoices/{}/retrieve_image_scan",
            self.base_url(),
            invoice_id
        )
    }
}

pub fn parse_timeout_secs(raw: &str) -> Result<Duration, ConfigError> {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid {
            name: ENV_TIMEOUT_SECS,
            reason: format!("`{}` is not a positive number of seconds", raw),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> CoupaConfig {
        CoupaConfig::from_parts(
            Some("client".into()),
            Some("s3cret".into()),
            Some("acme".into()),
        )
        .unwrap()
    }

    #[test]
    fn builds_vendor_urls_from_instance() {
        let cfg = config();
        assert_eq!(cfg.token_url(), "https://acme.coupahost.com/oauth2/token");
        assert_eq!(
            cfg.scan_url("100"),
            "https://acme.coupahost.com/api/invoices/100/retrieve_image_scan"
        );
    }

    #[test]
    fn base_url_override_wins() {
        let cfg = config().with_base_url(Some("http://127.0.0.1:9000/".into()));
        assert_eq!(cfg.token_url(), "http://127.0.0.1:9000/oauth2/token");
        let cfg = config().with_base_url(Some("   ".into()));
        assert!(cfg.base_url.is_none());
    }

    #[test]
    fn reports_every_missing_value() {
        let err = CoupaConfig::from_parts(None, Some(" ".into()), Some("acme".into())).unwrap_err();
        match err {
            ConfigError::Missing(names) => assert_eq!(names, vec![ENV_IDENTIFIER, ENV_SECRET]),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn rejects_instance_with_path() {
        let err = CoupaConfig::from_parts(
            Some("a".into()),
            Some("b".into()),
            Some("acme/evil".into()),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_INSTANCE, .. }));
    }

    #[test]
    fn debug_hides_secret() {
        let out = format!("{:?}", config());
        assert!(!out.contains("s3cret"));
        assert!(out.contains("acme"));
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn reads_every_variable_through_lookup() {
        let cfg = CoupaConfig::from_lookup(lookup_from(&[
            (ENV_IDENTIFIER, "env-client"),
            (ENV_SECRET, "env-secret"),
            (ENV_INSTANCE, "env-acme"),
            (ENV_BASE_URL, "http://localhost:8080"),
            (ENV_TIMEOUT_SECS, "15"),
        ]))
        .unwrap();
        assert_eq!(cfg.identifier, "env-client");
        assert_eq!(cfg.token_url(), "http://localhost:8080/oauth2/token");
        assert_eq!(cfg.timeout, Some(Duration::from_secs(15)));
    }

    #[test]
    fn bad_timeout_variable_is_rejected() {
        let err = CoupaConfig::from_lookup(lookup_from(&[
            (ENV_IDENTIFIER, "a"),
            (ENV_SECRET, "b"),
            (ENV_INSTANCE, "acme"),
            (ENV_TIMEOUT_SECS, "soon"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: ENV_TIMEOUT_SECS, .. }));
    }

    #[test]
    fn parses_timeout() {
        assert_eq!(parse_timeout_secs("30").unwrap(), Duration::from_secs(30));
        assert!(parse_timeout_secs("0").is_err());
        assert!(parse_timeout_secs("soon").is_err());
    }
}
