//! Environment-sourced configuration.
//!
//! Credentials are validated up front: [`Credentials::from_env`] fails with
//! a descriptive [`Error::Configuration`] naming exactly which variable is
//! missing, before any object-store call is attempted.

use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};

/// Environment variable holding the S3 access key.
pub const ENV_ACCESS_KEY: &str = "UHH_S3_ACCESS";
/// Environment variable holding the S3 secret key.
pub const ENV_SECRET_KEY: &str = "UHH_S3_SECRET";
/// Bucket the corpus lives in unless overridden.
pub const DEFAULT_BUCKET: &str = "cidl-test";

/// Known object-storage endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endpoint {
    /// Main endpoint.
    #[default]
    Primary,
    /// Replication site 1.
    Site1,
    /// Replication site 2.
    Site2,
    /// Replication site 3.
    Site3,
}

impl Endpoint {
    /// All selectable endpoints.
    pub const ALL: [Self; 4] = [Self::Primary, Self::Site1, Self::Site2, Self::Site3];

    /// Endpoint URL.
    #[must_use]
    pub const fn url(self) -> &'static str {
        match self {
            Self::Primary => "https://s3-uhh.lzs.uni-hamburg.de:443",
            Self::Site1 => "https://s3-uhh-s1.lzs.uni-hamburg.de:443",
            Self::Site2 => "https://s3-uhh-s2.lzs.uni-hamburg.de:443",
            Self::Site3 => "https://s3-uhh-s3.lzs.uni-hamburg.de:443",
        }
    }

    /// Selection key (`primary`, `site-1`, ...).
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Site1 => "site-1",
            Self::Site2 => "site-2",
            Self::Site3 => "site-3",
        }
    }

    /// Parse a selection key.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] naming the allowed keys.
    pub fn from_key(key: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_key() == key)
            .ok_or_else(|| {
                let allowed: Vec<&str> = Self::ALL.iter().map(|e| e.as_key()).collect();
                Error::Configuration(format!(
                    "invalid endpoint '{key}', choose one of: {}",
                    allowed.join(", ")
                ))
            })
    }
}

/// S3 credential pair. The secret never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
}

impl Credentials {
    /// Build from explicit values.
    #[must_use]
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// Read both keys from the environment, failing fast if either is
    /// missing or empty. The message names the missing variable(s) so the
    /// failure is actionable without reading source.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] before any fetch is attempted.
    pub fn from_env() -> Result<Self> {
        let access = env::var(ENV_ACCESS_KEY).ok().filter(|v| !v.is_empty());
        let secret = env::var(ENV_SECRET_KEY).ok().filter(|v| !v.is_empty());

        match (access, secret) {
            (Some(access_key), Some(secret_key)) => Ok(Self {
                access_key,
                secret_key,
            }),
            (None, None) => Err(Error::Configuration(format!(
                "{ENV_ACCESS_KEY} and {ENV_SECRET_KEY} are missing from the environment"
            ))),
            (None, Some(_)) => Err(Error::Configuration(format!(
                "{ENV_ACCESS_KEY} is missing from the environment"
            ))),
            (Some(_), None) => Err(Error::Configuration(format!(
                "{ENV_SECRET_KEY} is missing from the environment"
            ))),
        }
    }

    /// Access key.
    #[must_use]
    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    /// Secret key.
    #[must_use]
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Connection settings consumed by whatever transport implements
/// [`ObjectStore`](crate::store::ObjectStore).
#[derive(Debug, Clone)]
pub struct S3Settings {
    /// Bucket name.
    pub bucket: String,
    /// Selected endpoint.
    pub endpoint: Endpoint,
    /// Write operations refused when true.
    pub read_only: bool,
    /// Credential pair.
    pub credentials: Credentials,
}

impl S3Settings {
    /// Default settings with credentials from the environment: primary
    /// endpoint, default bucket, read-only.
    ///
    /// # Errors
    ///
    /// [`Error::Configuration`] if credentials are missing.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            bucket: DEFAULT_BUCKET.to_string(),
            endpoint: Endpoint::Primary,
            read_only: true,
            credentials: Credentials::from_env()?,
        })
    }

    /// Use a different bucket.
    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    /// Use a different endpoint.
    #[must_use]
    pub const fn with_endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Enable write operations.
    #[must_use]
    pub const fn writable(mut self) -> Self {
        self.read_only = false;
        self
    }
}

/// Tunables for the resolver and its cache. The intended scale (thousands
/// of simulations) makes all of these deployment-specific, so none is a
/// hardcoded constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// Maximum decoded artifacts kept resident before LRU eviction.
    pub max_resident_artifacts: usize,
    /// Maximum object-store fetches in flight at once.
    pub max_concurrent_fetches: usize,
    /// Per-fetch timeout; an elapsed timeout fails that index only.
    pub fetch_timeout: Duration,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_resident_artifacts: 256,
            max_concurrent_fetches: 8,
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl ResolverConfig {
    /// Cap the number of resident artifacts.
    #[must_use]
    pub const fn with_max_resident_artifacts(mut self, max: usize) -> Self {
        self.max_resident_artifacts = max;
        self
    }

    /// Cap concurrent fetches (object-storage rate limits).
    #[must_use]
    pub const fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// Set the per-fetch timeout.
    #[must_use]
    pub const fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }
}
