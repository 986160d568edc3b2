//! Builds the [`VersionStore`] a configuration describes.
//!
//! S3 requests are signed when the configuration carries static keys.
//! Other transport concerns (proxies, TLS roots) stay outside: callers
//! hand in a ready `reqwest` client with [`StoreFactory::with_http_client`].

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use tracing::debug;

use crate::config::{Config, DriverKind};
use crate::domain::SemanticVersion;
use crate::error::{Result, StoreError};
use crate::store::{
    gcs, s3, CasStore, GcsStorage, GitAuth, GitStorage, GitUser, S3Credentials, S3Storage,
    VersionStore,
};

const DEFAULT_REGION: &str = "us-east-1";

#[derive(Default)]
pub struct StoreFactory {
    http_client: Option<Client>,
}

impl StoreFactory {
    pub fn new() -> Self {
        StoreFactory { http_client: None }
    }

    /// Use `client` for the object store drivers instead of building one
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Select and construct the store for `config`
    pub fn build(&self, config: &Config) -> Result<Box<dyn VersionStore>> {
        let initial_version = config.initial_version()?;
        let max_attempts = config.max_attempts()?;
        let kind = config.driver_kind()?;

        debug!(driver = %kind, %initial_version, max_attempts, "building version store");

        match kind {
            DriverKind::Unspecified | DriverKind::S3 => {
                let storage = self.s3_storage(config)?;
                boxed(storage, initial_version, max_attempts)
            }
            DriverKind::Gcs => {
                let storage = self.gcs_storage(config)?;
                boxed(storage, initial_version, max_attempts)
            }
            DriverKind::Git => {
                let storage = git_storage(config)?;
                boxed(storage, initial_version, max_attempts)
            }
        }
    }

    fn s3_storage(&self, config: &Config) -> Result<S3Storage> {
        let region = config
            .region_name
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION);
        let endpoint = match config.endpoint.as_deref().filter(|e| !e.is_empty()) {
            Some(endpoint) => endpoint.to_string(),
            None => s3::default_endpoint(region, config.disable_ssl),
        };

        let mut storage = S3Storage::new(
            self.http_client(None)?,
            &endpoint,
            required(&config.bucket),
            required(&config.key),
        )?;

        if let Some(algorithm) = config.server_side_encryption.as_deref().filter(|a| !a.is_empty()) {
            storage = storage.with_server_side_encryption(algorithm);
        }

        if let Some(credentials) = s3_credentials(config)? {
            storage = storage.with_credentials(credentials, region);
        }

        Ok(storage)
    }

    fn gcs_storage(&self, config: &Config) -> Result<GcsStorage> {
        let endpoint = config
            .endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .unwrap_or(gcs::DEFAULT_ENDPOINT);

        GcsStorage::new(
            self.http_client(config.access_token.as_deref())?,
            endpoint,
            required(&config.bucket),
            required(&config.key),
        )
    }

    /// The injected client, or a fresh one sending `bearer_token` if given
    fn http_client(&self, bearer_token: Option<&str>) -> Result<Client> {
        if let Some(client) = &self.http_client {
            return Ok(client.clone());
        }

        let mut headers = HeaderMap::new();
        if let Some(token) = bearer_token.filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| StoreError::config("access_token contains invalid characters"))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Client::builder()
            .user_agent(concat!("semver-store/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .build()
            .map_err(|e| StoreError::config(format!("cannot build HTTP client: {}", e)))
    }
}

/// Static keys from the configuration; both halves or neither
fn s3_credentials(config: &Config) -> Result<Option<S3Credentials>> {
    let non_empty = |field: &Option<String>| field.clone().filter(|v| !v.is_empty());

    match (non_empty(&config.access_key_id), non_empty(&config.secret_access_key)) {
        (Some(access_key_id), Some(secret_access_key)) => Ok(Some(S3Credentials {
            access_key_id,
            secret_access_key,
            session_token: non_empty(&config.session_token),
        })),
        (None, None) => Ok(None),
        _ => Err(StoreError::config(
            "s3 driver requires both access_key_id and secret_access_key",
        )),
    }
}

fn git_storage(config: &Config) -> Result<GitStorage> {
    let user = match config.git_user.as_deref().filter(|u| !u.is_empty()) {
        Some(text) => GitUser::parse(text)?,
        None => GitUser::default(),
    };

    let auth = GitAuth {
        private_key: config.private_key.clone().filter(|k| !k.is_empty()),
        username: config.username.clone().filter(|u| !u.is_empty()),
        password: config.password.clone().filter(|p| !p.is_empty()),
    };

    Ok(GitStorage::new(
        required(&config.uri),
        required(&config.branch),
        required(&config.file),
    )?
    .with_auth(auth)
    .with_user(user))
}

fn required(field: &Option<String>) -> &str {
    field.as_deref().unwrap_or_default()
}

fn boxed<S>(storage: S, initial_version: SemanticVersion, max_attempts: u32) -> Result<Box<dyn VersionStore>>
where
    S: crate::store::ConditionalStorage + 'static,
{
    Ok(Box::new(CasStore::new(storage, initial_version, max_attempts)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_driver() {
        let config = Config {
            driver: "ftp".to_string(),
            ..Config::default()
        };
        let err = StoreFactory::new().build(&config).err().unwrap();
        assert!(err.to_string().contains("unknown driver: ftp"));
    }

    #[test]
    fn test_unspecified_driver_needs_bucket() {
        let err = StoreFactory::new().build(&Config::default()).err().unwrap();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_invalid_initial_version_fails_before_driver() {
        let config = Config {
            driver: "git".to_string(),
            initial_version: Some("banana".to_string()),
            ..Config::default()
        };
        let err = StoreFactory::new().build(&config).err().unwrap();
        assert!(err.to_string().contains("invalid initial version (banana)"));
    }

    #[test]
    fn test_half_configured_s3_keys() {
        let config = Config {
            bucket: Some("b".to_string()),
            key: Some("k".to_string()),
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            ..Config::default()
        };
        let err = StoreFactory::new().build(&config).err().unwrap();
        assert!(err.to_string().contains("secret_access_key"));
    }

    #[test]
    fn test_s3_credentials_from_config() {
        let config = Config {
            access_key_id: Some("AKIDEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            session_token: Some(String::new()),
            ..Config::default()
        };
        let credentials = s3_credentials(&config).unwrap().unwrap();
        assert_eq!(credentials.access_key_id, "AKIDEXAMPLE");
        assert_eq!(credentials.session_token, None);

        assert!(s3_credentials(&Config::default()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_git_user() {
        let config = Config {
            driver: "git".to_string(),
            uri: Some("/tmp/repo.git".to_string()),
            branch: Some("version".to_string()),
            file: Some("number".to_string()),
            git_user: Some("nobody".to_string()),
            ..Config::default()
        };
        assert!(StoreFactory::new().build(&config).is_err());
    }
}
