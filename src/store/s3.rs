//! S3-compatible object store adapter
//!
//! The version lives in a single object addressed path-style
//! (`{endpoint}/{bucket}/{key}`). The entity tag returned by `GET` is the
//! precondition token; writes use `If-Match` on it, or `If-None-Match: *`
//! when the object does not exist yet. With credentials configured, every
//! request is signed with AWS Signature Version 4.

use chrono::Utc;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH, IF_NONE_MATCH};
use reqwest::{StatusCode, Url};

use crate::domain::SemanticVersion;
use crate::error::{Result, StorageError, StoreError};
use crate::store::http::{
    is_precondition_failure, join_segments, parse_endpoint, request_error, required_header,
    unexpected_status, version_body,
};
use crate::store::sigv4::{S3Credentials, Signer};
use crate::store::{ConditionalStorage, Precondition, Snapshot};

const SERVER_SIDE_ENCRYPTION: &str = "x-amz-server-side-encryption";

/// Default endpoint for a region when none is configured
pub fn default_endpoint(region: &str, disable_ssl: bool) -> String {
    let scheme = if disable_ssl { "http" } else { "https" };
    format!("{}://s3.{}.amazonaws.com", scheme, region)
}

pub struct S3Storage {
    client: Client,
    object_url: Url,
    bucket: String,
    key: String,
    server_side_encryption: Option<String>,
    signer: Option<Signer>,
}

impl S3Storage {
    pub fn new(client: Client, endpoint: &str, bucket: &str, key: &str) -> Result<Self> {
        if bucket.is_empty() || key.is_empty() {
            return Err(StoreError::config("s3 driver requires bucket and key"));
        }

        let base = parse_endpoint(endpoint)?;
        let object_url = join_segments(
            &base,
            std::iter::once(bucket).chain(key.split('/').filter(|s| !s.is_empty())),
        );

        Ok(S3Storage {
            client,
            object_url,
            bucket: bucket.to_string(),
            key: key.to_string(),
            server_side_encryption: None,
            signer: None,
        })
    }

    /// Ask the store to encrypt written objects (e.g. `AES256`)
    pub fn with_server_side_encryption(mut self, algorithm: impl Into<String>) -> Self {
        self.server_side_encryption = Some(algorithm.into());
        self
    }

    /// Sign requests with static keys for `region`
    pub fn with_credentials(mut self, credentials: S3Credentials, region: impl Into<String>) -> Self {
        self.signer = Some(Signer::new(credentials, region));
        self
    }

    pub fn object_url(&self) -> &Url {
        &self.object_url
    }

    /// Add signature headers covering `signed_extra` and `payload`, if
    /// credentials are configured
    fn signed(
        &self,
        mut request: RequestBuilder,
        method: &str,
        signed_extra: &[(&str, &str)],
        payload: &[u8],
    ) -> std::result::Result<RequestBuilder, StorageError> {
        let Some(signer) = &self.signer else {
            return Ok(request);
        };

        for (name, value) in signer.sign(method, &self.object_url, signed_extra, payload, Utc::now())? {
            request = request.header(name, value);
        }
        Ok(request)
    }
}

impl ConditionalStorage for S3Storage {
    fn location(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    fn read(&self) -> std::result::Result<Snapshot, StorageError> {
        let request = self.signed(self.client.get(self.object_url.clone()), "GET", &[], b"")?;
        let response = request.send().map_err(request_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Snapshot::absent()),
            status if status.is_success() => {
                let etag = required_header(&response, ETAG)?;
                let version = version_body(response)?;
                Ok(Snapshot::present(version, etag))
            }
            status => Err(unexpected_status(status)),
        }
    }

    fn write_if(
        &self,
        version: &SemanticVersion,
        expected: &Precondition,
    ) -> std::result::Result<(), StorageError> {
        let body = version.to_string();
        let mut request = self
            .client
            .put(self.object_url.clone())
            .header(CONTENT_TYPE, "text/plain")
            .body(body.clone());

        request = match expected {
            Precondition::Absent => request.header(IF_NONE_MATCH, "*"),
            Precondition::Matches(etag) => request.header(IF_MATCH, etag.as_str()),
        };

        let mut amz_headers = Vec::new();
        if let Some(algorithm) = &self.server_side_encryption {
            request = request.header(SERVER_SIDE_ENCRYPTION, algorithm.as_str());
            amz_headers.push((SERVER_SIDE_ENCRYPTION, algorithm.as_str()));
        }

        let request = self.signed(request, "PUT", &amz_headers, body.as_bytes())?;
        let response = request.send().map_err(request_error)?;

        match response.status() {
            status if status.is_success() => Ok(()),
            status if is_precondition_failure(status) => Err(StorageError::Conflict),
            status => Err(unexpected_status(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_is_path_style() {
        let storage =
            S3Storage::new(Client::new(), "http://localhost:9000", "ci", "versions/app").unwrap();
        assert_eq!(
            storage.object_url().as_str(),
            "http://localhost:9000/ci/versions/app"
        );
        assert_eq!(storage.location(), "s3://ci/versions/app");
    }

    #[test]
    fn test_requires_bucket_and_key() {
        assert!(S3Storage::new(Client::new(), "http://localhost", "", "k").is_err());
        assert!(S3Storage::new(Client::new(), "http://localhost", "b", "").is_err());
    }

    #[test]
    fn test_default_endpoint() {
        assert_eq!(
            default_endpoint("eu-west-1", false),
            "https://s3.eu-west-1.amazonaws.com"
        );
        assert_eq!(
            default_endpoint("us-east-1", true),
            "http://s3.us-east-1.amazonaws.com"
        );
    }
}
