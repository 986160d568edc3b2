//! Google Cloud Storage adapter
//!
//! Uses the JSON API: media download for reads, media upload for writes.
//! The object generation is the precondition token, and
//! `ifGenerationMatch=0` makes the first write create-only.

use reqwest::blocking::Client;
use reqwest::header::{HeaderName, CONTENT_TYPE};
use reqwest::{StatusCode, Url};

use crate::domain::SemanticVersion;
use crate::error::{Result, StorageError, StoreError};
use crate::store::http::{
    is_precondition_failure, join_segments, parse_endpoint, request_error, required_header,
    unexpected_status, version_body,
};
use crate::store::{ConditionalStorage, Precondition, Snapshot};

pub const DEFAULT_ENDPOINT: &str = "https://storage.googleapis.com";

const GENERATION_HEADER: &str = "x-goog-generation";

pub struct GcsStorage {
    client: Client,
    download_url: Url,
    upload_url: Url,
    bucket: String,
    key: String,
}

impl GcsStorage {
    pub fn new(client: Client, endpoint: &str, bucket: &str, key: &str) -> Result<Self> {
        if bucket.is_empty() || key.is_empty() {
            return Err(StoreError::config("gcs driver requires bucket and key"));
        }

        let base = parse_endpoint(endpoint)?;

        let mut download_url = join_segments(&base, ["storage", "v1", "b", bucket, "o", key]);
        download_url.query_pairs_mut().append_pair("alt", "media");

        let mut upload_url = join_segments(&base, ["upload", "storage", "v1", "b", bucket, "o"]);
        upload_url
            .query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);

        Ok(GcsStorage {
            client,
            download_url,
            upload_url,
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }

    fn upload_url_for(&self, expected: &Precondition) -> Url {
        // Generation 0 only matches an object that does not exist.
        let generation = match expected {
            Precondition::Absent => "0",
            Precondition::Matches(generation) => generation.as_str(),
        };

        let mut url = self.upload_url.clone();
        url.query_pairs_mut()
            .append_pair("ifGenerationMatch", generation);
        url
    }
}

impl ConditionalStorage for GcsStorage {
    fn location(&self) -> String {
        format!("gs://{}/{}", self.bucket, self.key)
    }

    fn read(&self) -> std::result::Result<Snapshot, StorageError> {
        let response = self
            .client
            .get(self.download_url.clone())
            .send()
            .map_err(request_error)?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(Snapshot::absent()),
            status if status.is_success() => {
                let generation =
                    required_header(&response, HeaderName::from_static(GENERATION_HEADER))?;
                let version = version_body(response)?;
                Ok(Snapshot::present(version, generation))
            }
            status => Err(unexpected_status(status)),
        }
    }

    fn write_if(
        &self,
        version: &SemanticVersion,
        expected: &Precondition,
    ) -> std::result::Result<(), StorageError> {
        let response = self
            .client
            .post(self.upload_url_for(expected))
            .header(CONTENT_TYPE, "text/plain")
            .body(version.to_string())
            .send()
            .map_err(request_error)?;

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
    fn test_urls() {
        let storage =
            GcsStorage::new(Client::new(), "http://localhost:4443", "ci", "app/version").unwrap();

        assert_eq!(
            storage.download_url.as_str(),
            "http://localhost:4443/storage/v1/b/ci/o/app%2Fversion?alt=media"
        );
        assert_eq!(
            storage.upload_url_for(&Precondition::Absent).as_str(),
            "http://localhost:4443/upload/storage/v1/b/ci/o?uploadType=media&name=app%2Fversion&ifGenerationMatch=0"
        );
        assert_eq!(
            storage
                .upload_url_for(&Precondition::Matches("1712".to_string()))
                .as_str(),
            "http://localhost:4443/upload/storage/v1/b/ci/o?uploadType=media&name=app%2Fversion&ifGenerationMatch=1712"
        );
        assert_eq!(storage.location(), "gs://ci/app/version");
    }

    #[test]
    fn test_requires_bucket_and_key() {
        assert!(GcsStorage::new(Client::new(), DEFAULT_ENDPOINT, "", "k").is_err());
        assert!(GcsStorage::new(Client::new(), DEFAULT_ENDPOINT, "b", "").is_err());
    }
}
