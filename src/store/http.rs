//! Status and error translation shared by the HTTP object store adapters

use reqwest::blocking::Response;
use reqwest::header::HeaderName;
use reqwest::{StatusCode, Url};

use crate::domain::SemanticVersion;
use crate::error::{StorageError, StoreError};

/// Map a client-side failure; everything but a malformed request is worth retrying
pub(crate) fn request_error(err: reqwest::Error) -> StorageError {
    if err.is_builder() {
        StorageError::backend(format!("cannot build request: {}", err))
    } else {
        StorageError::transient(err.without_url().to_string())
    }
}

/// Map a status that is neither success, not-found nor a precondition failure
pub(crate) fn unexpected_status(status: StatusCode) -> StorageError {
    if status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
    {
        StorageError::transient(format!("service responded {}", status))
    } else {
        StorageError::backend(format!("unexpected response {}", status))
    }
}

/// Whether a write was refused because its precondition no longer holds
pub(crate) fn is_precondition_failure(status: StatusCode) -> bool {
    status == StatusCode::PRECONDITION_FAILED || status == StatusCode::CONFLICT
}

/// Read a successful response body as a version
pub(crate) fn version_body(response: Response) -> Result<SemanticVersion, StorageError> {
    let body = response.text().map_err(request_error)?;
    SemanticVersion::parse(&body).map_err(|source| StorageError::Corrupt {
        content: body.trim().to_string(),
        source,
    })
}

/// The value of a header that a successful read must carry
pub(crate) fn required_header(response: &Response, name: HeaderName) -> Result<String, StorageError> {
    response
        .headers()
        .get(&name)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .ok_or_else(|| StorageError::backend(format!("response is missing the {} header", name)))
}

/// Parse an endpoint that path segments can be appended to
pub(crate) fn parse_endpoint(endpoint: &str) -> Result<Url, StoreError> {
    let url = Url::parse(endpoint)
        .map_err(|e| StoreError::config(format!("invalid endpoint '{}': {}", endpoint, e)))?;

    if url.cannot_be_a_base() {
        return Err(StoreError::config(format!(
            "invalid endpoint '{}': not a base URL",
            endpoint
        )));
    }

    Ok(url)
}

/// Append path segments to `base`, percent-encoding each one
pub(crate) fn join_segments<'a>(base: &Url, segments: impl IntoIterator<Item = &'a str>) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url
}
