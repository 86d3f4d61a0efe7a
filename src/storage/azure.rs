//! Azure Blob Storage container client.
//!
//! Talks to the Azure Blob REST API directly with `reqwest`, signing every
//! request with the storage account key (Shared Key authorization).
//!
//! Operations used:
//!   `ensure_container()` -> Get Container Properties, then Create Container on 404
//!   `list_blobs()`       -> List Blobs (follows `NextMarker`)
//!   `upload()`           -> Put Blob (BlockBlob, overwrites)
//!   `delete()`           -> Delete Blob

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use bytes::Bytes;
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use sha2::Sha256;
use tracing::{debug, info};

use super::connection_string::ConnectionString;
use super::container::{blob_url, BlobContainer, BlobError, BlobFuture, BLOB_NAME_ENCODE_SET};

/// Azure REST API version used for all requests (and for issued SAS tokens).
pub const AZURE_API_VERSION: &str = "2023-11-03";

/// Container client backed by the Azure Blob REST API.
pub struct AzureBlobContainer {
    /// HTTP client for Azure Blob REST API calls.
    client: reqwest::Client,
    /// The Azure container name.
    container: String,
    /// Azure storage account name.
    account: String,
    /// Decoded account key.
    key_bytes: Vec<u8>,
    /// Blob service endpoint, e.g. `https://acct.blob.core.windows.net`.
    endpoint: String,
    /// Prefix of every canonicalized resource: `/{account}` plus the
    /// endpoint path for path-style endpoints (emulators).
    resource_root: String,
}

impl AzureBlobContainer {
    /// Build a client for `container` using the parsed connection string.
    pub fn new(conn: &ConnectionString, container: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        let endpoint_path = reqwest::Url::parse(&conn.blob_endpoint)
            .map_err(|e| anyhow::anyhow!("Invalid blob endpoint '{}': {}", conn.blob_endpoint, e))?
            .path()
            .trim_end_matches('/')
            .to_string();
        let resource_root = format!("/{}{}", conn.account_name, endpoint_path);

        info!(
            "Azure blob container client initialized: container={} account={} endpoint={}",
            container, conn.account_name, conn.blob_endpoint
        );

        Ok(Self {
            client,
            container,
            account: conn.account_name.clone(),
            key_bytes: conn.account_key.clone(),
            endpoint: conn.blob_endpoint.clone(),
            resource_root,
        })
    }

    /// `{container}/{blob}` with the blob name encoded as it appears on the wire.
    fn blob_resource(&self, blob_name: &str) -> String {
        format!(
            "{}/{}",
            self.container,
            percent_encoding::utf8_percent_encode(blob_name, &BLOB_NAME_ENCODE_SET)
        )
    }

    /// Container-level URL with the given query string.
    fn container_url(&self, query: &str) -> String {
        format!("{}/{}?{}", self.endpoint, self.container, query)
    }

    /// Get the current UTC date in RFC 1123 format for Azure headers.
    fn rfc1123_date() -> String {
        httpdate::fmt_http_date(std::time::SystemTime::now())
    }

    /// Sign a request and return the `Authorization` header value.
    ///
    /// `resource_path` is `{container}` for container operations and
    /// [`Self::blob_resource`] for blob operations.
    #[allow(clippy::too_many_arguments)]
    fn sign_request(
        &self,
        method: &str,
        content_length: Option<usize>,
        content_type: &str,
        date: &str,
        extra_headers: &[(String, String)],
        resource_path: &str,
        query_params: &[(String, String)],
    ) -> Result<String, BlobError> {
        let string_to_sign = string_to_sign(
            method,
            content_length,
            content_type,
            date,
            extra_headers,
            &format!("{}/{}", self.resource_root, resource_path),
            query_params,
        );

        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(&self.key_bytes)
            .map_err(|e| BlobError::Signing(format!("HMAC key error: {}", e)))?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64_STANDARD.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{}", self.account, signature))
    }

    /// Read the error body and build a [`BlobError::Service`].
    async fn service_error(operation: &'static str, resp: reqwest::Response) -> BlobError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        BlobError::Service {
            operation,
            status,
            body,
        }
    }

    // -- Azure Blob REST API operations ----------------------------------------

    /// Get Container Properties.  `Ok(false)` when the container is missing.
    async fn azure_container_exists(&self) -> Result<bool, BlobError> {
        let date = Self::rfc1123_date();
        let params = vec![("restype".to_string(), "container".to_string())];
        let auth = self.sign_request("GET", None, "", &date, &[], &self.container, &params)?;

        let resp = self
            .client
            .get(self.container_url("restype=container"))
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("Authorization", auth)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(true)
        } else if resp.status() == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(Self::service_error("get_container_properties", resp).await)
        }
    }

    /// Create Container.  A concurrent creator winning the race is fine.
    async fn azure_create_container(&self) -> Result<bool, BlobError> {
        let date = Self::rfc1123_date();
        let params = vec![("restype".to_string(), "container".to_string())];
        let auth = self.sign_request("PUT", Some(0), "", &date, &[], &self.container, &params)?;

        let resp = self
            .client
            .put(self.container_url("restype=container"))
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("Content-Length", "0")
            .header("Authorization", auth)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(true)
        } else if resp.status() == StatusCode::CONFLICT {
            Ok(false)
        } else {
            Err(Self::service_error("create_container", resp).await)
        }
    }

    /// List Blobs, one page per request, until no `NextMarker` is returned.
    async fn azure_list_blobs(&self) -> Result<Vec<String>, BlobError> {
        let mut all_names: Vec<String> = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut url = self.container_url("restype=container&comp=list");
            let mut params = vec![
                ("comp".to_string(), "list".to_string()),
                ("restype".to_string(), "container".to_string()),
            ];
            if let Some(ref m) = marker {
                url.push_str("&marker=");
                url.push_str(
                    &percent_encoding::utf8_percent_encode(m, &BLOB_NAME_ENCODE_SET).to_string(),
                );
                params.push(("marker".to_string(), m.clone()));
            }

            let date = Self::rfc1123_date();
            let auth = self.sign_request("GET", None, "", &date, &[], &self.container, &params)?;

            let resp = self
                .client
                .get(&url)
                .header("x-ms-date", &date)
                .header("x-ms-version", AZURE_API_VERSION)
                .header("Authorization", auth)
                .send()
                .await?;

            if !resp.status().is_success() {
                return Err(Self::service_error("list_blobs", resp).await);
            }

            let body = resp.text().await?;
            let (names, next_marker) = parse_list_blobs(&body)?;
            all_names.extend(names);

            match next_marker {
                Some(m) => marker = Some(m),
                None => break,
            }
        }

        Ok(all_names)
    }

    /// Put Blob as a block blob.  Azure replaces an existing blob of the same name.
    async fn azure_upload(
        &self,
        blob_name: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<(), BlobError> {
        let date = Self::rfc1123_date();
        let extra_headers = vec![("x-ms-blob-type".to_string(), "BlockBlob".to_string())];
        let auth = self.sign_request(
            "PUT",
            Some(data.len()),
            content_type,
            &date,
            &extra_headers,
            &self.blob_resource(blob_name),
            &[],
        )?;

        let resp = self
            .client
            .put(blob_url(&self.endpoint, &self.container, blob_name))
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("x-ms-blob-type", "BlockBlob")
            .header("Content-Type", content_type)
            .header("Authorization", auth)
            .body(data)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::service_error("upload", resp).await);
        }

        Ok(())
    }

    /// Delete Blob.
    async fn azure_delete(&self, blob_name: &str) -> Result<(), BlobError> {
        let date = Self::rfc1123_date();
        let auth = self.sign_request(
            "DELETE",
            None,
            "",
            &date,
            &[],
            &self.blob_resource(blob_name),
            &[],
        )?;

        let resp = self
            .client
            .delete(blob_url(&self.endpoint, &self.container, blob_name))
            .header("x-ms-date", &date)
            .header("x-ms-version", AZURE_API_VERSION)
            .header("Authorization", auth)
            .send()
            .await?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(BlobError::NotFound {
                name: blob_name.to_string(),
            });
        }
        if !resp.status().is_success() {
            return Err(Self::service_error("delete", resp).await);
        }

        Ok(())
    }
}

impl BlobContainer for AzureBlobContainer {
    fn name(&self) -> &str {
        &self.container
    }

    fn public_url(&self, blob_name: &str) -> String {
        blob_url(&self.endpoint, &self.container, blob_name)
    }

    fn ensure_container(&self) -> BlobFuture<'_, bool> {
        Box::pin(async move {
            if self.azure_container_exists().await? {
                debug!("Azure container {} already exists", self.container);
                return Ok(false);
            }
            let created = self.azure_create_container().await?;
            if created {
                info!("Container '{}' created successfully.", self.container);
            }
            Ok(created)
        })
    }

    fn list_blobs(&self) -> BlobFuture<'_, Vec<String>> {
        Box::pin(async move {
            debug!("Azure list: container={}", self.container);
            self.azure_list_blobs().await
        })
    }

    fn upload(&self, blob_name: &str, data: Bytes, content_type: &str) -> BlobFuture<'_, ()> {
        let blob_name = blob_name.to_string();
        let content_type = content_type.to_string();
        Box::pin(async move {
            debug!(
                "Azure upload: container={} blob={} bytes={}",
                self.container,
                blob_name,
                data.len()
            );
            self.azure_upload(&blob_name, data, &content_type).await
        })
    }

    fn delete(&self, blob_name: &str) -> BlobFuture<'_, ()> {
        let blob_name = blob_name.to_string();
        Box::pin(async move {
            debug!(
                "Azure delete: container={} blob={}",
                self.container, blob_name
            );
            self.azure_delete(&blob_name).await
        })
    }
}

/// Build the Shared Key string-to-sign.
///
/// ```text
/// VERB\n
/// Content-Encoding\n
/// Content-Language\n
/// Content-Length\n
/// Content-MD5\n
/// Content-Type\n
/// Date\n
/// If-Modified-Since\n
/// If-Match\n
/// If-None-Match\n
/// If-Unmodified-Since\n
/// Range\n
/// CanonicalizedHeaders\n
/// CanonicalizedResource
/// ```
fn string_to_sign(
    method: &str,
    content_length: Option<usize>,
    content_type: &str,
    date: &str,
    extra_headers: &[(String, String)],
    resource: &str,
    query_params: &[(String, String)],
) -> String {
    // Content-Length is empty for zero-length bodies.
    let content_length_str = match content_length {
        Some(0) | None => String::new(),
        Some(len) => len.to_string(),
    };

    let mut ms_headers: Vec<(String, String)> = vec![
        ("x-ms-date".to_string(), date.to_string()),
        ("x-ms-version".to_string(), AZURE_API_VERSION.to_string()),
    ];
    for (k, v) in extra_headers {
        let lk = k.to_lowercase();
        if lk.starts_with("x-ms-") && lk != "x-ms-date" && lk != "x-ms-version" {
            ms_headers.push((lk, v.clone()));
        }
    }
    ms_headers.sort_by(|a, b| a.0.cmp(&b.0));

    let canonicalized_headers = ms_headers
        .iter()
        .map(|(k, v)| format!("{}:{}", k, v))
        .collect::<Vec<_>>()
        .join("\n");

    let mut canonicalized_resource = resource.to_string();
    let mut sorted_params = query_params.to_vec();
    sorted_params.sort_by(|a, b| a.0.cmp(&b.0));
    for (k, v) in &sorted_params {
        canonicalized_resource.push_str(&format!("\n{}:{}", k.to_lowercase(), v));
    }

    format!(
        "{}\n\n\n{}\n\n{}\n\n\n\n\n\n\n{}\n{}",
        method, content_length_str, content_type, canonicalized_headers, canonicalized_resource
    )
}

/// Extract blob names and the continuation marker from a List Blobs response.
fn parse_list_blobs(body: &str) -> Result<(Vec<String>, Option<String>), BlobError> {
    use quick_xml::events::Event;
    use quick_xml::Reader;

    // No trimming: leading and trailing spaces are part of a blob name.
    let mut reader = Reader::from_str(body);

    let mut names = Vec::new();
    let mut next_marker = None;
    let mut current_tag = String::new();
    let mut in_blob = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                current_tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
                if current_tag == "Blob" {
                    in_blob = true;
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == b"Blob" {
                    in_blob = false;
                }
                current_tag.clear();
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|err| BlobError::MalformedResponse(err.to_string()))?
                    .to_string();
                if in_blob && current_tag == "Name" {
                    names.push(text);
                } else if !in_blob && current_tag == "NextMarker" && !text.trim().is_empty() {
                    next_marker = Some(text.trim().to_string());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(BlobError::MalformedResponse(e.to_string())),
            _ => {}
        }
    }

    Ok((names, next_marker))
}

// -- Tests -------------------------------------------------------------------
