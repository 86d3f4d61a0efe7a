//! Azure storage connection string parsing.
//!
//! A connection string is a `;`-separated list of `Key=Value` pairs, e.g.
//!
//! ```text
//! DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=base64==;EndpointSuffix=core.windows.net
//! ```
//!
//! Only the account credentials and the blob endpoint are extracted.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use thiserror::Error;

/// Default DNS suffix for the public Azure cloud.
const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// Errors raised while parsing a connection string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionStringError {
    #[error("Account name or account key not found in the connection string.")]
    MissingCredentials,

    #[error("Invalid AccountKey in connection string: {0}")]
    InvalidKey(String),
}

/// Parsed storage account settings.
#[derive(Clone)]
pub struct ConnectionString {
    /// Storage account name.
    pub account_name: String,
    /// Decoded account key bytes (HMAC key for Shared Key and SAS signing).
    pub account_key: Vec<u8>,
    /// Blob service endpoint without a trailing slash.
    pub blob_endpoint: String,
}

impl std::fmt::Debug for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionString")
            .field("account_name", &self.account_name)
            .field("account_key", &"<redacted>")
            .field("blob_endpoint", &self.blob_endpoint)
            .finish()
    }
}

impl ConnectionString {
    /// Parse `raw` into account name, key and blob endpoint.
    pub fn parse(raw: &str) -> Result<Self, ConnectionStringError> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = None;
        let mut suffix = None;
        let mut blob_endpoint = None;

        for part in raw.split(';') {
            // Keys are base64 and may end in '=' padding, so split on the first '=' only.
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key.trim() {
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = Some(value.to_string()),
                "EndpointSuffix" => suffix = Some(value.to_string()),
                "BlobEndpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                _ => {}
            }
        }

        let (Some(account_name), Some(account_key)) = (account_name, account_key) else {
            return Err(ConnectionStringError::MissingCredentials);
        };

        let account_key = BASE64_STANDARD
            .decode(&account_key)
            .map_err(|e| ConnectionStringError::InvalidKey(e.to_string()))?;

        let blob_endpoint = blob_endpoint.unwrap_or_else(|| {
            format!(
                "{}://{}.blob.{}",
                protocol.as_deref().unwrap_or("https"),
                account_name,
                suffix.as_deref().unwrap_or(DEFAULT_ENDPOINT_SUFFIX)
            )
        });

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "a2V5LWJ5dGVzLWZvci10ZXN0aW5n";

    #[test]
    fn test_parse_standard_connection_string() {
        let raw = format!(
            "DefaultEndpointsProtocol=https;AccountName=notesacct;AccountKey={KEY};EndpointSuffix=core.windows.net"
        );
        let cs = ConnectionString::parse(&raw).unwrap();
        assert_eq!(cs.account_name, "notesacct");
        assert_eq!(cs.account_key, b"key-bytes-for-testing");
        assert_eq!(cs.blob_endpoint, "https://notesacct.blob.core.windows.net");
    }

    #[test]
    fn test_parse_keeps_key_padding() {
        // "ab" encodes to "YWI=" -- the trailing '=' must survive.
        let cs = ConnectionString::parse("AccountName=a;AccountKey=YWI=").unwrap();
        assert_eq!(cs.account_key, b"ab");
    }

    #[test]
    fn test_parse_defaults_endpoint() {
        let cs = ConnectionString::parse(&format!("AccountName=acct;AccountKey={KEY}")).unwrap();
        assert_eq!(cs.blob_endpoint, "https://acct.blob.core.windows.net");
    }

    #[test]
    fn test_parse_explicit_blob_endpoint() {
        let raw = format!(
            "AccountName=devstoreaccount1;AccountKey={KEY};BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1/"
        );
        let cs = ConnectionString::parse(&raw).unwrap();
        assert_eq!(cs.blob_endpoint, "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn test_parse_missing_account_name() {
        let err = ConnectionString::parse(&format!("AccountKey={KEY}")).unwrap_err();
        assert_eq!(err, ConnectionStringError::MissingCredentials);
    }

    #[test]
    fn test_parse_missing_account_key() {
        let err = ConnectionString::parse("AccountName=acct;EndpointSuffix=x").unwrap_err();
        assert_eq!(err, ConnectionStringError::MissingCredentials);
    }

    #[test]
    fn test_parse_rejects_bad_key() {
        let err = ConnectionString::parse("AccountName=acct;AccountKey=not base64!").unwrap_err();
        assert!(matches!(err, ConnectionStringError::InvalidKey(_)));
    }

    #[test]
    fn test_debug_redacts_key() {
        let cs = ConnectionString::parse(&format!("AccountName=acct;AccountKey={KEY}")).unwrap();
        let dbg = format!("{cs:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("key-bytes"));
    }
}
