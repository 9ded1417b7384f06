//! AWS credentials and Signature Version 4 request signing.
//!
//! Bedrock and SNS both authenticate with SigV4. The signer produces the
//! `x-amz-date`, optional `x-amz-security-token`, and `authorization`
//! headers for a fully built request; callers attach them with
//! [`SignedHeaders::apply`].
//!
//! # Algorithm
//!
//! ```text
//! canonical request  = method \n uri \n query \n headers \n signed \n sha256(payload)
//! string to sign     = AWS4-HMAC-SHA256 \n amz-date \n scope \n sha256(canonical request)
//! signing key        = HMAC(HMAC(HMAC(HMAC("AWS4" + secret, date), region), service), "aws4_request")
//! signature          = hex(HMAC(signing key, string to sign))
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use ring::{digest, hmac};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::error::{AuthEngineError, Result};

/// The only algorithm SigV4 defines.
pub const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Region used when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// A static AWS access key pair, optionally with a session token.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
}

impl AwsCredentials {
    /// Build credentials from their parts. An empty session token is treated
    /// as absent.
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<SecretString>,
        session_token: Option<SecretString>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.filter(|t| !t.expose_secret().is_empty()),
        }
    }

    /// The public access key identifier.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Whether both halves of the key pair are present.
    pub fn is_complete(&self) -> bool {
        !self.access_key_id.is_empty() && !self.secret_access_key.expose_secret().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Request / output types
// ---------------------------------------------------------------------------

/// The parts of an HTTP request that SigV4 covers.
#[derive(Debug)]
pub struct SignableRequest<'a> {
    /// HTTP method, upper case.
    pub method: &'a str,
    /// Full request URL.
    pub url: &'a Url,
    /// Extra headers to sign besides `host` and the `x-amz-*` ones.
    pub headers: &'a [(&'a str, &'a str)],
    /// Exact request body bytes.
    pub payload: &'a [u8],
}

/// Headers produced by signing a request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    /// Value for `x-amz-date`.
    pub amz_date: String,
    /// Value for `x-amz-security-token`, when using temporary credentials.
    pub security_token: Option<SecretString>,
    /// Value for `authorization`.
    pub authorization: String,
}

impl SignedHeaders {
    /// Attach the signature headers to a request builder.
    pub fn apply(self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder
            .header("x-amz-date", self.amz_date)
            .header("authorization", self.authorization);
        match self.security_token {
            Some(token) => builder.header("x-amz-security-token", token.expose_secret()),
            None => builder,
        }
    }
}

// ---------------------------------------------------------------------------
// Signer
// ---------------------------------------------------------------------------

/// Signs requests for one service in one region.
#[derive(Debug, Clone)]
pub struct SigV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl SigV4Signer {
    /// Create a signer for `service` (e.g. `"sns"`, `"bedrock"`) in `region`.
    pub fn new(
        credentials: AwsCredentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    /// The region requests are scoped to.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// The service name requests are scoped to.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Sign `request` as of `at`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::SigningFailed`] when the key pair is
    /// incomplete or the URL has no host.
    pub fn sign(&self, request: &SignableRequest<'_>, at: DateTime<Utc>) -> Result<SignedHeaders> {
        if !self.credentials.is_complete() {
            return Err(AuthEngineError::SigningFailed {
                reason: "AWS access key id or secret access key is not configured".to_string(),
            });
        }

        let amz_date = at.format("%Y%m%dT%H%M%SZ").to_string();
        let date_stamp = at.format("%Y%m%d").to_string();

        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        headers.insert("host".to_string(), host_header(request.url)?);
        headers.insert("x-amz-date".to_string(), amz_date.clone());
        if let Some(ref token) = self.credentials.session_token {
            headers.insert(
                "x-amz-security-token".to_string(),
                token.expose_secret().to_string(),
            );
        }
        for (name, value) in request.headers {
            headers.insert(name.to_ascii_lowercase(), value.trim().to_string());
        }

        let canonical_headers: String = headers
            .iter()
            .map(|(name, value)| format!("{name}:{value}\n"))
            .collect();
        let signed_headers = headers.keys().cloned().collect::<Vec<_>>().join(";");

        let canonical_request = format!(
            "{method}\n{uri}\n{query}\n{canonical_headers}\n{signed_headers}\n{payload_hash}",
            method = request.method,
            uri = canonical_uri(request.url),
            query = canonical_query(request.url),
            payload_hash = sha256_hex(request.payload),
        );

        let scope = format!(
            "{date_stamp}/{}/{}/aws4_request",
            self.region, self.service
        );
        let string_to_sign = format!(
            "{SIGNING_ALGORITHM}\n{amz_date}\n{scope}\n{}",
            sha256_hex(canonical_request.as_bytes())
        );

        let signing_key = derive_signing_key(
            self.credentials.secret_access_key.expose_secret(),
            &date_stamp,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac_sha256(&signing_key, string_to_sign.as_bytes()));

        tracing::trace!(
            service = %self.service,
            region = %self.region,
            signed_headers = %signed_headers,
            "signed request"
        );

        Ok(SignedHeaders {
            amz_date,
            security_token: self.credentials.session_token.clone(),
            authorization: format!(
                "{SIGNING_ALGORITHM} Credential={}/{scope}, SignedHeaders={signed_headers}, Signature={signature}",
                self.credentials.access_key_id
            ),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Derive the SigV4 signing key for a date, region, and service.
pub fn derive_signing_key(secret: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{secret}").as_bytes(), date_stamp.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(digest::digest(&digest::SHA256, data).as_ref())
}

/// `host[:port]`, matching what the HTTP client sends.
fn host_header(url: &Url) -> Result<String> {
    let host = url.host_str().ok_or_else(|| AuthEngineError::SigningFailed {
        reason: format!("url has no host: {url}"),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Non-S3 services encode each path segment a second time.
fn canonical_uri(url: &Url) -> String {
    let path = url.path();
    if path.is_empty() || path == "/" {
        return "/".to_string();
    }
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn canonical_query(url: &Url) -> String {
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            (
                urlencoding::encode(&k).into_owned(),
                urlencoding::encode(&v).into_owned(),
            )
        })
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
