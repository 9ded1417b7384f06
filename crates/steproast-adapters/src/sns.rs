//! Amazon SNS notifier.
//!
//! Publishes through the SNS Query API (`Action=Publish`) with a SigV4
//! signed form POST. Responses are XML; only the few elements needed for
//! logging and error messages are read.

use std::time::Duration;

use async_trait::async_trait;
use steproast_auth::{AwsCredentials, SigV4Signer, SignableRequest};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AdapterError, Result};
use crate::traits::{Notification, Notifier};

const SNS_API_VERSION: &str = "2010-03-31";
const SIGNING_SERVICE: &str = "sns";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const SERVICE: &str = "sns";

/// Region segment of an SNS topic ARN (`arn:aws:sns:<region>:<account>:<name>`).
pub fn region_from_topic_arn(arn: &str) -> Option<&str> {
    let mut parts = arn.split(':');
    if parts.next()? != "arn" {
        return None;
    }
    let region = parts.nth(2)?;
    (!region.is_empty()).then_some(region)
}

/// Text of the first `<tag>..</tag>` element in `xml`.
fn xml_element<'a>(xml: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = xml.find(&open)? + open.len();
    let len = xml[start..].find(&close)?;
    Some(xml[start..start + len].trim())
}

/// [`Notifier`] publishing to one SNS topic.
pub struct SnsNotifier {
    http: reqwest::Client,
    signer: SigV4Signer,
    topic_arn: String,
    endpoint: String,
}

impl std::fmt::Debug for SnsNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnsNotifier")
            .field("topic_arn", &self.topic_arn)
            .field("endpoint", &self.endpoint)
            .field("region", &self.signer.region())
            .finish()
    }
}

impl SnsNotifier {
    /// Notifier for `topic_arn`. The region comes from the ARN when it has
    /// one, otherwise `fallback_region`.
    pub fn new(
        credentials: AwsCredentials,
        topic_arn: impl Into<String>,
        fallback_region: &str,
    ) -> Result<Self> {
        let topic_arn = topic_arn.into();
        let region = region_from_topic_arn(&topic_arn)
            .unwrap_or(fallback_region)
            .to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AdapterError::ConfigError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("https://sns.{region}.amazonaws.com/"),
            signer: SigV4Signer::new(credentials, region, SIGNING_SERVICE),
            topic_arn,
        })
    }

    /// Send requests to a different endpoint. The signing region is kept.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        self.endpoint = if endpoint.ends_with('/') {
            endpoint
        } else {
            format!("{endpoint}/")
        };
        self
    }

    /// The topic notifications go to.
    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    /// Signing region in use.
    pub fn region(&self) -> &str {
        self.signer.region()
    }

    fn publish_form(&self, notification: &Notification) -> Result<String> {
        let params: &[(&str, &str)] = &[
            ("Action", "Publish"),
            ("Message", &notification.body),
            ("Subject", &notification.subject),
            ("TopicArn", &self.topic_arn),
            ("Version", SNS_API_VERSION),
        ];
        serde_urlencoded::to_string(params).map_err(|e| {
            AdapterError::ConfigError(format!("could not encode publish form: {e}"))
        })
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        if self.topic_arn.is_empty() {
            return Err(AdapterError::ConfigError(
                "SNS topic ARN is not configured".into(),
            ));
        }

        let url = Url::parse(&self.endpoint)
            .map_err(|e| AdapterError::ConfigError(format!("invalid SNS endpoint: {e}")))?;
        let body = self.publish_form(notification)?;

        let signed = self.signer.sign(
            &SignableRequest {
                method: "POST",
                url: &url,
                headers: &[("content-type", FORM_CONTENT_TYPE)],
                payload: body.as_bytes(),
            },
            chrono::Utc::now(),
        )?;

        debug!(topic_arn = %self.topic_arn, region = %self.signer.region(), "publishing to sns");

        let request = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, FORM_CONTENT_TYPE);
        let response = signed
            .apply(request)
            .body(body)
            .send()
            .await
            .map_err(|source| AdapterError::Request {
                service: SERVICE,
                source,
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|source| AdapterError::Request {
            service: SERVICE,
            source,
        })?;

        if !status.is_success() {
            let code = xml_element(&text, "Code").unwrap_or("unknown");
            let message = xml_element(&text, "Message").unwrap_or(text.as_str());
            warn!(status = %status, code, "sns error response");
            return Err(AdapterError::HttpStatus {
                service: SERVICE,
                status: status.as_u16(),
                message: message.to_string(),
            });
        }

        info!(
            topic_arn = %self.topic_arn,
            message_id = xml_element(&text, "MessageId").unwrap_or_default(),
            "notification published"
        );
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
