//! Runtime configuration.
//!
//! Everything comes from environment variables, optionally seeded from a
//! `.env` file. Nothing is validated up front: a missing credential shows up
//! later as an authentication or publish failure of the step check itself.

use anyhow::{Context, Result};
use secrecy::SecretString;
use steproast_adapters::GOOGLE_FIT_BASE_URL;
use steproast_agent::DEFAULT_MODEL_ID;
use steproast_auth::{DEFAULT_REGION, GOOGLE_TOKEN_URL};
use steproast_intent::DEFAULT_STEP_THRESHOLD;

/// Settings for one step check.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub google_client_id: String,
    pub google_client_secret: SecretString,
    pub google_refresh_token: SecretString,
    pub google_access_token: Option<SecretString>,
    pub sns_topic_arn: String,
    pub aws_region: String,
    pub aws_access_key_id: String,
    pub aws_secret_access_key: SecretString,
    pub aws_session_token: Option<SecretString>,
    /// Bedrock API key. When set, Bedrock calls use it instead of SigV4.
    pub bedrock_api_key: Option<SecretString>,
    pub bedrock_model_id: String,
    pub step_threshold: u64,
    pub google_token_url: String,
    pub google_fit_base_url: String,
    pub bedrock_endpoint: Option<String>,
    pub sns_endpoint: Option<String>,
}

impl AppConfig {
    /// Read the configuration through `lookup`, which maps a variable name
    /// to its value. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).unwrap_or_default();
        let secret = |key: &str| get(key).map(SecretString::from);

        let step_threshold = match get("STEP_THRESHOLD") {
            Some(raw) => raw
                .trim()
                .parse()
                .with_context(|| {
                    format!("STEP_THRESHOLD must be a non-negative integer, got `{raw}`")
                })?,
            None => DEFAULT_STEP_THRESHOLD,
        };

        Ok(Self {
            google_client_id: required("GOOGLE_CLIENT_ID"),
            google_client_secret: required("GOOGLE_CLIENT_SECRET").into(),
            google_refresh_token: required("GOOGLE_REFRESH_TOKEN").into(),
            google_access_token: secret("GOOGLE_ACCESS_TOKEN"),
            sns_topic_arn: required("SNS_TOPIC_ARN"),
            aws_region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            aws_access_key_id: required("AWS_ACCESS_KEY_ID"),
            aws_secret_access_key: required("AWS_SECRET_ACCESS_KEY").into(),
            aws_session_token: secret("AWS_SESSION_TOKEN"),
            bedrock_api_key: secret("AWS_BEARER_TOKEN_BEDROCK"),
            bedrock_model_id: get("BEDROCK_MODEL_ID")
                .unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            step_threshold,
            google_token_url: get("GOOGLE_TOKEN_URL")
                .unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            google_fit_base_url: get("GOOGLE_FIT_BASE_URL")
                .unwrap_or_else(|| GOOGLE_FIT_BASE_URL.to_string()),
            bedrock_endpoint: get("BEDROCK_ENDPOINT"),
            sns_endpoint: get("SNS_ENDPOINT"),
        })
    }

    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;
    use std::io::Write;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_when_empty() {
        let config = from_pairs(&[]).unwrap();
        assert_eq!(config.google_refresh_token.expose_secret(), "");
        assert_eq!(config.sns_topic_arn, "");
        assert_eq!(config.aws_region, "us-east-1");
        assert_eq!(config.step_threshold, 100);
        assert_eq!(config.bedrock_model_id, "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(config.google_token_url, "https://oauth2.googleapis.com/token");
        assert_eq!(config.google_fit_base_url, "https://www.googleapis.com");
        assert!(config.bedrock_api_key.is_none());
        assert!(config.sns_endpoint.is_none());
    }

    #[test]
    fn empty_values_count_as_unset() {
        let config = from_pairs(&[("AWS_SESSION_TOKEN", ""), ("AWS_REGION", "  ")]).unwrap();
        assert!(config.aws_session_token.is_none());
        assert_eq!(config.aws_region, "us-east-1");

        let config = from_pairs(&[("AWS_SESSION_TOKEN", "tok")]).unwrap();
        assert_eq!(
            config.aws_session_token.as_ref().map(|t| t.expose_secret()),
            Some("tok")
        );
    }

    #[test]
    fn threshold_override_and_rejection() {
        assert_eq!(
            from_pairs(&[("STEP_THRESHOLD", "2500")]).unwrap().step_threshold,
            2500
        );
        let err = from_pairs(&[("STEP_THRESHOLD", "-1")]).unwrap_err();
        assert!(err.to_string().contains("STEP_THRESHOLD"));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = from_pairs(&[
            ("GOOGLE_CLIENT_SECRET", "gcs-123"),
            ("GOOGLE_REFRESH_TOKEN", "1//rt"),
            ("AWS_SECRET_ACCESS_KEY", "aws-secret"),
            ("AWS_SESSION_TOKEN", "session-tok"),
            ("AWS_BEARER_TOKEN_BEDROCK", "bedrock-key"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("gcs-123"));
        assert!(!debug.contains("1//rt"));
        assert!(!debug.contains("aws-secret"));
        assert!(!debug.contains("session-tok"));
        assert!(!debug.contains("bedrock-key"));
        assert!(debug.contains("REDACTED"));
        assert!(debug.contains("aws_secret_access_key"));
    }

    #[test]
    fn reads_dotenv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "GOOGLE_CLIENT_ID=abc.apps.googleusercontent.com").unwrap();
        writeln!(file, "SNS_TOPIC_ARN=arn:aws:sns:eu-west-1:1:roasts").unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file, "STEP_THRESHOLD=50").unwrap();

        let vars: HashMap<String, String> = dotenvy::from_path_iter(&path)
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        let config = AppConfig::from_lookup(|k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.google_client_id, "abc.apps.googleusercontent.com");
        assert_eq!(config.sns_topic_arn, "arn:aws:sns:eu-west-1:1:roasts");
        assert_eq!(config.step_threshold, 50);
    }
}
