//! Builds a [`StepCheck`] from configuration with the production clients.

use anyhow::{Context, Result};
use steproast_adapters::{GoogleFitStepSource, SnsNotifier};
use steproast_agent::{BedrockAuth, BedrockClient, BedrockConfig, BedrockRoastGenerator};
use steproast_auth::{AwsCredentials, CredentialSeed, OAuthConfig, OAuthRefresher};
use steproast_intent::StepCheck;
use tracing::debug;

use crate::config::AppConfig;

/// Assemble the step check described by `config`.
pub fn build_step_check(config: &AppConfig) -> Result<StepCheck> {
    let oauth = OAuthConfig::google(&config.google_client_id, config.google_client_secret.clone())
        .with_token_url(&config.google_token_url);
    let refresher = OAuthRefresher::new(
        oauth,
        CredentialSeed {
            refresh_token: config.google_refresh_token.clone(),
            access_token: config.google_access_token.clone(),
        },
    );

    let steps = GoogleFitStepSource::new()
        .context("failed to create Google Fit client")?
        .with_base_url(&config.google_fit_base_url);

    let aws = AwsCredentials::new(
        &config.aws_access_key_id,
        config.aws_secret_access_key.clone(),
        config.aws_session_token.clone(),
    );

    let generator = BedrockRoastGenerator::new(
        BedrockClient::new(bedrock_config(config, aws.clone()))
            .context("failed to create Bedrock client")?,
    );

    let mut notifier = SnsNotifier::new(aws, &config.sns_topic_arn, &config.aws_region)
        .context("failed to create SNS client")?;
    if let Some(ref endpoint) = config.sns_endpoint {
        notifier = notifier.with_endpoint(endpoint);
    }

    debug!(
        sns_region = notifier.region(),
        model_id = %config.bedrock_model_id,
        threshold = config.step_threshold,
        "step check assembled"
    );

    Ok(StepCheck::new(
        Box::new(refresher),
        Box::new(steps),
        Box::new(generator),
        Box::new(notifier),
    )
    .with_threshold(config.step_threshold))
}

/// Bedrock settings: API key auth when one is configured, SigV4 otherwise.
fn bedrock_config(config: &AppConfig, aws: AwsCredentials) -> BedrockConfig {
    let auth = match config.bedrock_api_key {
        Some(ref key) => BedrockAuth::Bearer(key.clone()),
        None => BedrockAuth::SigV4(aws),
    };
    let bedrock =
        BedrockConfig::new(&config.aws_region, auth).with_model(&config.bedrock_model_id);
    match config.bedrock_endpoint {
        Some(ref endpoint) => bedrock.with_endpoint(endpoint),
        None => bedrock,
    }
}
