//! Google Fit step source.
//!
//! Uses the `dataset:aggregate` endpoint with a single one-day bucket over
//! the estimated-steps derived source, which is what the Fit app itself
//! displays.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use steproast_auth::AccessToken;
use tracing::{debug, info, warn};

use crate::error::{AdapterError, Result};
use crate::traits::{DAY_MILLIS, DayWindow, StepSource};

/// Default API host.
pub const GOOGLE_FIT_BASE_URL: &str = "https://www.googleapis.com";

const AGGREGATE_PATH: &str = "/fitness/v1/users/me/dataset:aggregate";
const STEP_DATA_TYPE: &str = "com.google.step_count.delta";
const STEP_DATA_SOURCE: &str =
    "derived:com.google.step_count.delta:com.google.android.gms:estimated_steps";
const SERVICE: &str = "google fit";

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateRequest<'a> {
    aggregate_by: [AggregateBy<'a>; 1],
    bucket_by_time: BucketByTime,
    start_time_millis: i64,
    end_time_millis: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregateBy<'a> {
    data_type_name: &'a str,
    data_source_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BucketByTime {
    duration_millis: i64,
}

impl AggregateRequest<'static> {
    fn for_window(window: &DayWindow) -> Self {
        Self {
            aggregate_by: [AggregateBy {
                data_type_name: STEP_DATA_TYPE,
                data_source_id: STEP_DATA_SOURCE,
            }],
            bucket_by_time: BucketByTime {
                duration_millis: DAY_MILLIS,
            },
            start_time_millis: window.start_millis,
            end_time_millis: window.end_millis,
        }
    }
}

/// Google sends `null` for empty levels as readily as it omits them.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response of `dataset:aggregate`. Every level may be absent or `null`.
#[derive(Debug, Default, Deserialize)]
pub struct AggregateResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub bucket: Vec<Bucket>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Bucket {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub dataset: Vec<Dataset>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Dataset {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub point: Vec<DataPoint>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DataPoint {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: Vec<PointValue>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointValue {
    pub int_val: Option<i64>,
}

/// Pull the step total out of an aggregate response.
///
/// Reads the first value of the first point of the first dataset of the
/// first bucket. Any missing level yields 0, as does a negative count.
pub fn extract_step_count(response: &AggregateResponse) -> u64 {
    let Some(dataset) = response.bucket.first().and_then(|b| b.dataset.first()) else {
        info!("no step data found for today");
        return 0;
    };
    let Some(point) = dataset.point.first() else {
        info!("no step points found for today");
        return 0;
    };
    point
        .value
        .first()
        .and_then(|v| v.int_val)
        .map_or(0, |n| u64::try_from(n).unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Step source
// ---------------------------------------------------------------------------

/// [`StepSource`] backed by the Google Fit REST API.
pub struct GoogleFitStepSource {
    http: reqwest::Client,
    base_url: String,
}

impl GoogleFitStepSource {
    /// Source pointed at the public API.
    pub fn new() -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AdapterError::ConfigError(format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self::with_client(http))
    }

    /// Source using a caller-supplied HTTP client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: GOOGLE_FIT_BASE_URL.to_string(),
        }
    }

    /// Point at a different host (trailing slash ignored).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn aggregate_url(&self) -> String {
        format!("{}{AGGREGATE_PATH}", self.base_url)
    }
}

#[async_trait]
impl StepSource for GoogleFitStepSource {
    async fn daily_steps(&self, token: &AccessToken, window: &DayWindow) -> Result<u64> {
        debug!(
            start_millis = window.start_millis,
            end_millis = window.end_millis,
            "requesting step aggregate"
        );

        let response = self
            .http
            .post(self.aggregate_url())
            .bearer_auth(token.secret())
            .json(&AggregateRequest::for_window(window))
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
            warn!(status = %status, "google fit error response");
            return Err(AdapterError::HttpStatus {
                service: SERVICE,
                status: status.as_u16(),
                message: error_message(&text),
            });
        }

        let parsed: AggregateResponse =
            serde_json::from_str(&text).map_err(|e| AdapterError::Decode {
                service: SERVICE,
                reason: e.to_string(),
            })?;

        let steps = extract_step_count(&parsed);
        info!(steps, "step count fetched");
        Ok(steps)
    }
}

/// Google API errors look like `{"error": {"message": ".."}}`.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Inner,
    }
    #[derive(Deserialize)]
    struct Inner {
        message: String,
    }
    serde_json::from_str::<Envelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn parse(value: serde_json::Value) -> AggregateResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn extract_no_bucket() {
        assert_eq!(extract_step_count(&parse(json!({}))), 0);
        assert_eq!(extract_step_count(&parse(json!({"bucket": []}))), 0);
    }

    #[test]
    fn extract_empty_dataset() {
        assert_eq!(extract_step_count(&parse(json!({"bucket": [{}]}))), 0);
        assert_eq!(
            extract_step_count(&parse(json!({"bucket": [{"dataset": []}]}))),
            0
        );
    }

    #[test]
    fn extract_empty_points() {
        let r = parse(json!({"bucket": [{"dataset": [{"point": []}]}]}));
        assert_eq!(extract_step_count(&r), 0);
    }

    #[test]
    fn extract_missing_value() {
        let r = parse(json!({"bucket": [{"dataset": [{"point": [{}]}]}]}));
        assert_eq!(extract_step_count(&r), 0);
        let r = parse(json!({"bucket": [{"dataset": [{"point": [{"value": [{"fpVal": 1.5}]}]}]}]}));
        assert_eq!(extract_step_count(&r), 0);
    }

    #[test]
    fn extract_null_levels() {
        assert_eq!(extract_step_count(&parse(json!({"bucket": null}))), 0);
        assert_eq!(
            extract_step_count(&parse(json!({"bucket": [{"dataset": null}]}))),
            0
        );
        let r = parse(json!({"bucket": [{"dataset": [{"point": null}]}]}));
        assert_eq!(extract_step_count(&r), 0);
        let r = parse(json!({"bucket": [{"dataset": [{"point": [{"value": null}]}]}]}));
        assert_eq!(extract_step_count(&r), 0);
        let r = parse(json!({"bucket": [{"dataset": [{"point": [
            {"value": [{"intVal": null}]}
        ]}]}]}));
        assert_eq!(extract_step_count(&r), 0);
    }

    #[test]
    fn extract_negative_is_zero() {
        let r = parse(json!({"bucket": [{"dataset": [{"point": [{"value": [{"intVal": -7}]}]}]}]}));
        assert_eq!(extract_step_count(&r), 0);
    }

    #[test]
    fn extract_reads_first_point() {
        let r = parse(json!({"bucket": [{"dataset": [{"point": [
            {"value": [{"intVal": 4321}, {"intVal": 9}]},
            {"value": [{"intVal": 1}]}
        ]}]}]}));
        assert_eq!(extract_step_count(&r), 4321);
    }

    #[test]
    fn request_body_shape() {
        let window = DayWindow {
            start_millis: 1_000,
            end_millis: 1_000 + DAY_MILLIS,
        };
        let body = serde_json::to_value(AggregateRequest::for_window(&window)).unwrap();
        assert_eq!(
            body,
            json!({
                "aggregateBy": [{
                    "dataTypeName": "com.google.step_count.delta",
                    "dataSourceId": "derived:com.google.step_count.delta:com.google.android.gms:estimated_steps"
                }],
                "bucketByTime": {"durationMillis": 86_400_000},
                "startTimeMillis": 1_000,
                "endTimeMillis": 86_401_000
            })
        );
    }

    #[tokio::test]
    async fn daily_steps_sends_bearer_and_window() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", AGGREGATE_PATH)
            .match_header("authorization", "Bearer ya29.token")
            .match_body(Matcher::PartialJson(json!({
                "startTimeMillis": 10,
                "endTimeMillis": 20
            })))
            .with_status(200)
            .with_body(r#"{"bucket":[{"dataset":[{"point":[{"value":[{"intVal":57}]}]}]}]}"#)
            .create_async()
            .await;

        let source = GoogleFitStepSource::new().unwrap().with_base_url(server.url());
        let window = DayWindow {
            start_millis: 10,
            end_millis: 20,
        };
        let steps = source
            .daily_steps(&AccessToken::new("ya29.token"), &window)
            .await
            .unwrap();

        assert_eq!(steps, 57);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unauthorized_is_http_status_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", AGGREGATE_PATH)
            .with_status(401)
            .with_body(r#"{"error":{"code":401,"message":"Request had invalid authentication credentials."}}"#)
            .create_async()
            .await;

        let source = GoogleFitStepSource::new().unwrap().with_base_url(server.url());
        let err = source
            .daily_steps(&AccessToken::new("stale"), &DayWindow::today())
            .await
            .unwrap_err();

        match err {
            AdapterError::HttpStatus { status, message, .. } => {
                assert_eq!(status, 401);
                assert!(message.contains("invalid authentication"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn null_points_count_as_zero_steps() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", AGGREGATE_PATH)
            .with_status(200)
            .with_body(r#"{"bucket":[{"startTimeMillis":"10","dataset":[{"point":null}]}]}"#)
            .expect(1)
            .create_async()
            .await;

        let source = GoogleFitStepSource::new().unwrap().with_base_url(server.url());
        let steps = source
            .daily_steps(&AccessToken::new("t"), &DayWindow::today())
            .await
            .unwrap();

        assert_eq!(steps, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", AGGREGATE_PATH)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let source = GoogleFitStepSource::new().unwrap().with_base_url(server.url());
        let err = source
            .daily_steps(&AccessToken::new("t"), &DayWindow::today())
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Decode { .. }));
    }
}
