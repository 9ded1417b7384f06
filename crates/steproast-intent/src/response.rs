//! Invocation results and their wire form.
//!
//! The outward payload mirrors a serverless function result:
//! `{"statusCode": 200, "body": "<json string>"}`.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::StepCheckError;

pub const ROAST_SENT_MESSAGE: &str = "Roast message sent successfully!";
pub const NO_ROAST_MESSAGE: &str = "Good job! No roasting needed today.";
pub const FAILURE_MESSAGE: &str = "Failed to process step check";

/// What a successful step check did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Below threshold: a roast was generated and published.
    Roasted { steps: u64, roast: String },
    /// At or above threshold: nothing was sent.
    NoRoastNeeded { steps: u64 },
}

impl CheckOutcome {
    pub fn steps(&self) -> u64 {
        match self {
            Self::Roasted { steps, .. } | Self::NoRoastNeeded { steps } => *steps,
        }
    }

    /// Whether a notification went out.
    pub fn sent(&self) -> bool {
        matches!(self, Self::Roasted { .. })
    }
}

/// Decoded response body. Variants are distinguished by their fields.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ResponseBody {
    Roasted {
        message: String,
        steps: u64,
        roast: String,
    },
    NoRoastNeeded {
        message: String,
        steps: u64,
    },
    Failed {
        error: String,
        details: String,
    },
}

/// Result of one invocation as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    /// JSON document, serialized to a string.
    pub body: String,
}

impl InvocationResponse {
    /// 200 response for a completed check.
    pub fn success(outcome: &CheckOutcome) -> Self {
        let body = match outcome {
            CheckOutcome::Roasted { steps, roast } => json!({
                "message": ROAST_SENT_MESSAGE,
                "steps": steps,
                "roast": roast,
            }),
            CheckOutcome::NoRoastNeeded { steps } => json!({
                "message": NO_ROAST_MESSAGE,
                "steps": steps,
            }),
        };
        Self {
            status_code: 200,
            body: body.to_string(),
        }
    }

    /// 500 response carrying the failure's message as `details`.
    pub fn failure(error: &StepCheckError) -> Self {
        Self {
            status_code: 500,
            body: json!({
                "error": FAILURE_MESSAGE,
                "details": error.to_string(),
            })
            .to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// Decode `body` back into its typed form.
    pub fn parsed_body(&self) -> serde_json::Result<ResponseBody> {
        serde_json::from_str(&self.body)
    }
}

impl From<Result<CheckOutcome, StepCheckError>> for InvocationResponse {
    fn from(result: Result<CheckOutcome, StepCheckError>) -> Self {
        match result {
            Ok(outcome) => Self::success(&outcome),
            Err(e) => Self::failure(&e),
        }
    }
}
