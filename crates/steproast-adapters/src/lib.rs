//! External service adapters for steproast: Google Fit and Amazon SNS.
//!
//! Each adapter implements one of the seam traits in [`traits`]:
//! [`StepSource`] for reading the day's step total and [`Notifier`] for
//! pushing the roast to the user.

pub mod error;
pub mod google_fit;
pub mod sns;
pub mod traits;

pub use error::{AdapterError, Result};
pub use google_fit::{
    AggregateResponse, GOOGLE_FIT_BASE_URL, GoogleFitStepSource, extract_step_count,
};
pub use sns::{SnsNotifier, region_from_topic_arn};
pub use traits::{DAY_MILLIS, DayWindow, Notification, Notifier, ROAST_SUBJECT, StepSource};
