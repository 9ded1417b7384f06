//! Step check orchestration for steproast.
//!
//! [`StepCheck`] sequences the four external calls of one invocation
//! (refresh credentials, fetch steps, generate a roast, publish it) and maps
//! the outcome to an [`InvocationResponse`]. [`CronScheduler`] and
//! [`run_scheduled`] drive it repeatedly in daemon mode.

pub mod check;
pub mod error;
pub mod response;
pub mod scheduler;

pub use check::{CheckState, DEFAULT_STEP_THRESHOLD, StepCheck};
pub use error::{IntentError, Result, StepCheckError};
pub use response::{
    CheckOutcome, FAILURE_MESSAGE, InvocationResponse, NO_ROAST_MESSAGE, ROAST_SENT_MESSAGE,
    ResponseBody,
};
pub use scheduler::{CronEvent, CronScheduler, parse_schedule, run_scheduled};
