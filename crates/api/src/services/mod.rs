//! Application services: the submission pipeline and its collaborators.

pub mod attempt_limiter;
pub mod email;
pub mod submission;

pub use attempt_limiter::{AttemptLimiter, LimitedOperation};
pub use email::{EmailDispatcher, EmailService};
pub use submission::SubmissionService;
