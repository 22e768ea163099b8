pub mod executor;
pub mod rate_limiter;
pub mod signature;
pub mod step_router;

pub use executor::{Launch, ScenarioExecutor, WebhookExecutor};
pub use rate_limiter::{RateLimiterConfig, SubmissionRateLimiter};
pub use signature::{CallbackSigner, SIGNATURE_HEADER};
pub use step_router::{StepRouter, StepStream};
