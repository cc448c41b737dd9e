pub mod backoff;
pub mod calling_window;
pub mod lead_selector;
pub mod outcome_processor;
pub mod rate_limiter;
pub mod scheduler;
pub mod watchdog;

pub use backoff::{BackoffPolicy, RetryDecision};
pub use calling_window::{CallingWindowGuard, WindowDecision};
pub use lead_selector::{ClaimedLead, LeadSelector};
pub use outcome_processor::OutcomeProcessor;
pub use rate_limiter::RateLimiter;
pub use scheduler::CampaignScheduler;
pub use watchdog::Watchdog;
