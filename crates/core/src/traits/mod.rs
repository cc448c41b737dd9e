pub mod executor;
pub mod queue;
pub mod repository;

pub use executor::{CallExecutor, CallRequest};
pub use queue::{CallEventQueue, DispatchQueue};
pub use repository::{CallAttemptRepository, CampaignRepository, LeadRepository};
