pub mod call_attempt;
pub mod campaign;
pub mod events;
pub mod lead;

pub use call_attempt::{CallAttempt, CallErrorKind, CallStatus, OutcomeClass};
pub use campaign::{Campaign, CampaignStatus, CounterDelta};
pub use events::{CallEvent, DispatchCommand, LeadClaim};
pub use lead::{Lead, LeadStatus, LeadStatusCounts};
