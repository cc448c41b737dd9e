pub mod memory;
pub mod queue;
pub mod simulated_executor;

pub use memory::{MemoryCallAttemptRepository, MemoryCampaignRepository, MemoryLeadRepository};
pub use queue::{InMemoryCallEventQueue, InMemoryDispatchQueue};
pub use simulated_executor::SimulatedCallExecutor;
