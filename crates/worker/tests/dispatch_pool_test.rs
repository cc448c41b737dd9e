use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use dialer_core::models::{CallStatus, DispatchCommand, LeadStatus};
use dialer_core::traits::{CallAttemptRepository, CampaignRepository, LeadRepository};
use dialer_dispatcher::RateLimiter;
use dialer_infrastructure::{
    InMemoryDispatchQueue, MemoryCallAttemptRepository, MemoryCampaignRepository,
    MemoryLeadRepository,
};
use dialer_testing_utils::{
    CallAttemptBuilder, CampaignBuilder, FailingCallExecutor, LeadBuilder, MockCallExecutor,
};
use dialer_worker::DispatchWorkerPool;

struct Harness {
    campaign_repo: Arc<MemoryCampaignRepository>,
    lead_repo: Arc<MemoryLeadRepository>,
    attempt_repo: Arc<MemoryCallAttemptRepository>,
    limiter: Arc<RateLimiter>,
}

fn harness() -> Harness {
    Harness {
        campaign_repo: Arc::new(MemoryCampaignRepository::new()),
        lead_repo: Arc::new(MemoryLeadRepository::new()),
        attempt_repo: Arc::new(MemoryCallAttemptRepository::new()),
        limiter: Arc::new(RateLimiter::new(100)),
    }
}

impl Harness {
    fn pool(
        &self,
        executor: Arc<dyn dialer_core::traits::CallExecutor>,
    ) -> DispatchWorkerPool {
        DispatchWorkerPool::new(
            self.campaign_repo.clone(),
            self.lead_repo.clone(),
            self.attempt_repo.clone(),
            Arc::new(InMemoryDispatchQueue::new()),
            executor,
            self.limiter.clone(),
            2,
            Duration::from_millis(10),
        )
    }

    /// Seed a claimed lead and build the command the scheduler would emit.
    async fn claimed_command(&self) -> DispatchCommand {
        let campaign = self
            .campaign_repo
            .create(&CampaignBuilder::new().always_callable().build())
            .await
            .unwrap();
        let lead = self
            .lead_repo
            .create(&LeadBuilder::new().with_campaign_id(campaign.id).build())
            .await
            .unwrap();
        let claim = self
            .lead_repo
            .claim(lead.id, Utc::now())
            .await
            .unwrap()
            .unwrap();
        DispatchCommand {
            claim,
            campaign_id: campaign.id,
            lead_id: lead.id,
            phone: lead.phone.clone(),
            prompt_ref: campaign.prompt_ref.clone(),
            preferred_language: None,
            max_duration_seconds: campaign.call_duration_limit_seconds,
            attempt_number: 1,
        }
    }
}

#[tokio::test]
async fn test_successful_call_opens_attempt() {
    let h = harness();
    let executor = Arc::new(MockCallExecutor::new());
    let pool = h.pool(executor.clone());
    let command = h.claimed_command().await;

    pool.handle_command(&command).await.unwrap();

    // One request reached the provider with the command's parameters
    let requests = executor.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].phone, command.phone);

    // Attempt recorded as Initiated under the provider correlation id
    let attempts = h.attempt_repo.get_by_lead_id(command.lead_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, CallStatus::Initiated);
    assert_eq!(attempts[0].attempt_number, 1);

    // Lead stays claimed while the call is in flight
    let lead = h
        .lead_repo
        .get_by_id(command.lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.status, LeadStatus::InProgress);
}

#[tokio::test]
async fn test_executor_failure_releases_claim() {
    let h = harness();
    let pool = h.pool(Arc::new(FailingCallExecutor));
    let command = h.claimed_command().await;

    // Budget was consumed at admission time
    let campaign = h
        .campaign_repo
        .get_by_id(command.campaign_id)
        .await
        .unwrap()
        .unwrap();
    let now = Utc::now();
    h.limiter.admit(&campaign, 1, now).await.unwrap();

    let result = pool.handle_command(&command).await;
    assert!(result.is_err());

    // No attempt was recorded, the try does not count
    let attempts = h.attempt_repo.get_by_lead_id(command.lead_id).await.unwrap();
    assert!(attempts.is_empty());

    // Lead restored to its pre-claim state
    let lead = h
        .lead_repo
        .get_by_id(command.lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Pending);
    assert_eq!(lead.attempts_made, 0);
    assert!(lead.last_attempt_time.is_none());

    // Admission refunded: budget and concurrency slot are back
    assert_eq!(
        h.limiter
            .remaining_daily_budget(&campaign, now)
            .await
            .unwrap(),
        campaign.calls_per_day as usize
    );
    assert_eq!(h.limiter.in_flight().await, 0);
}

#[tokio::test]
async fn test_attempt_create_failure_releases_claim_and_admission() {
    let h = harness();
    let pool = h.pool(Arc::new(MockCallExecutor::new()));
    let command = h.claimed_command().await;
    let campaign = h
        .campaign_repo
        .get_by_id(command.campaign_id)
        .await
        .unwrap()
        .unwrap();
    let now = Utc::now();
    h.limiter.admit(&campaign, 1, now).await.unwrap();

    // A lingering open attempt makes recording the new call collide
    h.attempt_repo
        .create(
            &CallAttemptBuilder::new()
                .with_campaign_id(campaign.id)
                .with_lead_id(command.lead_id)
                .with_correlation_id("corr-lingering")
                .build(),
        )
        .await
        .unwrap();

    let result = pool.handle_command(&command).await;
    assert!(result.is_err());

    // Without a record the call's terminal event can never be matched,
    // so the lead and the admission must not wait for it
    let lead = h
        .lead_repo
        .get_by_id(command.lead_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(lead.status, LeadStatus::Pending);
    assert_eq!(h.limiter.in_flight().await, 0);
    assert_eq!(
        h.limiter
            .remaining_daily_budget(&campaign, now)
            .await
            .unwrap(),
        campaign.calls_per_day as usize
    );
}

#[tokio::test]
async fn test_scripted_executor_results_in_order() {
    let h = harness();
    let executor = Arc::new(MockCallExecutor::new());
    executor
        .push_result(Ok("corr-scripted".to_string()))
        .await;
    let pool = h.pool(executor.clone());
    let command = h.claimed_command().await;

    pool.handle_command(&command).await.unwrap();

    let attempt = h
        .attempt_repo
        .get_by_correlation_id("corr-scripted")
        .await
        .unwrap();
    assert!(attempt.is_some());
}
