use chrono::{Duration, Utc};

use dialer_core::models::{CallStatus, CampaignStatus, CounterDelta, LeadStatus};
use dialer_core::traits::{CallAttemptRepository, CampaignRepository, LeadRepository};
use dialer_core::DialerError;
use dialer_infrastructure::{
    MemoryCallAttemptRepository, MemoryCampaignRepository, MemoryLeadRepository,
};
use dialer_testing_utils::{CallAttemptBuilder, CampaignBuilder, LeadBuilder};

#[tokio::test]
async fn test_claim_is_atomic_second_claim_loses() {
    let repo = MemoryLeadRepository::new();
    let lead = repo.create(&LeadBuilder::new().build()).await.unwrap();
    let now = Utc::now();

    let first = repo.claim(lead.id, now).await.unwrap();
    assert!(first.is_some());

    // Lead is now InProgress, a competing claim must lose
    let second = repo.claim(lead.id, now).await.unwrap();
    assert!(second.is_none());
}

#[tokio::test]
async fn test_claim_refuses_do_not_call() {
    let repo = MemoryLeadRepository::new();
    let lead = repo
        .create(&LeadBuilder::new().do_not_call().build())
        .await
        .unwrap();

    let claim = repo.claim(lead.id, Utc::now()).await.unwrap();
    assert!(claim.is_none());
}

#[tokio::test]
async fn test_release_restores_pre_claim_state_exactly() {
    let repo = MemoryLeadRepository::new();
    let next_attempt = Utc::now() - Duration::minutes(5);
    let last_attempt = Utc::now() - Duration::hours(2);
    let lead = repo
        .create(
            &LeadBuilder::new()
                .with_status(LeadStatus::Scheduled)
                .with_next_attempt_time(next_attempt)
                .with_last_attempt_time(last_attempt)
                .build(),
        )
        .await
        .unwrap();

    let claim = repo.claim(lead.id, Utc::now()).await.unwrap().unwrap();
    let claimed = repo.get_by_id(lead.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, LeadStatus::InProgress);

    repo.release(&claim).await.unwrap();

    let restored = repo.get_by_id(lead.id).await.unwrap().unwrap();
    assert_eq!(restored.status, LeadStatus::Scheduled);
    assert_eq!(restored.next_attempt_time, Some(next_attempt));
    assert_eq!(restored.last_attempt_time, Some(last_attempt));
}

#[tokio::test]
async fn test_release_does_not_overwrite_blacklist() {
    let repo = MemoryLeadRepository::new();
    let lead = repo.create(&LeadBuilder::new().build()).await.unwrap();

    let claim = repo.claim(lead.id, Utc::now()).await.unwrap().unwrap();
    // Operator blacklists the lead while it is claimed
    repo.blacklist(lead.id, "customer complaint").await.unwrap();

    repo.release(&claim).await.unwrap();

    let after = repo.get_by_id(lead.id).await.unwrap().unwrap();
    assert_eq!(after.status, LeadStatus::Blacklisted);
    assert_eq!(after.blacklist_reason.as_deref(), Some("customer complaint"));
}

#[tokio::test]
async fn test_postpone_stamps_next_attempt_time() {
    let repo = MemoryLeadRepository::new();
    let lead = repo.create(&LeadBuilder::new().build()).await.unwrap();
    let now = Utc::now();
    let next_open = now + Duration::hours(12);

    repo.postpone(lead.id, next_open, now).await.unwrap();

    let stored = repo.get_by_id(lead.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LeadStatus::Pending);
    assert_eq!(stored.next_attempt_time, Some(next_open));
}

#[tokio::test]
async fn test_postpone_does_not_overwrite_blacklist() {
    let repo = MemoryLeadRepository::new();
    let lead = repo.create(&LeadBuilder::new().build()).await.unwrap();
    // Operator blacklists between the selector's read and its write-back
    repo.blacklist(lead.id, "opt-out request").await.unwrap();

    repo.postpone(lead.id, Utc::now() + Duration::hours(12), Utc::now())
        .await
        .unwrap();

    let stored = repo.get_by_id(lead.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LeadStatus::Blacklisted);
    assert!(stored.next_attempt_time.is_none());
}

#[tokio::test]
async fn test_postpone_skips_claimed_lead() {
    let repo = MemoryLeadRepository::new();
    let lead = repo.create(&LeadBuilder::new().build()).await.unwrap();
    let now = Utc::now();
    repo.claim(lead.id, now).await.unwrap().unwrap();

    repo.postpone(lead.id, now + Duration::hours(12), now)
        .await
        .unwrap();

    let stored = repo.get_by_id(lead.id).await.unwrap().unwrap();
    assert_eq!(stored.status, LeadStatus::InProgress);
    assert!(stored.next_attempt_time.is_none());
}

#[tokio::test]
async fn test_get_due_leads_ordering() {
    let repo = MemoryLeadRepository::new();
    let now = Utc::now();

    // Same priority, higher score wins
    let low_score = repo
        .create(&LeadBuilder::new().with_score(10).build())
        .await
        .unwrap();
    let high_score = repo
        .create(&LeadBuilder::new().with_score(90).build())
        .await
        .unwrap();
    // Higher priority beats everything
    let high_priority = repo
        .create(&LeadBuilder::new().with_priority(5).with_score(1).build())
        .await
        .unwrap();
    // Never-attempted sorts before previously attempted at equal priority/score
    let attempted = repo
        .create(
            &LeadBuilder::new()
                .with_score(90)
                .with_last_attempt_time(now - Duration::hours(1))
                .build(),
        )
        .await
        .unwrap();

    let due = repo.get_due_leads(1, now, 10).await.unwrap();
    let ids: Vec<i64> = due.iter().map(|l| l.id).collect();
    assert_eq!(
        ids,
        vec![high_priority.id, high_score.id, attempted.id, low_score.id]
    );
}

#[tokio::test]
async fn test_get_due_leads_excludes_future_and_terminal() {
    let repo = MemoryLeadRepository::new();
    let now = Utc::now();

    repo.create(
        &LeadBuilder::new()
            .with_status(LeadStatus::Scheduled)
            .with_next_attempt_time(now + Duration::minutes(30))
            .build(),
    )
    .await
    .unwrap();
    repo.create(&LeadBuilder::new().with_status(LeadStatus::Completed).build())
        .await
        .unwrap();
    repo.create(&LeadBuilder::new().blacklisted("dnc list").build())
        .await
        .unwrap();
    let due_lead = repo
        .create(
            &LeadBuilder::new()
                .with_status(LeadStatus::Scheduled)
                .with_next_attempt_time(now - Duration::minutes(1))
                .build(),
        )
        .await
        .unwrap();

    let due = repo.get_due_leads(1, now, 10).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, due_lead.id);
}

#[tokio::test]
async fn test_only_one_open_attempt_per_lead() {
    let repo = MemoryCallAttemptRepository::new();
    let first = CallAttemptBuilder::new()
        .with_lead_id(7)
        .with_correlation_id("corr-a")
        .build();
    repo.create(&first).await.unwrap();

    let second = CallAttemptBuilder::new()
        .with_lead_id(7)
        .with_correlation_id("corr-b")
        .build();
    let err = repo.create(&second).await.unwrap_err();
    assert!(matches!(err, DialerError::OpenAttemptExists { lead_id: 7 }));
}

#[tokio::test]
async fn test_new_attempt_allowed_after_finalize() {
    let repo = MemoryCallAttemptRepository::new();
    let first = repo
        .create(
            &CallAttemptBuilder::new()
                .with_lead_id(7)
                .with_correlation_id("corr-a")
                .build(),
        )
        .await
        .unwrap();
    repo.finalize(
        first.id,
        CallStatus::NoAnswer,
        None,
        None,
        serde_json::Value::Null,
        Utc::now(),
    )
    .await
    .unwrap();

    let second = CallAttemptBuilder::new()
        .with_lead_id(7)
        .with_correlation_id("corr-b")
        .with_attempt_number(2)
        .build();
    assert!(repo.create(&second).await.is_ok());
}

#[tokio::test]
async fn test_finalized_attempt_is_frozen() {
    let repo = MemoryCallAttemptRepository::new();
    let attempt = repo
        .create(&CallAttemptBuilder::new().build())
        .await
        .unwrap();

    repo.finalize(
        attempt.id,
        CallStatus::Completed,
        Some(42),
        None,
        serde_json::json!({"transcript": "hello"}),
        Utc::now(),
    )
    .await
    .unwrap();

    let err = repo
        .update_status(attempt.id, CallStatus::Failed)
        .await
        .unwrap_err();
    assert!(matches!(err, DialerError::AttemptFinalized { .. }));

    let err = repo
        .finalize(
            attempt.id,
            CallStatus::Failed,
            None,
            None,
            serde_json::Value::Null,
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DialerError::AttemptFinalized { .. }));

    // Stored data still reflects the first terminal event
    let stored = repo.get_by_id(attempt.id).await.unwrap().unwrap();
    assert_eq!(stored.status, CallStatus::Completed);
    assert_eq!(stored.duration_seconds, Some(42));
}

#[tokio::test]
async fn test_campaign_status_transition_enforced() {
    let repo = MemoryCampaignRepository::new();
    let campaign = repo
        .create(&CampaignBuilder::new().with_status(CampaignStatus::Draft).build())
        .await
        .unwrap();

    // Draft cannot jump straight to Completed
    let err = repo
        .update_status(campaign.id, CampaignStatus::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, DialerError::InvalidStateTransition { .. }));

    repo.update_status(campaign.id, CampaignStatus::Active)
        .await
        .unwrap();
    repo.update_status(campaign.id, CampaignStatus::Paused)
        .await
        .unwrap();
    repo.update_status(campaign.id, CampaignStatus::Active)
        .await
        .unwrap();
    repo.update_status(campaign.id, CampaignStatus::Completed)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_counter_delta_accumulates() {
    let repo = MemoryCampaignRepository::new();
    let campaign = repo
        .create(&CampaignBuilder::new().build())
        .await
        .unwrap();

    repo.apply_counter_delta(
        campaign.id,
        CounterDelta {
            total_leads: 10,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    repo.apply_counter_delta(
        campaign.id,
        CounterDelta {
            completed_calls: 1,
            successful_calls: 1,
            ..Default::default()
        },
    )
    .await
    .unwrap();
    repo.apply_counter_delta(
        campaign.id,
        CounterDelta {
            completed_calls: 1,
            failed_calls: 1,
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let stored = repo.get_by_id(campaign.id).await.unwrap().unwrap();
    assert_eq!(stored.total_leads, 10);
    assert_eq!(stored.completed_calls, 2);
    assert_eq!(stored.successful_calls, 1);
    assert_eq!(stored.failed_calls, 1);
    assert!(stored.completed_calls <= stored.total_leads);
}
