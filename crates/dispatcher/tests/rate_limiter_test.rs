use chrono::{DateTime, Utc};

use dialer_dispatcher::RateLimiter;
use dialer_testing_utils::CampaignBuilder;

fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

#[tokio::test]
async fn test_daily_budget_enforced() {
    let limiter = RateLimiter::new(100);
    let campaign = CampaignBuilder::new().with_calls_per_day(3).build();
    let now = utc("2024-06-12T10:00:00Z");

    assert_eq!(limiter.admit(&campaign, 2, now).await.unwrap(), 2);
    assert_eq!(limiter.remaining_daily_budget(&campaign, now).await.unwrap(), 1);
    // Request exceeds what is left, only the remainder is admitted
    assert_eq!(limiter.admit(&campaign, 5, now).await.unwrap(), 1);
    assert_eq!(limiter.admit(&campaign, 1, now).await.unwrap(), 0);
}

#[tokio::test]
async fn test_budget_resets_at_campaign_local_midnight() {
    let limiter = RateLimiter::new(100);
    let campaign = CampaignBuilder::new()
        .with_calls_per_day(2)
        .with_time_zone("Asia/Shanghai")
        .build();

    // 15:00 UTC = 23:00 in Shanghai, same local day
    let evening = utc("2024-06-12T15:00:00Z");
    assert_eq!(limiter.admit(&campaign, 2, evening).await.unwrap(), 2);
    assert_eq!(
        limiter.remaining_daily_budget(&campaign, evening).await.unwrap(),
        0
    );

    // 16:30 UTC = 00:30 next day in Shanghai, budget is fresh
    let past_midnight = utc("2024-06-12T16:30:00Z");
    assert_eq!(
        limiter
            .remaining_daily_budget(&campaign, past_midnight)
            .await
            .unwrap(),
        2
    );
    assert_eq!(limiter.admit(&campaign, 2, past_midnight).await.unwrap(), 2);
}

#[tokio::test]
async fn test_global_concurrency_ceiling_spans_campaigns() {
    let limiter = RateLimiter::new(3);
    let a = CampaignBuilder::new().with_id(1).with_calls_per_day(100).build();
    let b = CampaignBuilder::new().with_id(2).with_calls_per_day(100).build();
    let now = Utc::now();

    assert_eq!(limiter.admit(&a, 2, now).await.unwrap(), 2);
    // Only one slot left globally even though campaign B has full budget
    assert_eq!(limiter.admit(&b, 5, now).await.unwrap(), 1);
    assert_eq!(limiter.in_flight().await, 3);

    // A call finishing frees a concurrency slot
    limiter.complete_call().await;
    assert_eq!(limiter.admit(&b, 5, now).await.unwrap(), 1);
}

#[tokio::test]
async fn test_completed_call_does_not_refund_daily_budget() {
    let limiter = RateLimiter::new(10);
    let campaign = CampaignBuilder::new().with_calls_per_day(2).build();
    let now = Utc::now();

    assert_eq!(limiter.admit(&campaign, 2, now).await.unwrap(), 2);
    limiter.complete_call().await;
    limiter.complete_call().await;

    // Budget stays consumed, only concurrency was freed
    assert_eq!(limiter.remaining_daily_budget(&campaign, now).await.unwrap(), 0);
    assert_eq!(limiter.in_flight().await, 0);
}

#[tokio::test]
async fn test_release_admission_refunds_budget_and_slot() {
    let limiter = RateLimiter::new(10);
    let campaign = CampaignBuilder::new().with_calls_per_day(2).build();
    let now = Utc::now();

    assert_eq!(limiter.admit(&campaign, 2, now).await.unwrap(), 2);
    // Dispatch failed before any call was placed
    limiter.release_admission(&campaign, 2, now).await.unwrap();

    assert_eq!(limiter.remaining_daily_budget(&campaign, now).await.unwrap(), 2);
    assert_eq!(limiter.in_flight().await, 0);
}
