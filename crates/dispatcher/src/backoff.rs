use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use dialer_core::models::{Campaign, OutcomeClass};
use dialer_core::DialerResult;

use crate::calling_window::{CallingWindowGuard, WindowDecision};

/// 重试裁决结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// 安排重试，`next_attempt_time` 已对齐到拨打窗口内
    Retry { next_attempt_time: DateTime<Utc> },
    /// 重试预算耗尽或永久失败，线索进入终态
    Exhausted,
}

/// 退避策略
///
/// 固定延迟重试：上次拨打时间加 `retry_delay_minutes`，不早于当前
/// 时刻，再对齐到下一个拨打窗口。永久失败不消耗预算直接终止。
pub struct BackoffPolicy;

impl BackoffPolicy {
    /// 为一次非成功终态裁决下一步
    ///
    /// `attempts_made` 是计入本次后的累计拨打次数。
    pub fn decide(
        campaign: &Campaign,
        lead_tz: Option<&str>,
        attempts_made: i32,
        outcome: OutcomeClass,
        last_attempt_time: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> DialerResult<RetryDecision> {
        match outcome {
            OutcomeClass::Permanent => {
                debug!("活动 {} 的线索永久失败，不再重试", campaign.id);
                return Ok(RetryDecision::Exhausted);
            }
            OutcomeClass::Success => {
                // 成功结果不应进入退避流程，按耗尽处理
                return Ok(RetryDecision::Exhausted);
            }
            OutcomeClass::Retryable => {}
        }

        if attempts_made >= campaign.max_attempts_per_lead {
            debug!(
                "活动 {} 的线索已拨打 {} 次，达到上限 {}",
                campaign.id, attempts_made, campaign.max_attempts_per_lead
            );
            return Ok(RetryDecision::Exhausted);
        }

        let base = last_attempt_time.unwrap_or(now)
            + Duration::minutes(campaign.retry_delay_minutes as i64);
        let earliest = base.max(now);

        let next_attempt_time = match CallingWindowGuard::evaluate(campaign, lead_tz, earliest)? {
            WindowDecision::Callable => earliest,
            WindowDecision::Closed { next_open } => next_open,
        };

        Ok(RetryDecision::Retry { next_attempt_time })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, Weekday};
    use dialer_core::models::CampaignStatus;

    fn campaign() -> Campaign {
        Campaign {
            id: 1,
            tenant_id: 1,
            name: "测试活动".to_string(),
            status: CampaignStatus::Active,
            prompt_ref: "prompt-1".to_string(),
            calls_per_day: 100,
            max_attempts_per_lead: 3,
            retry_delay_minutes: 30,
            call_duration_limit_seconds: 300,
            calling_hours_start: NaiveTime::parse_from_str("09:00", "%H:%M").unwrap(),
            calling_hours_end: NaiveTime::parse_from_str("18:00", "%H:%M").unwrap(),
            time_zone: "UTC".to_string(),
            working_days: vec![
                Weekday::Mon,
                Weekday::Tue,
                Weekday::Wed,
                Weekday::Thu,
                Weekday::Fri,
            ],
            total_leads: 0,
            completed_calls: 0,
            successful_calls: 0,
            failed_calls: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_retry_delay_applied_from_last_attempt() {
        let c = campaign();
        // 2024-06-12 is a Wednesday
        let last = utc("2024-06-12T10:00:00Z");
        let now = utc("2024-06-12T10:01:00Z");
        let decision =
            BackoffPolicy::decide(&c, None, 1, OutcomeClass::Retryable, Some(last), now).unwrap();
        assert_eq!(
            decision,
            RetryDecision::Retry {
                next_attempt_time: utc("2024-06-12T10:30:00Z")
            }
        );
    }

    #[test]
    fn test_retry_never_scheduled_in_the_past() {
        let c = campaign();
        let last = utc("2024-06-12T09:00:00Z");
        // now 已经越过 last + 30min
        let now = utc("2024-06-12T10:00:00Z");
        let decision =
            BackoffPolicy::decide(&c, None, 1, OutcomeClass::Retryable, Some(last), now).unwrap();
        assert_eq!(
            decision,
            RetryDecision::Retry {
                next_attempt_time: now
            }
        );
    }

    #[test]
    fn test_retry_clipped_to_next_window() {
        let c = campaign();
        // 17:50 + 30min = 18:20，窗口已关，对齐到次日 09:00
        let last = utc("2024-06-12T17:50:00Z");
        let now = utc("2024-06-12T17:51:00Z");
        let decision =
            BackoffPolicy::decide(&c, None, 1, OutcomeClass::Retryable, Some(last), now).unwrap();
        assert_eq!(
            decision,
            RetryDecision::Retry {
                next_attempt_time: utc("2024-06-13T09:00:00Z")
            }
        );
    }

    #[test]
    fn test_exhausted_at_max_attempts() {
        let c = campaign();
        let now = utc("2024-06-12T10:00:00Z");
        let decision =
            BackoffPolicy::decide(&c, None, 3, OutcomeClass::Retryable, Some(now), now).unwrap();
        assert_eq!(decision, RetryDecision::Exhausted);
    }

    #[test]
    fn test_permanent_failure_short_circuits() {
        let c = campaign();
        let now = utc("2024-06-12T10:00:00Z");
        // 即便还有重试预算，永久失败也直接终止
        let decision =
            BackoffPolicy::decide(&c, None, 1, OutcomeClass::Permanent, Some(now), now).unwrap();
        assert_eq!(decision, RetryDecision::Exhausted);
    }
}
