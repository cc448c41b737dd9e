use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use dialer_core::models::Campaign;
use dialer_core::DialerResult;

struct LimiterState {
    /// 全局在途呼叫数
    in_flight: usize,
    /// 各活动当日已消耗的呼叫预算，按活动本地自然日记账
    daily: HashMap<i64, (NaiveDate, i64)>,
}

/// 速率与并发限流器
///
/// 两层约束：全局并发呼叫上限和活动级每日呼叫预算。
/// 预算在活动本地时区的午夜惰性重置，不需要定时任务。
/// 正常完成的呼叫只归还并发槽位，不归还当日预算；派发前的
/// 基础设施故障两者都归还。
pub struct RateLimiter {
    max_concurrent_calls: usize,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(max_concurrent_calls: usize) -> Self {
        Self {
            max_concurrent_calls,
            state: Mutex::new(LimiterState {
                in_flight: 0,
                daily: HashMap::new(),
            }),
        }
    }

    /// 申请放行至多 `requested` 个呼叫，返回实际放行数量
    ///
    /// 在同一把锁内完成预算判断和扣减，并发调用不会超卖。
    pub async fn admit(
        &self,
        campaign: &Campaign,
        requested: usize,
        now: DateTime<Utc>,
    ) -> DialerResult<usize> {
        let today = now.with_timezone(&campaign.tz()?).date_naive();
        let mut state = self.state.lock().await;

        let used = match state.daily.get(&campaign.id) {
            Some((date, used)) if *date == today => *used,
            _ => 0,
        };
        let daily_remaining = (campaign.calls_per_day as i64 - used).max(0) as usize;
        let concurrency_remaining = self.max_concurrent_calls.saturating_sub(state.in_flight);
        let admitted = requested.min(daily_remaining).min(concurrency_remaining);

        state.daily.insert(campaign.id, (today, used + admitted as i64));
        state.in_flight += admitted;

        if admitted < requested {
            debug!(
                "活动 {} 请求放行 {} 个呼叫，实际放行 {}（当日余量 {}，并发余量 {}）",
                campaign.id, requested, admitted, daily_remaining, concurrency_remaining
            );
        }

        Ok(admitted)
    }

    /// 归还未实际发起的放行额度
    ///
    /// 用于派发前的失败路径：并发槽位和当日预算一并归还，
    /// 基础设施故障不吞噬活动的呼叫额度。
    pub async fn release_admission(
        &self,
        campaign: &Campaign,
        count: usize,
        now: DateTime<Utc>,
    ) -> DialerResult<()> {
        let today = now.with_timezone(&campaign.tz()?).date_naive();
        let mut state = self.state.lock().await;

        state.in_flight = state.in_flight.saturating_sub(count);
        if let Some((date, used)) = state.daily.get_mut(&campaign.id) {
            if *date == today {
                *used = (*used - count as i64).max(0);
            }
        }

        Ok(())
    }

    /// 呼叫到达终态，释放并发槽位（当日预算不归还）
    pub async fn complete_call(&self) {
        let mut state = self.state.lock().await;
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// 活动当日剩余呼叫预算
    pub async fn remaining_daily_budget(
        &self,
        campaign: &Campaign,
        now: DateTime<Utc>,
    ) -> DialerResult<usize> {
        let today = now.with_timezone(&campaign.tz()?).date_naive();
        let state = self.state.lock().await;

        let used = match state.daily.get(&campaign.id) {
            Some((date, used)) if *date == today => *used,
            _ => 0,
        };
        Ok((campaign.calls_per_day as i64 - used).max(0) as usize)
    }

    /// 当前全局在途呼叫数
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight
    }

    /// 全局并发余量，供调度器在选取前确定批次上限
    pub async fn concurrency_headroom(&self) -> usize {
        let state = self.state.lock().await;
        self.max_concurrent_calls.saturating_sub(state.in_flight)
    }
}
