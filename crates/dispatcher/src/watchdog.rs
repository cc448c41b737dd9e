use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use dialer_core::models::{CallErrorKind, CallEvent, CallStatus, LeadStatus};
use dialer_core::traits::{
    CallAttemptRepository, CallEventQueue, CampaignRepository, LeadRepository,
};
use dialer_core::DialerResult;

use crate::rate_limiter::RateLimiter;

/// 调度看门狗
///
/// 巡检两类滞留状态并强制推进：
/// 1. 已认领但始终没有产生呼叫记录的线索（工作协程在发起呼叫前
///    崩溃或指令滞留队列），超过认领宽限期后放回待拨状态，
///    并归还调度时占用的放行额度；
/// 2. 超出通话时长上限加宽限期仍未终态的呼叫记录（供应商失联），
///    合成取消事件走正常的结果处理路径，重试语义保持一致。
pub struct Watchdog {
    campaign_repo: Arc<dyn CampaignRepository>,
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    event_queue: Arc<dyn CallEventQueue>,
    limiter: Arc<RateLimiter>,
    claim_grace: chrono::Duration,
    provider_grace: chrono::Duration,
    check_interval: Duration,
}

impl Watchdog {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        lead_repo: Arc<dyn LeadRepository>,
        attempt_repo: Arc<dyn CallAttemptRepository>,
        event_queue: Arc<dyn CallEventQueue>,
        limiter: Arc<RateLimiter>,
        claim_grace_seconds: i64,
        provider_grace_seconds: i64,
        check_interval: Duration,
    ) -> Self {
        Self {
            campaign_repo,
            lead_repo,
            attempt_repo,
            event_queue,
            limiter,
            claim_grace: chrono::Duration::seconds(claim_grace_seconds),
            provider_grace: chrono::Duration::seconds(provider_grace_seconds),
            check_interval,
        }
    }

    /// 巡检主循环
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("看门狗启动，巡检间隔 {:?}", self.check_interval);
        let mut ticker = tokio::time::interval(self.check_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        error!("看门狗巡检出错: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("看门狗收到关停信号，退出");
                    break;
                }
            }
        }
    }

    /// 执行一轮巡检
    pub async fn run_once(&self, now: DateTime<Utc>) -> DialerResult<()> {
        self.reclaim_orphaned_leads(now).await?;
        self.cancel_stale_attempts(now).await?;
        Ok(())
    }

    /// 回收认领后没有呼叫记录的滞留线索
    async fn reclaim_orphaned_leads(&self, now: DateTime<Utc>) -> DialerResult<()> {
        for campaign in self.campaign_repo.get_active_campaigns().await? {
            let in_progress = self.lead_repo.get_in_progress(campaign.id).await?;
            for mut lead in in_progress {
                let claimed_at = match lead.last_attempt_time {
                    Some(t) => t,
                    None => lead.updated_at,
                };
                if now - claimed_at <= self.claim_grace {
                    continue;
                }

                let attempts = self.attempt_repo.get_by_lead_id(lead.id).await?;
                if attempts.iter().any(|a| !a.is_terminal()) {
                    // 有在途呼叫记录，交给滞留记录巡检处理
                    continue;
                }

                warn!(
                    "线索 {} 认领超过 {} 秒仍无呼叫记录，放回待拨",
                    lead.id,
                    self.claim_grace.num_seconds()
                );
                lead.status = LeadStatus::Pending;
                lead.next_attempt_time = None;
                lead.updated_at = now;
                self.lead_repo.update(&lead).await?;
                // 呼叫从未发起，调度时占用的并发槽位和当日预算一并归还
                self.limiter.release_admission(&campaign, 1, now).await?;
            }
        }
        Ok(())
    }

    /// 为超时未终态的呼叫记录合成取消事件
    async fn cancel_stale_attempts(&self, now: DateTime<Utc>) -> DialerResult<()> {
        for attempt in self.attempt_repo.get_open_attempts().await? {
            let campaign = match self.campaign_repo.get_by_id(attempt.campaign_id).await? {
                Some(c) => c,
                None => {
                    warn!(
                        "呼叫记录 {} 所属活动 {} 不存在，跳过巡检",
                        attempt.id, attempt.campaign_id
                    );
                    continue;
                }
            };

            let deadline = attempt.started_at
                + chrono::Duration::seconds(campaign.call_duration_limit_seconds as i64)
                + self.provider_grace;
            if now <= deadline {
                continue;
            }

            warn!(
                "呼叫记录 {} 超过时长上限加宽限期仍未终态，合成取消事件",
                attempt.id
            );
            let mut event = CallEvent::new(attempt.correlation_id.clone(), CallStatus::Cancelled);
            event.error_kind = Some(CallErrorKind::Transient);
            event.metadata = serde_json::json!({ "cancelled_by": "watchdog" });
            event.timestamp = now;
            self.event_queue.publish(event).await?;
        }
        Ok(())
    }
}
