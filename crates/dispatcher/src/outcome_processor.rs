use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use dialer_core::models::{
    CallEvent, Campaign, CampaignStatus, CounterDelta, Lead, LeadStatus, OutcomeClass,
};
use dialer_core::traits::{
    CallAttemptRepository, CallEventQueue, CampaignRepository, LeadRepository,
};
use dialer_core::{DialerError, DialerResult};

use crate::backoff::{BackoffPolicy, RetryDecision};
use crate::rate_limiter::RateLimiter;

/// 呼叫结果处理器
///
/// 消费执行器上报的呼叫事件，推进呼叫记录状态机，并在终态事件
/// 上驱动线索的下一步：成功完成、安排重试或宣告失败。
///
/// 幂等性依赖呼叫记录的终态单调性：重复或乱序的事件在状态机
/// 校验处被丢弃，不产生二次副作用。
pub struct OutcomeProcessor {
    campaign_repo: Arc<dyn CampaignRepository>,
    lead_repo: Arc<dyn LeadRepository>,
    attempt_repo: Arc<dyn CallAttemptRepository>,
    event_queue: Arc<dyn CallEventQueue>,
    limiter: Arc<RateLimiter>,
    poll_interval: Duration,
}

impl OutcomeProcessor {
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        lead_repo: Arc<dyn LeadRepository>,
        attempt_repo: Arc<dyn CallAttemptRepository>,
        event_queue: Arc<dyn CallEventQueue>,
        limiter: Arc<RateLimiter>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            campaign_repo,
            lead_repo,
            attempt_repo,
            event_queue,
            limiter,
            poll_interval,
        }
    }

    /// 事件消费主循环
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("呼叫结果处理器启动");

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("呼叫结果处理器收到关停信号，退出");
                    break;
                }
                result = self.event_queue.consume() => {
                    match result {
                        Ok(Some(event)) => {
                            if let Err(e) = self.process_event(&event, Utc::now()).await {
                                error!("处理呼叫事件 {} 出错: {}", event.correlation_id, e);
                            }
                        }
                        Ok(None) => {
                            tokio::time::sleep(self.poll_interval).await;
                        }
                        Err(e) => {
                            error!("消费呼叫事件出错: {}", e);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        }
    }

    /// 处理一条呼叫事件
    pub async fn process_event(&self, event: &CallEvent, now: DateTime<Utc>) -> DialerResult<()> {
        debug!(
            "处理呼叫事件: 关联ID {} 状态 {:?}",
            event.correlation_id, event.status
        );

        let attempt = match self
            .attempt_repo
            .get_by_correlation_id(&event.correlation_id)
            .await?
        {
            Some(attempt) => attempt,
            None => {
                warn!("收到未知关联ID {} 的呼叫事件，忽略", event.correlation_id);
                return Ok(());
            }
        };

        if attempt.is_terminal() {
            debug!(
                "呼叫记录 {} 已终态，重复事件 {:?} 被忽略",
                attempt.id, event.status
            );
            return Ok(());
        }

        if !attempt.status.can_transition_to(event.status) {
            warn!(
                "呼叫记录 {} 的状态转换无效: {:?} -> {:?}，忽略",
                attempt.id, attempt.status, event.status
            );
            return Ok(());
        }

        if !event.status.is_terminal() {
            self.attempt_repo
                .update_status(attempt.id, event.status)
                .await?;
            debug!("呼叫记录 {} 状态推进为 {:?}", attempt.id, event.status);
            return Ok(());
        }

        self.attempt_repo
            .finalize(
                attempt.id,
                event.status,
                event.duration_seconds,
                event.error_kind,
                event.metadata.clone(),
                event.timestamp,
            )
            .await?;
        self.limiter.complete_call().await;

        let lead = self
            .lead_repo
            .get_by_id(attempt.lead_id)
            .await?
            .ok_or(DialerError::LeadNotFound { id: attempt.lead_id })?;
        let campaign = self
            .campaign_repo
            .get_by_id(attempt.campaign_id)
            .await?
            .ok_or(DialerError::CampaignNotFound {
                id: attempt.campaign_id,
            })?;

        // 终态事件必有分类
        let outcome = event
            .status
            .classify(event.error_kind)
            .ok_or_else(|| DialerError::Internal("终态事件无法分类".to_string()))?;

        self.settle_lead(&campaign, lead, outcome, event, now).await
    }

    /// 按呼叫结果推进线索状态并维护活动计数
    async fn settle_lead(
        &self,
        campaign: &Campaign,
        mut lead: Lead,
        outcome: OutcomeClass,
        event: &CallEvent,
        now: DateTime<Utc>,
    ) -> DialerResult<()> {
        let attempts_made = lead.attempts_made + 1;
        let mut delta = CounterDelta::default();

        if lead.status == LeadStatus::Blacklisted {
            // 呼叫在途时被运营拉黑：黑名单是吸收态，只记账不改状态
            info!("线索 {} 呼叫期间被拉黑，保留黑名单状态", lead.id);
            lead.attempts_made = attempts_made;
            lead.last_attempt_time = Some(now);
            lead.updated_at = now;
            return self.lead_repo.update(&lead).await;
        }

        match outcome {
            OutcomeClass::Success => {
                lead.status = LeadStatus::Completed;
                lead.next_attempt_time = None;
                delta.completed_calls = 1;
                delta.successful_calls = 1;
                info!(
                    "线索 {} 呼叫成功，通话 {} 秒",
                    lead.id,
                    event.duration_seconds.unwrap_or(0)
                );
            }
            OutcomeClass::Retryable | OutcomeClass::Permanent => {
                let decision = BackoffPolicy::decide(
                    campaign,
                    lead.time_zone.as_deref(),
                    attempts_made,
                    outcome,
                    lead.last_attempt_time,
                    now,
                )?;
                match decision {
                    RetryDecision::Retry { next_attempt_time } => {
                        lead.status = LeadStatus::Scheduled;
                        lead.next_attempt_time = Some(next_attempt_time);
                        info!(
                            "线索 {} 第 {} 次拨打未成功（{:?}），重试安排在 {}",
                            lead.id, attempts_made, event.status, next_attempt_time
                        );
                    }
                    RetryDecision::Exhausted => {
                        lead.status = LeadStatus::Failed;
                        lead.next_attempt_time = None;
                        delta.completed_calls = 1;
                        delta.failed_calls = 1;
                        info!(
                            "线索 {} 在 {} 次拨打后宣告失败（{:?}）",
                            lead.id, attempts_made, event.status
                        );
                    }
                }
            }
        }

        lead.attempts_made = attempts_made;
        lead.last_attempt_time = Some(now);
        lead.updated_at = now;
        let lead_terminal = lead.is_terminal();
        self.lead_repo.update(&lead).await?;

        if delta.completed_calls > 0 {
            self.campaign_repo
                .apply_counter_delta(campaign.id, delta)
                .await?;
        }

        // 最后一个在途线索落地时把活动切到已完成
        if lead_terminal && campaign.status == CampaignStatus::Active {
            let counts = self.lead_repo.count_by_campaign(campaign.id).await?;
            if counts.total() > 0 && counts.outstanding() == 0 {
                self.campaign_repo
                    .update_status(campaign.id, CampaignStatus::Completed)
                    .await?;
                info!("活动 {} 的全部线索已到达终态，活动标记为已完成", campaign.id);
            }
        }

        Ok(())
    }
}
