use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use dialer_core::models::{Campaign, CampaignStatus, DispatchCommand};
use dialer_core::traits::{CampaignRepository, DispatchQueue, LeadRepository};
use dialer_core::DialerResult;

use crate::calling_window::{CallingWindowGuard, WindowDecision};
use crate::lead_selector::{ClaimedLead, LeadSelector};
use crate::rate_limiter::RateLimiter;

/// 活动调度器
///
/// 每个调度周期扫描所有进行中的活动，为每个活动独立地完成
/// 完成判定、窗口预检、预算申请、线索认领与指令派发。
/// 单个活动出错不影响同一轮的其他活动。
pub struct CampaignScheduler {
    campaign_repo: Arc<dyn CampaignRepository>,
    lead_repo: Arc<dyn LeadRepository>,
    selector: LeadSelector,
    limiter: Arc<RateLimiter>,
    dispatch_queue: Arc<dyn DispatchQueue>,
    tick_interval: Duration,
    max_batch_size: usize,
}

impl CampaignScheduler {
    pub fn new(
        campaign_repo: Arc<dyn CampaignRepository>,
        lead_repo: Arc<dyn LeadRepository>,
        limiter: Arc<RateLimiter>,
        dispatch_queue: Arc<dyn DispatchQueue>,
        tick_interval: Duration,
        max_batch_size: usize,
    ) -> Self {
        let selector = LeadSelector::new(lead_repo.clone());
        Self {
            campaign_repo,
            lead_repo,
            selector,
            limiter,
            dispatch_queue,
            tick_interval,
            max_batch_size,
        }
    }

    /// 调度主循环，收到关停信号后在当前周期边界退出
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("活动调度器启动，调度间隔 {:?}", self.tick_interval);
        let mut ticker = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once(Utc::now()).await {
                        error!("调度周期执行出错: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("活动调度器收到关停信号，退出");
                    break;
                }
            }
        }
    }

    /// 执行一个调度周期
    pub async fn run_once(&self, now: DateTime<Utc>) -> DialerResult<()> {
        let active_campaigns = self.campaign_repo.get_active_campaigns().await?;
        debug!("本轮调度扫描到 {} 个进行中的活动", active_campaigns.len());

        for campaign in active_campaigns {
            if let Err(e) = self.schedule_campaign(&campaign, now).await {
                error!("活动 {} 调度出错: {}", campaign.id, e);
            }
        }

        Ok(())
    }

    async fn schedule_campaign(&self, campaign: &Campaign, now: DateTime<Utc>) -> DialerResult<()> {
        if self.try_complete_campaign(campaign).await? {
            return Ok(());
        }

        if let Err(e) = campaign.validate_calling_window() {
            warn!("活动 {} 的拨打时段配置无效，跳过调度: {}", campaign.id, e);
            return Ok(());
        }

        // 活动时区的窗口预检，省去逐线索的无谓认领
        if let WindowDecision::Closed { next_open } =
            CallingWindowGuard::evaluate(campaign, None, now)?
        {
            debug!(
                "活动 {} 当前不在拨打时段内，下次开窗 {}",
                campaign.id, next_open
            );
            return Ok(());
        }

        let budget = self.limiter.remaining_daily_budget(campaign, now).await?;
        if budget == 0 {
            debug!("活动 {} 当日呼叫预算已用尽", campaign.id);
            return Ok(());
        }

        // 并发已满时不做无谓的认领再回滚
        let headroom = self.limiter.concurrency_headroom().await;
        if headroom == 0 {
            debug!("全局并发已满，活动 {} 本轮跳过选取", campaign.id);
            return Ok(());
        }

        let batch_size = budget.min(headroom).min(self.max_batch_size);
        let claimed = self.selector.select_batch(campaign, batch_size, now).await?;
        if claimed.is_empty() {
            return Ok(());
        }

        let admitted = self.limiter.admit(campaign, claimed.len(), now).await?;

        // 限流拒绝的部分按快照放回，不计拨打次数
        for rejected in &claimed[admitted..] {
            if let Err(e) = self.selector.release(&rejected.claim).await {
                error!("线索 {} 释放失败: {}", rejected.claim.lead_id, e);
            }
        }

        let mut dispatched = 0usize;
        for entry in &claimed[..admitted] {
            match self.dispatch_lead(campaign, entry).await {
                Ok(()) => dispatched += 1,
                Err(e) => {
                    error!("线索 {} 派发失败: {}", entry.lead.id, e);
                    if let Err(e) = self.selector.release(&entry.claim).await {
                        error!("线索 {} 释放失败: {}", entry.claim.lead_id, e);
                    }
                    if let Err(e) = self.limiter.release_admission(campaign, 1, now).await {
                        error!("活动 {} 归还放行额度失败: {}", campaign.id, e);
                    }
                }
            }
        }

        if dispatched > 0 {
            info!("活动 {} 本轮派发了 {} 个呼叫", campaign.id, dispatched);
        }

        Ok(())
    }

    /// 所有线索均已终态时把活动切到已完成
    async fn try_complete_campaign(&self, campaign: &Campaign) -> DialerResult<bool> {
        let counts = self.lead_repo.count_by_campaign(campaign.id).await?;
        if counts.total() > 0 && counts.outstanding() == 0 {
            self.campaign_repo
                .update_status(campaign.id, CampaignStatus::Completed)
                .await?;
            info!("活动 {} 的全部线索已到达终态，活动标记为已完成", campaign.id);
            return Ok(true);
        }
        Ok(false)
    }

    async fn dispatch_lead(&self, campaign: &Campaign, entry: &ClaimedLead) -> DialerResult<()> {
        let command = DispatchCommand {
            claim: entry.claim.clone(),
            campaign_id: campaign.id,
            lead_id: entry.lead.id,
            phone: entry.lead.phone.clone(),
            prompt_ref: campaign.prompt_ref.clone(),
            preferred_language: entry.lead.preferred_language.clone(),
            max_duration_seconds: campaign.call_duration_limit_seconds,
            attempt_number: entry.lead.attempts_made + 1,
        };
        self.dispatch_queue.publish(command).await
    }
}
