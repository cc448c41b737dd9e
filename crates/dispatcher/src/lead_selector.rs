use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use dialer_core::models::{Campaign, Lead, LeadClaim, LeadStatus};
use dialer_core::traits::LeadRepository;
use dialer_core::DialerResult;

use crate::calling_window::{CallingWindowGuard, WindowDecision};

/// 认领成功的线索及其恢复快照
#[derive(Debug, Clone)]
pub struct ClaimedLead {
    pub lead: Lead,
    pub claim: LeadClaim,
}

/// 线索选取器
///
/// 从仓储取出到期线索，逐个过时段守卫并原子认领。
/// 认领竞争失败静默跳过，窗口关闭的线索回写下次开窗时间，
/// 避免每轮调度反复捞出同一批拨不了的线索。
pub struct LeadSelector {
    lead_repo: Arc<dyn LeadRepository>,
}

impl LeadSelector {
    pub fn new(lead_repo: Arc<dyn LeadRepository>) -> Self {
        Self { lead_repo }
    }

    /// 选取并认领至多 `limit` 个可拨线索
    pub async fn select_batch(
        &self,
        campaign: &Campaign,
        limit: usize,
        now: DateTime<Utc>,
    ) -> DialerResult<Vec<ClaimedLead>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        // 多取一倍候选，部分线索会因时区窗口或认领竞争被淘汰
        let candidates = self
            .lead_repo
            .get_due_leads(campaign.id, now, limit * 2)
            .await?;

        let mut claimed = Vec::new();
        for lead in candidates {
            if claimed.len() >= limit {
                break;
            }

            match CallingWindowGuard::evaluate(campaign, lead.time_zone.as_deref(), now)? {
                WindowDecision::Closed { next_open } => {
                    debug!(
                        "线索 {} 的拨打窗口关闭，推迟到 {}",
                        lead.id, next_open
                    );
                    self.lead_repo.postpone(lead.id, next_open, now).await?;
                    continue;
                }
                WindowDecision::Callable => {}
            }

            match self.lead_repo.claim(lead.id, now).await? {
                Some(claim) => {
                    let mut lead = lead;
                    lead.status = LeadStatus::InProgress;
                    lead.last_attempt_time = Some(now);
                    claimed.push(ClaimedLead { lead, claim });
                }
                None => {
                    // 认领竞争失败，线索已被别处处理
                    debug!("线索 {} 认领失败，跳过", lead.id);
                }
            }
        }

        Ok(claimed)
    }

    /// 按快照恢复被拒绝线索的认领前状态
    pub async fn release(&self, claim: &LeadClaim) -> DialerResult<()> {
        self.lead_repo.release(claim).await
    }
}
