use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use dialer_core::models::{
    CallAttempt, CallErrorKind, CallStatus, Campaign, CampaignStatus, CounterDelta, Lead,
    LeadClaim, LeadStatus, LeadStatusCounts,
};
use dialer_core::traits::{CallAttemptRepository, CampaignRepository, LeadRepository};
use dialer_core::{DialerError, DialerResult};

/// 内存活动仓储
///
/// 引擎的默认存储实现，所有条件更新都在同一把锁内完成，
/// 与数据库实现的原子性语义一致。
pub struct MemoryCampaignRepository {
    campaigns: Arc<Mutex<HashMap<i64, Campaign>>>,
    next_id: AtomicI64,
}

impl MemoryCampaignRepository {
    pub fn new() -> Self {
        Self {
            campaigns: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryCampaignRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CampaignRepository for MemoryCampaignRepository {
    async fn create(&self, campaign: &Campaign) -> DialerResult<Campaign> {
        let mut campaigns = self.campaigns.lock().await;
        let mut created = campaign.clone();
        created.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        campaigns.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> DialerResult<Option<Campaign>> {
        Ok(self.campaigns.lock().await.get(&id).cloned())
    }

    async fn update(&self, campaign: &Campaign) -> DialerResult<()> {
        let mut campaigns = self.campaigns.lock().await;
        match campaigns.get_mut(&campaign.id) {
            Some(existing) => {
                *existing = campaign.clone();
                Ok(())
            }
            None => Err(DialerError::CampaignNotFound { id: campaign.id }),
        }
    }

    async fn get_active_campaigns(&self) -> DialerResult<Vec<Campaign>> {
        let campaigns = self.campaigns.lock().await;
        let mut active: Vec<Campaign> = campaigns
            .values()
            .filter(|c| c.is_active())
            .cloned()
            .collect();
        active.sort_by_key(|c| c.id);
        Ok(active)
    }

    async fn update_status(&self, id: i64, status: CampaignStatus) -> DialerResult<()> {
        let mut campaigns = self.campaigns.lock().await;
        let campaign = campaigns
            .get_mut(&id)
            .ok_or(DialerError::CampaignNotFound { id })?;
        if !campaign.status.can_transition_to(status) {
            return Err(DialerError::InvalidStateTransition {
                entity: "campaign",
                id,
                from: format!("{:?}", campaign.status),
                to: format!("{:?}", status),
            });
        }
        campaign.status = status;
        campaign.updated_at = Utc::now();
        Ok(())
    }

    async fn apply_counter_delta(&self, id: i64, delta: CounterDelta) -> DialerResult<()> {
        let mut campaigns = self.campaigns.lock().await;
        let campaign = campaigns
            .get_mut(&id)
            .ok_or(DialerError::CampaignNotFound { id })?;
        campaign.total_leads += delta.total_leads;
        campaign.completed_calls += delta.completed_calls;
        campaign.successful_calls += delta.successful_calls;
        campaign.failed_calls += delta.failed_calls;
        campaign.updated_at = Utc::now();
        Ok(())
    }
}

/// 内存线索仓储
///
/// `claim` 在锁内完成条件检查和状态写入，多个调度方并发认领
/// 同一线索时只有一个会拿到快照。
pub struct MemoryLeadRepository {
    leads: Arc<Mutex<HashMap<i64, Lead>>>,
    next_id: AtomicI64,
}

impl MemoryLeadRepository {
    pub fn new() -> Self {
        Self {
            leads: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryLeadRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeadRepository for MemoryLeadRepository {
    async fn create(&self, lead: &Lead) -> DialerResult<Lead> {
        let mut leads = self.leads.lock().await;
        let mut created = lead.clone();
        created.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        leads.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> DialerResult<Option<Lead>> {
        Ok(self.leads.lock().await.get(&id).cloned())
    }

    async fn update(&self, lead: &Lead) -> DialerResult<()> {
        let mut leads = self.leads.lock().await;
        match leads.get_mut(&lead.id) {
            Some(existing) => {
                *existing = lead.clone();
                Ok(())
            }
            None => Err(DialerError::LeadNotFound { id: lead.id }),
        }
    }

    async fn get_due_leads(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DialerResult<Vec<Lead>> {
        let leads = self.leads.lock().await;
        let mut due: Vec<Lead> = leads
            .values()
            .filter(|l| l.campaign_id == Some(campaign_id) && l.is_due(now))
            .cloned()
            .collect();

        // priority 降序、分值降序、从未拨打的优先、拨打时间久远的优先
        due.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.clamped_score().cmp(&a.clamped_score()))
                .then(match (a.last_attempt_time, b.last_attempt_time) {
                    (None, None) => std::cmp::Ordering::Equal,
                    (None, Some(_)) => std::cmp::Ordering::Less,
                    (Some(_), None) => std::cmp::Ordering::Greater,
                    (Some(x), Some(y)) => x.cmp(&y),
                })
                .then(a.id.cmp(&b.id))
        });
        due.truncate(limit);
        Ok(due)
    }

    async fn claim(&self, lead_id: i64, now: DateTime<Utc>) -> DialerResult<Option<LeadClaim>> {
        let mut leads = self.leads.lock().await;
        let lead = leads
            .get_mut(&lead_id)
            .ok_or(DialerError::LeadNotFound { id: lead_id })?;

        if !lead.status.is_claimable() || lead.do_not_call {
            return Ok(None);
        }

        let claim = LeadClaim {
            lead_id,
            prior_status: lead.status,
            prior_next_attempt_time: lead.next_attempt_time,
            prior_last_attempt_time: lead.last_attempt_time,
            claimed_at: now,
        };

        lead.status = LeadStatus::InProgress;
        lead.last_attempt_time = Some(now);
        lead.updated_at = now;

        Ok(Some(claim))
    }

    async fn release(&self, claim: &LeadClaim) -> DialerResult<()> {
        let mut leads = self.leads.lock().await;
        let lead = leads
            .get_mut(&claim.lead_id)
            .ok_or(DialerError::LeadNotFound { id: claim.lead_id })?;

        // 只回滚仍处于认领态的线索，拉黑等后续变更不被覆盖
        if lead.status != LeadStatus::InProgress {
            return Ok(());
        }

        lead.status = claim.prior_status;
        lead.next_attempt_time = claim.prior_next_attempt_time;
        lead.last_attempt_time = claim.prior_last_attempt_time;
        lead.updated_at = Utc::now();
        Ok(())
    }

    async fn postpone(
        &self,
        lead_id: i64,
        next_attempt_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DialerResult<()> {
        let mut leads = self.leads.lock().await;
        let lead = leads
            .get_mut(&lead_id)
            .ok_or(DialerError::LeadNotFound { id: lead_id })?;

        // 与认领相同的前置条件，避免覆盖并发发生的拉黑或认领
        if !lead.status.is_claimable() || lead.do_not_call {
            return Ok(());
        }

        lead.next_attempt_time = Some(next_attempt_time);
        lead.updated_at = now;
        Ok(())
    }

    async fn blacklist(&self, lead_id: i64, reason: &str) -> DialerResult<()> {
        let mut leads = self.leads.lock().await;
        let lead = leads
            .get_mut(&lead_id)
            .ok_or(DialerError::LeadNotFound { id: lead_id })?;
        lead.status = LeadStatus::Blacklisted;
        lead.blacklist_reason = Some(reason.to_string());
        lead.next_attempt_time = None;
        lead.updated_at = Utc::now();
        Ok(())
    }

    async fn count_by_campaign(&self, campaign_id: i64) -> DialerResult<LeadStatusCounts> {
        let leads = self.leads.lock().await;
        let mut counts = LeadStatusCounts::default();
        for lead in leads.values() {
            if lead.campaign_id != Some(campaign_id) {
                continue;
            }
            match lead.status {
                LeadStatus::Pending => counts.pending += 1,
                LeadStatus::InProgress => counts.in_progress += 1,
                LeadStatus::Completed => counts.completed += 1,
                LeadStatus::Failed => counts.failed += 1,
                LeadStatus::Scheduled => counts.scheduled += 1,
                LeadStatus::Blacklisted => counts.blacklisted += 1,
            }
        }
        Ok(counts)
    }

    async fn get_by_campaign(&self, campaign_id: i64) -> DialerResult<Vec<Lead>> {
        let leads = self.leads.lock().await;
        let mut result: Vec<Lead> = leads
            .values()
            .filter(|l| l.campaign_id == Some(campaign_id))
            .cloned()
            .collect();
        result.sort_by_key(|l| l.id);
        Ok(result)
    }

    async fn get_in_progress(&self, campaign_id: i64) -> DialerResult<Vec<Lead>> {
        let leads = self.leads.lock().await;
        let mut result: Vec<Lead> = leads
            .values()
            .filter(|l| {
                l.campaign_id == Some(campaign_id) && l.status == LeadStatus::InProgress
            })
            .cloned()
            .collect();
        result.sort_by_key(|l| l.id);
        Ok(result)
    }
}

/// 内存呼叫记录仓储
///
/// 创建时强制每个线索同一时刻只有一条未终态记录，
/// 终态写入后记录冻结。
pub struct MemoryCallAttemptRepository {
    attempts: Arc<Mutex<HashMap<i64, CallAttempt>>>,
    next_id: AtomicI64,
}

impl MemoryCallAttemptRepository {
    pub fn new() -> Self {
        Self {
            attempts: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryCallAttemptRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CallAttemptRepository for MemoryCallAttemptRepository {
    async fn create(&self, attempt: &CallAttempt) -> DialerResult<CallAttempt> {
        let mut attempts = self.attempts.lock().await;

        let has_open = attempts
            .values()
            .any(|a| a.lead_id == attempt.lead_id && !a.is_terminal());
        if has_open {
            return Err(DialerError::OpenAttemptExists {
                lead_id: attempt.lead_id,
            });
        }

        let mut created = attempt.clone();
        created.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        attempts.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> DialerResult<Option<CallAttempt>> {
        Ok(self.attempts.lock().await.get(&id).cloned())
    }

    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> DialerResult<Option<CallAttempt>> {
        let attempts = self.attempts.lock().await;
        Ok(attempts
            .values()
            .find(|a| a.correlation_id == correlation_id)
            .cloned())
    }

    async fn get_by_lead_id(&self, lead_id: i64) -> DialerResult<Vec<CallAttempt>> {
        let attempts = self.attempts.lock().await;
        let mut result: Vec<CallAttempt> = attempts
            .values()
            .filter(|a| a.lead_id == lead_id)
            .cloned()
            .collect();
        result.sort_by_key(|a| a.id);
        Ok(result)
    }

    async fn get_open_attempts(&self) -> DialerResult<Vec<CallAttempt>> {
        let attempts = self.attempts.lock().await;
        let mut result: Vec<CallAttempt> = attempts
            .values()
            .filter(|a| !a.is_terminal())
            .cloned()
            .collect();
        result.sort_by_key(|a| a.id);
        Ok(result)
    }

    async fn update_status(&self, id: i64, status: CallStatus) -> DialerResult<()> {
        let mut attempts = self.attempts.lock().await;
        let attempt = attempts
            .get_mut(&id)
            .ok_or(DialerError::CallAttemptNotFound { id })?;

        if attempt.is_terminal() {
            return Err(DialerError::AttemptFinalized { id });
        }
        if !attempt.status.can_transition_to(status) {
            return Err(DialerError::InvalidStateTransition {
                entity: "call_attempt",
                id,
                from: format!("{:?}", attempt.status),
                to: format!("{:?}", status),
            });
        }
        attempt.status = status;
        Ok(())
    }

    async fn finalize(
        &self,
        id: i64,
        status: CallStatus,
        duration_seconds: Option<i32>,
        error_kind: Option<CallErrorKind>,
        metadata: serde_json::Value,
        finished_at: DateTime<Utc>,
    ) -> DialerResult<()> {
        let mut attempts = self.attempts.lock().await;
        let attempt = attempts
            .get_mut(&id)
            .ok_or(DialerError::CallAttemptNotFound { id })?;

        if attempt.is_terminal() {
            return Err(DialerError::AttemptFinalized { id });
        }
        if !status.is_terminal() || !attempt.status.can_transition_to(status) {
            return Err(DialerError::InvalidStateTransition {
                entity: "call_attempt",
                id,
                from: format!("{:?}", attempt.status),
                to: format!("{:?}", status),
            });
        }

        attempt.status = status;
        attempt.duration_seconds = duration_seconds;
        attempt.error_kind = error_kind;
        attempt.call_data = metadata;
        attempt.finished_at = Some(finished_at);
        Ok(())
    }
}
