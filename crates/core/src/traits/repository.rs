use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::DialerResult;
use crate::models::{
    Campaign, CampaignStatus, CallAttempt, CallErrorKind, CallStatus, CounterDelta, Lead,
    LeadClaim, LeadStatusCounts,
};

/// 活动仓储接口
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// 创建活动，返回带ID的完整实体
    async fn create(&self, campaign: &Campaign) -> DialerResult<Campaign>;

    /// 根据ID获取活动
    async fn get_by_id(&self, id: i64) -> DialerResult<Option<Campaign>>;

    /// 更新活动配置字段
    async fn update(&self, campaign: &Campaign) -> DialerResult<()>;

    /// 获取所有进行中的活动
    async fn get_active_campaigns(&self) -> DialerResult<Vec<Campaign>>;

    /// 更新活动状态，非法转换返回 `InvalidStateTransition`
    async fn update_status(&self, id: i64, status: CampaignStatus) -> DialerResult<()>;

    /// 原子地累加统计计数
    async fn apply_counter_delta(&self, id: i64, delta: CounterDelta) -> DialerResult<()>;
}

/// 线索仓储接口
///
/// `claim` / `release` 是调度正确性的核心：认领必须是原子条件更新，
/// 同一线索并发认领只能有一个成功。
#[async_trait]
pub trait LeadRepository: Send + Sync {
    async fn create(&self, lead: &Lead) -> DialerResult<Lead>;

    async fn get_by_id(&self, id: i64) -> DialerResult<Option<Lead>>;

    async fn update(&self, lead: &Lead) -> DialerResult<()>;

    /// 获取到期可拨的线索，按调度优先序排列
    ///
    /// 排序：priority 降序，lead_score 降序，last_attempt_time 升序
    /// 且从未拨打过的排在最前。结果已排除 DNC、黑名单与未到期线索。
    async fn get_due_leads(
        &self,
        campaign_id: i64,
        now: DateTime<Utc>,
        limit: usize,
    ) -> DialerResult<Vec<Lead>>;

    /// 原子认领：`Pending|Scheduled -> InProgress`
    ///
    /// 成功时写入临时的 `last_attempt_time` 戳并返回认领前快照；
    /// 线索已不在可认领状态时返回 `None`（竞争失败，不是错误）。
    async fn claim(&self, lead_id: i64, now: DateTime<Utc>) -> DialerResult<Option<LeadClaim>>;

    /// 按快照恢复认领前的状态，用于派发被拒绝或执行器失败的回滚
    async fn release(&self, claim: &LeadClaim) -> DialerResult<()>;

    /// 回写下次可拨时间，仅作用于仍可认领的线索
    ///
    /// 读取与回写之间发生的拉黑或认领不被覆盖，此时静默跳过。
    async fn postpone(
        &self,
        lead_id: i64,
        next_attempt_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DialerResult<()>;

    /// 运营拉黑，吸收态
    async fn blacklist(&self, lead_id: i64, reason: &str) -> DialerResult<()>;

    /// 统计活动下各状态的线索数量
    async fn count_by_campaign(&self, campaign_id: i64) -> DialerResult<LeadStatusCounts>;

    async fn get_by_campaign(&self, campaign_id: i64) -> DialerResult<Vec<Lead>>;

    /// 获取活动下所有呼叫在途的线索，供看门狗巡检
    async fn get_in_progress(&self, campaign_id: i64) -> DialerResult<Vec<Lead>>;
}

/// 呼叫记录仓储接口
#[async_trait]
pub trait CallAttemptRepository: Send + Sync {
    /// 创建呼叫记录
    ///
    /// 同一线索同一时刻只允许一条未终态记录，违反时返回
    /// `OpenAttemptExists`。
    async fn create(&self, attempt: &CallAttempt) -> DialerResult<CallAttempt>;

    async fn get_by_id(&self, id: i64) -> DialerResult<Option<CallAttempt>>;

    /// 按执行器关联ID查找记录
    async fn get_by_correlation_id(
        &self,
        correlation_id: &str,
    ) -> DialerResult<Option<CallAttempt>>;

    async fn get_by_lead_id(&self, lead_id: i64) -> DialerResult<Vec<CallAttempt>>;

    /// 获取所有未终态的记录
    async fn get_open_attempts(&self) -> DialerResult<Vec<CallAttempt>>;

    /// 推进非终态状态，非法转换返回 `InvalidStateTransition`
    async fn update_status(&self, id: i64, status: CallStatus) -> DialerResult<()>;

    /// 写入终态并冻结记录
    ///
    /// 已终态的记录再次调用返回 `AttemptFinalized`。
    async fn finalize(
        &self,
        id: i64,
        status: CallStatus,
        duration_seconds: Option<i32>,
        error_kind: Option<CallErrorKind>,
        metadata: serde_json::Value,
        finished_at: DateTime<Utc>,
    ) -> DialerResult<()>;
}
