use chrono::{DateTime, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::errors::{DialerError, DialerResult};

/// 外呼活动定义
///
/// 表示一次配置完整的外呼营销活动，包含吞吐配置、拨打时段配置
/// 以及由结果处理器维护的滚动统计计数。
///
/// # 字段说明
///
/// - `calls_per_day`: 每日呼出上限，按活动本地时区的自然日重置
/// - `max_attempts_per_lead`: 单个线索的最大拨打次数
/// - `retry_delay_minutes`: 非成功结果后的固定重试延迟（分钟）
/// - `call_duration_limit_seconds`: 单次通话时长上限（秒）
/// - `calling_hours_start/end`: 允许拨打的本地时间区间 [start, end)
/// - `working_days`: 允许拨打的星期集合
/// - 统计计数只由结果处理器通过仓储的原子增量操作修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: i64,
    pub tenant_id: i64,
    pub name: String,
    pub status: CampaignStatus,
    pub prompt_ref: String,
    pub calls_per_day: i32,
    pub max_attempts_per_lead: i32,
    pub retry_delay_minutes: i32,
    pub call_duration_limit_seconds: i32,
    pub calling_hours_start: NaiveTime,
    pub calling_hours_end: NaiveTime,
    pub time_zone: String,
    pub working_days: Vec<Weekday>,
    pub total_leads: i64,
    pub completed_calls: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 活动生命周期状态
///
/// - `Draft`: 草稿，未进入调度
/// - `Active`: 进行中，参与每轮调度
/// - `Paused`: 暂停，不再发起新呼叫，在途呼叫允许完成
/// - `Completed`: 已完成，由引擎在所有线索终态后自动切换
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CampaignStatus {
    #[serde(rename = "DRAFT")]
    Draft,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "PAUSED")]
    Paused,
    #[serde(rename = "COMPLETED")]
    Completed,
}

impl CampaignStatus {
    /// 状态转换表
    ///
    /// `Completed` 为终态；`Active -> Completed` 只由引擎触发。
    pub fn can_transition_to(&self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, to),
            (Draft, Active) | (Active, Paused) | (Paused, Active) | (Active, Completed)
        ) || *self == to
    }
}

/// 活动计数器的原子增量
///
/// 计数按线索粒度统计：一个线索到达终态记一次 `completed_calls`，
/// 成功记入 `successful_calls`，失败记入 `failed_calls`。
/// 所有分量必须非负，保证计数单调不减。
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterDelta {
    pub total_leads: i64,
    pub completed_calls: i64,
    pub successful_calls: i64,
    pub failed_calls: i64,
}

impl Campaign {
    pub fn is_active(&self) -> bool {
        matches!(self.status, CampaignStatus::Active)
    }

    /// 解析活动时区
    pub fn tz(&self) -> DialerResult<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| DialerError::InvalidTimeZone {
                name: self.time_zone.clone(),
            })
    }

    /// 校验拨打时段配置
    ///
    /// 只支持同一自然日内的时段，start 必须严格早于 end。
    pub fn validate_calling_window(&self) -> DialerResult<()> {
        if self.calling_hours_start >= self.calling_hours_end {
            return Err(DialerError::InvalidCallingWindow {
                message: format!(
                    "calling_hours_start {} 必须早于 calling_hours_end {}",
                    self.calling_hours_start, self.calling_hours_end
                ),
            });
        }
        if self.working_days.is_empty() {
            return Err(DialerError::InvalidCallingWindow {
                message: "working_days 不能为空".to_string(),
            });
        }
        self.tz()?;
        Ok(())
    }
}
