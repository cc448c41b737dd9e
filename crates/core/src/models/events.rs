use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::call_attempt::{CallErrorKind, CallStatus};
use super::lead::LeadStatus;

/// 呼叫执行器回调事件
///
/// 事件可能乱序或重复到达，结果处理器依赖呼叫记录的
/// 终态单调性做幂等处理。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallEvent {
    pub correlation_id: String,
    pub status: CallStatus,
    pub duration_seconds: Option<i32>,
    pub error_kind: Option<CallErrorKind>,
    pub metadata: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl CallEvent {
    pub fn new(correlation_id: impl Into<String>, status: CallStatus) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            status,
            duration_seconds: None,
            error_kind: None,
            metadata: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }
}

/// 线索认领快照
///
/// 认领是原子条件更新：`Pending|Scheduled -> InProgress`。
/// 快照记录认领前的字段，用于拒绝/失败路径把线索恢复原状。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadClaim {
    pub lead_id: i64,
    pub prior_status: LeadStatus,
    pub prior_next_attempt_time: Option<DateTime<Utc>>,
    pub prior_last_attempt_time: Option<DateTime<Utc>>,
    pub claimed_at: DateTime<Utc>,
}

/// 调度器下发给工作池的拨号指令
///
/// 携带认领快照，使任意一个工作协程都能在执行器故障时
/// 独立完成释放，不依赖共享状态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchCommand {
    pub claim: LeadClaim,
    pub campaign_id: i64,
    pub lead_id: i64,
    pub phone: String,
    pub prompt_ref: String,
    pub preferred_language: Option<String>,
    pub max_duration_seconds: i32,
    pub attempt_number: i32,
}
