use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单次呼叫记录
///
/// 每一次实际拨号对应一条记录，重试永远新建记录而不是原地修改，
/// 从而保留线索的完整拨打历史。记录在到达供应商终态后不可再变更。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallAttempt {
    pub id: i64,
    pub campaign_id: i64,
    pub lead_id: i64,
    /// 呼叫执行器返回的关联ID，用于回调事件的匹配
    pub correlation_id: String,
    pub attempt_number: i32,
    pub status: CallStatus,
    pub duration_seconds: Option<i32>,
    pub error_kind: Option<CallErrorKind>,
    pub call_data: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 呼叫生命周期状态，镜像供应商侧的状态机
///
/// `Initiated -> Ringing -> InProgress -> {Completed, Busy, Failed, NoAnswer, Cancelled}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CallStatus {
    #[serde(rename = "INITIATED")]
    Initiated,
    #[serde(rename = "RINGING")]
    Ringing,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "BUSY")]
    Busy,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "NO_ANSWER")]
    NoAnswer,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

/// 供应商上报的失败种类，区分可重试与永久失败
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CallErrorKind {
    /// 瞬时故障（线路抖动、供应商超时等），消耗一次重试预算
    #[serde(rename = "TRANSIENT")]
    Transient,
    /// 号码无效，立即终止不再重试
    #[serde(rename = "INVALID_NUMBER")]
    InvalidNumber,
    /// 合规拒绝，立即终止不再重试
    #[serde(rename = "COMPLIANCE_REJECTED")]
    ComplianceRejected,
}

/// 终态结果的分类，驱动线索的下一步状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeClass {
    Success,
    Retryable,
    Permanent,
}

impl CallStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CallStatus::Completed
                | CallStatus::Busy
                | CallStatus::Failed
                | CallStatus::NoAnswer
                | CallStatus::Cancelled
        )
    }

    /// 呼叫状态转换表
    ///
    /// 终态之后不允许任何转换；供应商事件可能跳过中间状态
    /// （例如 Initiated 直接到 NoAnswer）。
    pub fn can_transition_to(&self, to: CallStatus) -> bool {
        use CallStatus::*;
        if self.is_terminal() {
            return false;
        }
        match (self, to) {
            (Initiated, Ringing) | (Initiated, InProgress) => true,
            (Ringing, InProgress) => true,
            (from, to) if !from.is_terminal() && to.is_terminal() => true,
            _ => false,
        }
    }

    /// 终态分类
    ///
    /// 失败事件依据 `error_kind` 区分瞬时与永久；缺省按瞬时处理，
    /// 宁可多重试也不吞掉可挽回的线索。
    pub fn classify(&self, error_kind: Option<CallErrorKind>) -> Option<OutcomeClass> {
        match self {
            CallStatus::Completed => Some(OutcomeClass::Success),
            CallStatus::Busy | CallStatus::NoAnswer | CallStatus::Cancelled => {
                Some(OutcomeClass::Retryable)
            }
            CallStatus::Failed => match error_kind {
                Some(CallErrorKind::InvalidNumber) | Some(CallErrorKind::ComplianceRejected) => {
                    Some(OutcomeClass::Permanent)
                }
                _ => Some(OutcomeClass::Retryable),
            },
            _ => None,
        }
    }
}

impl CallAttempt {
    pub fn new(
        campaign_id: i64,
        lead_id: i64,
        correlation_id: String,
        attempt_number: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0, // 由仓储生成
            campaign_id,
            lead_id,
            correlation_id,
            attempt_number,
            status: CallStatus::Initiated,
            duration_seconds: None,
            error_kind: None,
            call_data: serde_json::Value::Null,
            started_at: now,
            finished_at: None,
            created_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_are_frozen() {
        for s in [
            CallStatus::Completed,
            CallStatus::Busy,
            CallStatus::Failed,
            CallStatus::NoAnswer,
            CallStatus::Cancelled,
        ] {
            assert!(s.is_terminal());
            assert!(!s.can_transition_to(CallStatus::InProgress));
            assert!(!s.can_transition_to(CallStatus::Completed));
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        assert!(CallStatus::Initiated.can_transition_to(CallStatus::Ringing));
        assert!(CallStatus::Ringing.can_transition_to(CallStatus::InProgress));
        assert!(CallStatus::InProgress.can_transition_to(CallStatus::Completed));
        // 供应商可能跳过中间状态
        assert!(CallStatus::Initiated.can_transition_to(CallStatus::NoAnswer));
        assert!(!CallStatus::InProgress.can_transition_to(CallStatus::Ringing));
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            CallStatus::Completed.classify(None),
            Some(OutcomeClass::Success)
        );
        assert_eq!(
            CallStatus::NoAnswer.classify(None),
            Some(OutcomeClass::Retryable)
        );
        assert_eq!(
            CallStatus::Failed.classify(Some(CallErrorKind::InvalidNumber)),
            Some(OutcomeClass::Permanent)
        );
        assert_eq!(
            CallStatus::Failed.classify(Some(CallErrorKind::Transient)),
            Some(OutcomeClass::Retryable)
        );
        assert_eq!(
            CallStatus::Failed.classify(None),
            Some(OutcomeClass::Retryable)
        );
        assert_eq!(CallStatus::Ringing.classify(None), None);
    }
}
