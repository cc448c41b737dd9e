use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 外呼线索
///
/// 一个待拨打的联系对象，携带调度状态与合规标记。
/// `do_not_call` 或 `Blacklisted` 一旦设置，线索永久退出选取，
/// 不受其他字段影响。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub campaign_id: Option<i64>,
    pub phone: String,
    pub name: Option<String>,
    pub time_zone: Option<String>,
    pub preferred_language: Option<String>,
    pub status: LeadStatus,
    pub attempts_made: i32,
    pub last_attempt_time: Option<DateTime<Utc>>,
    pub next_attempt_time: Option<DateTime<Utc>>,
    pub priority: i32,
    pub lead_score: i32,
    pub do_not_call: bool,
    pub blacklist_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 线索调度状态
///
/// - `Pending`: 等待首次拨打
/// - `InProgress`: 已被认领，呼叫在途（同一时刻唯一归属）
/// - `Completed`: 成功接通，终态
/// - `Failed`: 重试耗尽或永久失败，终态
/// - `Scheduled`: 等待重试，`next_attempt_time` 已设置
/// - `Blacklisted`: 黑名单，吸收态，仅运营人员可设置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum LeadStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "SCHEDULED")]
    Scheduled,
    #[serde(rename = "BLACKLISTED")]
    Blacklisted,
}

impl LeadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LeadStatus::Completed | LeadStatus::Failed | LeadStatus::Blacklisted
        )
    }

    /// 是否处于可被认领的状态
    pub fn is_claimable(&self) -> bool {
        matches!(self, LeadStatus::Pending | LeadStatus::Scheduled)
    }
}

/// 活动下线索的状态分布统计
#[derive(Debug, Default, Clone, Copy)]
pub struct LeadStatusCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub scheduled: usize,
    pub blacklisted: usize,
}

impl LeadStatusCounts {
    pub fn total(&self) -> usize {
        self.pending
            + self.in_progress
            + self.completed
            + self.failed
            + self.scheduled
            + self.blacklisted
    }

    /// 仍可能产生呼叫的线索数
    pub fn outstanding(&self) -> usize {
        self.pending + self.in_progress + self.scheduled
    }
}

impl Lead {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 选取前置条件：状态可认领、无合规排除、重试时间已到
    ///
    /// 不包含拨打时段判断，时段由守卫单独裁决。
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        if self.do_not_call || self.status == LeadStatus::Blacklisted {
            return false;
        }
        if !self.status.is_claimable() {
            return false;
        }
        match self.next_attempt_time {
            Some(t) => t <= now,
            None => true,
        }
    }

    /// 线索分值，越界值收敛到 0-100
    pub fn clamped_score(&self) -> i32 {
        self.lead_score.clamp(0, 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(status: LeadStatus) -> Lead {
        Lead {
            id: 1,
            campaign_id: Some(1),
            phone: "+8613800000000".to_string(),
            name: None,
            time_zone: None,
            preferred_language: None,
            status,
            attempts_made: 0,
            last_attempt_time: None,
            next_attempt_time: None,
            priority: 0,
            lead_score: 50,
            do_not_call: false,
            blacklist_reason: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_due_respects_do_not_call() {
        let mut l = lead(LeadStatus::Pending);
        assert!(l.is_due(Utc::now()));
        l.do_not_call = true;
        assert!(!l.is_due(Utc::now()));
    }

    #[test]
    fn test_is_due_respects_next_attempt_time() {
        let now = Utc::now();
        let mut l = lead(LeadStatus::Scheduled);
        l.next_attempt_time = Some(now + chrono::Duration::minutes(10));
        assert!(!l.is_due(now));
        l.next_attempt_time = Some(now - chrono::Duration::minutes(10));
        assert!(l.is_due(now));
    }

    #[test]
    fn test_blacklisted_never_due() {
        let mut l = lead(LeadStatus::Blacklisted);
        l.next_attempt_time = None;
        assert!(!l.is_due(Utc::now()));
    }
}
