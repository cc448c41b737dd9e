//! Test data builders for creating test entities
//!
//! This module provides builder patterns for creating test data with
//! sensible defaults and easy customization.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use dialer_core::models::{
    CallAttempt, CallErrorKind, CallEvent, CallStatus, Campaign, CampaignStatus, Lead, LeadStatus,
};

/// Builder for creating test Campaign entities
pub struct CampaignBuilder {
    campaign: Campaign,
}

impl CampaignBuilder {
    pub fn new() -> Self {
        Self {
            campaign: Campaign {
                id: 1,
                tenant_id: 1,
                name: "test_campaign".to_string(),
                status: CampaignStatus::Active,
                prompt_ref: "prompt-1".to_string(),
                calls_per_day: 100,
                max_attempts_per_lead: 3,
                retry_delay_minutes: 30,
                call_duration_limit_seconds: 300,
                calling_hours_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                calling_hours_end: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
                time_zone: "UTC".to_string(),
                working_days: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                ],
                total_leads: 0,
                completed_calls: 0,
                successful_calls: 0,
                failed_calls: 0,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.campaign.id = id;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.campaign.name = name.to_string();
        self
    }

    pub fn with_status(mut self, status: CampaignStatus) -> Self {
        self.campaign.status = status;
        self
    }

    pub fn with_calls_per_day(mut self, calls_per_day: i32) -> Self {
        self.campaign.calls_per_day = calls_per_day;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.campaign.max_attempts_per_lead = max_attempts;
        self
    }

    pub fn with_retry_delay_minutes(mut self, minutes: i32) -> Self {
        self.campaign.retry_delay_minutes = minutes;
        self
    }

    pub fn with_duration_limit_seconds(mut self, seconds: i32) -> Self {
        self.campaign.call_duration_limit_seconds = seconds;
        self
    }

    pub fn with_calling_hours(mut self, start: NaiveTime, end: NaiveTime) -> Self {
        self.campaign.calling_hours_start = start;
        self.campaign.calling_hours_end = end;
        self
    }

    pub fn with_time_zone(mut self, tz: &str) -> Self {
        self.campaign.time_zone = tz.to_string();
        self
    }

    pub fn with_working_days(mut self, days: Vec<Weekday>) -> Self {
        self.campaign.working_days = days;
        self
    }

    /// Calling window that is open at any instant, for tests that do not
    /// care about window mechanics.
    pub fn always_callable(mut self) -> Self {
        self.campaign.calling_hours_start = NaiveTime::from_hms_opt(0, 0, 0).unwrap();
        self.campaign.calling_hours_end = NaiveTime::from_hms_opt(23, 59, 59).unwrap();
        self.campaign.working_days = vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ];
        self
    }

    pub fn paused(mut self) -> Self {
        self.campaign.status = CampaignStatus::Paused;
        self
    }

    pub fn build(self) -> Campaign {
        self.campaign
    }
}

impl Default for CampaignBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Lead entities
pub struct LeadBuilder {
    lead: Lead,
}

impl LeadBuilder {
    pub fn new() -> Self {
        Self {
            lead: Lead {
                id: 1,
                campaign_id: Some(1),
                phone: "+15550000001".to_string(),
                name: Some("Test Lead".to_string()),
                time_zone: None,
                preferred_language: None,
                status: LeadStatus::Pending,
                attempts_made: 0,
                last_attempt_time: None,
                next_attempt_time: None,
                priority: 0,
                lead_score: 50,
                do_not_call: false,
                blacklist_reason: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.lead.id = id;
        self
    }

    pub fn with_campaign_id(mut self, campaign_id: i64) -> Self {
        self.lead.campaign_id = Some(campaign_id);
        self
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.lead.phone = phone.to_string();
        self
    }

    pub fn with_status(mut self, status: LeadStatus) -> Self {
        self.lead.status = status;
        self
    }

    pub fn with_attempts_made(mut self, attempts: i32) -> Self {
        self.lead.attempts_made = attempts;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.lead.priority = priority;
        self
    }

    pub fn with_score(mut self, score: i32) -> Self {
        self.lead.lead_score = score;
        self
    }

    pub fn with_time_zone(mut self, tz: &str) -> Self {
        self.lead.time_zone = Some(tz.to_string());
        self
    }

    pub fn with_last_attempt_time(mut self, time: DateTime<Utc>) -> Self {
        self.lead.last_attempt_time = Some(time);
        self
    }

    pub fn with_next_attempt_time(mut self, time: DateTime<Utc>) -> Self {
        self.lead.next_attempt_time = Some(time);
        self
    }

    pub fn do_not_call(mut self) -> Self {
        self.lead.do_not_call = true;
        self
    }

    pub fn blacklisted(mut self, reason: &str) -> Self {
        self.lead.status = LeadStatus::Blacklisted;
        self.lead.blacklist_reason = Some(reason.to_string());
        self
    }

    pub fn build(self) -> Lead {
        self.lead
    }
}

impl Default for LeadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test CallAttempt entities
pub struct CallAttemptBuilder {
    attempt: CallAttempt,
}

impl CallAttemptBuilder {
    pub fn new() -> Self {
        Self {
            attempt: CallAttempt {
                id: 1,
                campaign_id: 1,
                lead_id: 1,
                correlation_id: "corr-1".to_string(),
                attempt_number: 1,
                status: CallStatus::Initiated,
                duration_seconds: None,
                error_kind: None,
                call_data: serde_json::Value::Null,
                started_at: Utc::now(),
                finished_at: None,
                created_at: Utc::now(),
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.attempt.id = id;
        self
    }

    pub fn with_campaign_id(mut self, campaign_id: i64) -> Self {
        self.attempt.campaign_id = campaign_id;
        self
    }

    pub fn with_lead_id(mut self, lead_id: i64) -> Self {
        self.attempt.lead_id = lead_id;
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: &str) -> Self {
        self.attempt.correlation_id = correlation_id.to_string();
        self
    }

    pub fn with_attempt_number(mut self, n: i32) -> Self {
        self.attempt.attempt_number = n;
        self
    }

    pub fn with_status(mut self, status: CallStatus) -> Self {
        self.attempt.status = status;
        self
    }

    pub fn with_started_at(mut self, time: DateTime<Utc>) -> Self {
        self.attempt.started_at = time;
        self
    }

    pub fn build(self) -> CallAttempt {
        self.attempt
    }
}

impl Default for CallAttemptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test CallEvent values
pub struct CallEventBuilder {
    event: CallEvent,
}

impl CallEventBuilder {
    pub fn new(correlation_id: &str, status: CallStatus) -> Self {
        Self {
            event: CallEvent::new(correlation_id, status),
        }
    }

    pub fn with_duration_seconds(mut self, seconds: i32) -> Self {
        self.event.duration_seconds = Some(seconds);
        self
    }

    pub fn with_error_kind(mut self, kind: CallErrorKind) -> Self {
        self.event.error_kind = Some(kind);
        self
    }

    pub fn with_timestamp(mut self, time: DateTime<Utc>) -> Self {
        self.event.timestamp = time;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.event.metadata = metadata;
        self
    }

    pub fn build(self) -> CallEvent {
        self.event
    }
}
