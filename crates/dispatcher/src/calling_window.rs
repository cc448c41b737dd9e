use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use dialer_core::models::Campaign;
use dialer_core::{DialerError, DialerResult};

/// 时段裁决结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDecision {
    /// 当前时刻允许拨打
    Callable,
    /// 时段关闭，`next_open` 为下一次窗口开启的UTC时刻
    Closed { next_open: DateTime<Utc> },
}

/// 拨打时段守卫
///
/// 所有判断都在本地时区完成：优先取线索自带时区，退回活动时区。
/// 夏令时处理：窗口开启时刻落入不存在的本地时间（春季跳变）时
/// 顺延一小时；落入重复的本地时间（秋季回拨）时取较早的一次。
pub struct CallingWindowGuard;

impl CallingWindowGuard {
    /// 裁决线索此刻是否可拨
    pub fn evaluate(
        campaign: &Campaign,
        lead_tz: Option<&str>,
        now: DateTime<Utc>,
    ) -> DialerResult<WindowDecision> {
        campaign.validate_calling_window()?;
        let tz = Self::effective_tz(campaign, lead_tz)?;
        let local = now.with_timezone(&tz);

        let in_working_day = campaign.working_days.contains(&local.weekday());
        let t = local.time();
        if in_working_day && t >= campaign.calling_hours_start && t < campaign.calling_hours_end {
            return Ok(WindowDecision::Callable);
        }

        let next_open = Self::next_open(campaign, tz, now)?;
        Ok(WindowDecision::Closed { next_open })
    }

    /// 选取生效时区：线索时区优先，解析失败时退回活动时区
    fn effective_tz(campaign: &Campaign, lead_tz: Option<&str>) -> DialerResult<Tz> {
        if let Some(name) = lead_tz {
            match name.parse::<Tz>() {
                Ok(tz) => return Ok(tz),
                Err(_) => {
                    warn!("线索时区 {} 无法解析，退回活动时区 {}", name, campaign.time_zone);
                }
            }
        }
        campaign.tz()
    }

    /// 计算下一次窗口开启的UTC时刻
    ///
    /// 从今天起向前扫描至多一周。working_days 非空保证一周内必有
    /// 工作日，扫描失败说明配置被并发改坏了。
    fn next_open(campaign: &Campaign, tz: Tz, now: DateTime<Utc>) -> DialerResult<DateTime<Utc>> {
        let local_now = now.with_timezone(&tz);
        for day_offset in 0..=7i64 {
            let date = local_now.date_naive() + Duration::days(day_offset);
            if !campaign.working_days.contains(&date.weekday()) {
                continue;
            }
            let candidate = Self::resolve_local(tz, date.and_time(campaign.calling_hours_start));
            if candidate > now {
                return Ok(candidate);
            }
        }
        Err(DialerError::InvalidCallingWindow {
            message: "一周内找不到下一个拨打窗口".to_string(),
        })
    }

    /// 把本地时间解析为UTC，处理夏令时的空洞与重叠
    fn resolve_local(tz: Tz, naive: NaiveDateTime) -> DateTime<Utc> {
        match tz.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            // 秋季回拨，同一本地时间出现两次，取较早的一次
            LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
            // 春季跳变，该本地时间不存在，顺延一小时
            LocalResult::None => {
                let shifted = naive + Duration::hours(1);
                match tz.from_local_datetime(&shifted) {
                    LocalResult::Single(dt) => dt.with_timezone(&Utc),
                    LocalResult::Ambiguous(earlier, _) => earlier.with_timezone(&Utc),
                    LocalResult::None => tz.from_utc_datetime(&naive).with_timezone(&Utc),
                }
            }
        }
    }
}
