// Paging and filter parsing for portal listings

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pager {
    pub page: usize,
    pub page_count: usize,
    pub total: usize,
    pub step: usize,
    pub offset: usize,
}

impl Pager {
    /// Pages are 1-based; out-of-range requests are clamped
    pub fn new(total: usize, page: usize, step: usize) -> Self {
        let step = step.max(1);
        let page_count = total.div_ceil(step).max(1);
        let page = page.clamp(1, page_count);
        Self {
            page,
            page_count,
            total,
            step,
            offset: (page - 1) * step,
        }
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates; a plain date
/// used as an upper bound covers the whole day
pub fn parse_date_bound(value: &str, end_of_day: bool) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()?;
    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)?
    } else {
        NaiveTime::MIN
    };
    Some(date.and_time(time).and_utc())
}
