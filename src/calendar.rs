//! Classifies timestamps for an NSE-style equities exchange into trading
//! day / session / closed reason. Deterministic and pure given the static
//! holiday table below.
//!
//! The holiday table is a small, explicitly partial illustration (a handful
//! of fixed national holidays), not a claim to exchange-calendar
//! completeness — the original system delegates this entirely to a
//! collaborator not present in the retrieved source (see DESIGN.md).

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Weekday};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    PreOpen,
    Regular,
    PostClose,
}

impl SessionType {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionType::PreOpen => "pre_open",
            SessionType::Regular => "regular",
            SessionType::PostClose => "post_close",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub is_market_open: bool,
    pub session_type: Option<SessionType>,
    pub reason: String,
}

/// A small, explicitly partial set of NSE trading holidays.
fn holiday_table() -> &'static [NaiveDate] {
    use std::sync::OnceLock;
    static TABLE: OnceLock<Vec<NaiveDate>> = OnceLock::new();
    TABLE
        .get_or_init(|| {
            vec![
                NaiveDate::from_ymd_opt(2025, 1, 26).unwrap(), // Republic Day
                NaiveDate::from_ymd_opt(2025, 8, 15).unwrap(), // Independence Day
                NaiveDate::from_ymd_opt(2025, 10, 2).unwrap(), // Gandhi Jayanti
                NaiveDate::from_ymd_opt(2025, 10, 21).unwrap(), // Diwali (illustrative)
            ]
        })
        .as_slice()
}

pub struct ExchangeCalendar {
    tz: Tz,
}

impl Default for ExchangeCalendar {
    fn default() -> Self {
        Self::new("Asia/Kolkata")
    }
}

impl ExchangeCalendar {
    pub fn new(timezone: &str) -> Self {
        let tz: Tz = timezone.parse().unwrap_or(chrono_tz::Asia::Kolkata);
        Self { tz }
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        holiday_table().contains(&date)
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Classifies a timezone-aware instant.
    pub fn validate_trading_session(&self, ts: DateTime<chrono_tz::Tz>) -> SessionStatus {
        let local = ts.with_timezone(&self.tz);
        let date = local.date_naive();

        if matches!(local.weekday(), Weekday::Sat | Weekday::Sun) {
            return SessionStatus {
                is_market_open: false,
                session_type: None,
                reason: "weekend".to_string(),
            };
        }
        if self.is_holiday(date) {
            return SessionStatus {
                is_market_open: false,
                session_type: None,
                reason: "holiday".to_string(),
            };
        }

        let minute_of_day = local.hour() * 60 + local.minute();
        const PRE_OPEN_START: u32 = 9 * 60;
        const REGULAR_START: u32 = 9 * 60 + 15;
        const REGULAR_END: u32 = 15 * 60 + 30;
        const POST_CLOSE_END: u32 = 16 * 60;

        if (PRE_OPEN_START..REGULAR_START).contains(&minute_of_day) {
            SessionStatus {
                is_market_open: true,
                session_type: Some(SessionType::PreOpen),
                reason: String::new(),
            }
        } else if (REGULAR_START..REGULAR_END).contains(&minute_of_day) {
            SessionStatus {
                is_market_open: true,
                session_type: Some(SessionType::Regular),
                reason: String::new(),
            }
        } else if (REGULAR_END..POST_CLOSE_END).contains(&minute_of_day) {
            SessionStatus {
                is_market_open: true,
                session_type: Some(SessionType::PostClose),
                reason: String::new(),
            }
        } else {
            SessionStatus {
                is_market_open: false,
                session_type: None,
                reason: "after_hours".to_string(),
            }
        }
    }

    pub fn is_market_open(&self, ts: DateTime<chrono_tz::Tz>) -> bool {
        self.validate_trading_session(ts).is_market_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ist(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .unwrap()
    }

    #[test]
    fn weekday_regular_session_is_open() {
        let cal = ExchangeCalendar::default();
        // 2025-11-05 is a Wednesday.
        let status = cal.validate_trading_session(ist(2025, 11, 5, 10, 0));
        assert!(status.is_market_open);
        assert_eq!(status.session_type, Some(SessionType::Regular));
    }

    #[test]
    fn weekend_is_closed() {
        let cal = ExchangeCalendar::default();
        // 2025-11-09 is a Sunday.
        let status = cal.validate_trading_session(ist(2025, 11, 9, 10, 0));
        assert!(!status.is_market_open);
        assert_eq!(status.reason, "weekend");
    }

    #[test]
    fn holiday_is_closed() {
        let cal = ExchangeCalendar::default();
        let status = cal.validate_trading_session(ist(2025, 1, 26, 10, 0));
        assert!(!status.is_market_open);
        assert_eq!(status.reason, "holiday");
    }

    #[test]
    fn after_hours_is_closed() {
        let cal = ExchangeCalendar::default();
        let status = cal.validate_trading_session(ist(2025, 11, 5, 20, 0));
        assert!(!status.is_market_open);
        assert_eq!(status.reason, "after_hours");
    }

    #[test]
    fn is_trading_day_matches_session_weekday_rules() {
        let cal = ExchangeCalendar::default();
        assert!(cal.is_trading_day(NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()));
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2025, 11, 9).unwrap()));
        assert!(!cal.is_trading_day(NaiveDate::from_ymd_opt(2025, 1, 26).unwrap()));
    }
}
