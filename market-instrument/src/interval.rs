//! Kline interval enumeration shared by the provider, history store and
//! indicator framework.

use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// A candlestick interval, as named in exchange stream identifiers
/// (`kline_1m`) and in instance keys.
#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Display, Deserialize, Serialize,
)]
pub enum Interval {
    #[display("1m")]
    OneMinute,
    #[display("3m")]
    ThreeMinutes,
    #[display("5m")]
    FiveMinutes,
    #[display("15m")]
    FifteenMinutes,
    #[display("30m")]
    ThirtyMinutes,
    #[display("1h")]
    OneHour,
    #[display("2h")]
    TwoHours,
    #[display("4h")]
    FourHours,
    #[display("6h")]
    SixHours,
    #[display("8h")]
    EightHours,
    #[display("12h")]
    TwelveHours,
    #[display("1d")]
    OneDay,
    #[display("3d")]
    ThreeDays,
    #[display("1w")]
    OneWeek,
    #[display("1M")]
    OneMonth,
}

impl Interval {
    /// Wall-clock duration of one bar. `1M` is approximated as 30 days since
    /// calendar months are not fixed-length; callers needing calendar-exact
    /// month boundaries should use `chrono`'s month arithmetic directly.
    pub fn duration(&self) -> Duration {
        let secs = match self {
            Interval::OneMinute => 60,
            Interval::ThreeMinutes => 3 * 60,
            Interval::FiveMinutes => 5 * 60,
            Interval::FifteenMinutes => 15 * 60,
            Interval::ThirtyMinutes => 30 * 60,
            Interval::OneHour => 3600,
            Interval::TwoHours => 2 * 3600,
            Interval::FourHours => 4 * 3600,
            Interval::SixHours => 6 * 3600,
            Interval::EightHours => 8 * 3600,
            Interval::TwelveHours => 12 * 3600,
            Interval::OneDay => 24 * 3600,
            Interval::ThreeDays => 3 * 24 * 3600,
            Interval::OneWeek => 7 * 24 * 3600,
            Interval::OneMonth => 30 * 24 * 3600,
        };
        Duration::from_secs(secs)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::OneMinute => "1m",
            Interval::ThreeMinutes => "3m",
            Interval::FiveMinutes => "5m",
            Interval::FifteenMinutes => "15m",
            Interval::ThirtyMinutes => "30m",
            Interval::OneHour => "1h",
            Interval::TwoHours => "2h",
            Interval::FourHours => "4h",
            Interval::SixHours => "6h",
            Interval::EightHours => "8h",
            Interval::TwelveHours => "12h",
            Interval::OneDay => "1d",
            Interval::ThreeDays => "3d",
            Interval::OneWeek => "1w",
            Interval::OneMonth => "1M",
        }
    }
}

/// Raised when a string does not match a recognised interval label.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown interval: {0}")]
pub struct UnknownInterval(pub String);

impl FromStr for Interval {
    type Err = UnknownInterval;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::OneMinute),
            "3m" => Ok(Interval::ThreeMinutes),
            "5m" => Ok(Interval::FiveMinutes),
            "15m" => Ok(Interval::FifteenMinutes),
            "30m" => Ok(Interval::ThirtyMinutes),
            "1h" => Ok(Interval::OneHour),
            "2h" => Ok(Interval::TwoHours),
            "4h" => Ok(Interval::FourHours),
            "6h" => Ok(Interval::SixHours),
            "8h" => Ok(Interval::EightHours),
            "12h" => Ok(Interval::TwelveHours),
            "1d" => Ok(Interval::OneDay),
            "3d" => Ok(Interval::ThreeDays),
            "1w" => Ok(Interval::OneWeek),
            "1M" => Ok(Interval::OneMonth),
            other => Err(UnknownInterval(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_minute_duration_is_sixty_seconds() {
        assert_eq!(Interval::OneMinute.duration(), Duration::from_secs(60));
    }

    #[test]
    fn round_trips_through_label() {
        for interval in [Interval::OneMinute, Interval::FiveMinutes, Interval::OneDay] {
            assert_eq!(Interval::from_str(interval.as_str()).unwrap(), interval);
        }
    }
}
