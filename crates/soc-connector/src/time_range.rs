//! Compact duration tokens (`15m`, `2h`, `30s`, `1d`)

use crate::error::{ConnectorError, Result};
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeUnit {
    fn millis(self) -> u64 {
        match self {
            TimeUnit::Seconds => 1_000,
            TimeUnit::Minutes => 60_000,
            TimeUnit::Hours => 3_600_000,
            TimeUnit::Days => 86_400_000,
        }
    }

    fn suffix(self) -> char {
        match self {
            TimeUnit::Seconds => 's',
            TimeUnit::Minutes => 'm',
            TimeUnit::Hours => 'h',
            TimeUnit::Days => 'd',
        }
    }
}

/// Look-back window ending now.
///
/// Unknown units fall back to minutes; a missing count is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    amount: u64,
    unit: TimeUnit,
}

impl TimeRange {
    pub fn new(amount: u64, unit: TimeUnit) -> Self {
        Self { amount, unit }
    }

    pub fn minutes(amount: u64) -> Self {
        Self::new(amount, TimeUnit::Minutes)
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn as_millis(&self) -> u64 {
        self.amount.saturating_mul(self.unit.millis())
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.as_millis())
    }

    /// Start of the window relative to `now`
    pub fn start_from(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let millis = i64::try_from(self.as_millis()).unwrap_or(i64::MAX);
        chrono::Duration::try_milliseconds(millis)
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self::minutes(15)
    }
}

impl FromStr for TimeRange {
    type Err = ConnectorError;

    fn from_str(token: &str) -> Result<Self> {
        let token = token.trim();
        let digits = token.bytes().take_while(u8::is_ascii_digit).count();
        if digits == 0 {
            return Err(ConnectorError::InvalidTimeRange(token.to_string()));
        }
        let amount = token[..digits]
            .parse::<u64>()
            .map_err(|_| ConnectorError::InvalidTimeRange(token.to_string()))?;
        let unit = match &token[digits..] {
            "s" => TimeUnit::Seconds,
            "m" => TimeUnit::Minutes,
            "h" => TimeUnit::Hours,
            "d" => TimeUnit::Days,
            other => {
                tracing::debug!(unit = other, "unrecognized time unit, assuming minutes");
                TimeUnit::Minutes
            }
        };
        Ok(Self { amount, unit })
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.unit.suffix())
    }
}
