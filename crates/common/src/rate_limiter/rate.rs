use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RateError {
    #[error("malformed rate {0:?}, expected \"N/interval\" or \"unlimited\"")]
    Malformed(String),
    #[error("rate must allow at least one event")]
    ZeroEvents,
    #[error("rate interval must be positive")]
    ZeroInterval,
}

/// How many events may happen within a sliding interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Rate {
    Limited { events: u32, interval: Duration },
    Unlimited,
}

impl Rate {
    pub fn new(events: u32, interval: Duration) -> Result<Self, RateError> {
        if events == 0 {
            return Err(RateError::ZeroEvents);
        }
        if interval.is_zero() {
            return Err(RateError::ZeroInterval);
        }
        Ok(Rate::Limited { events, interval })
    }

    /// Convenience constructor for literal rates; zero arguments
    ///  are raised to one
    pub fn per_millis(events: u32, millis: u64) -> Self {
        Rate::Limited {
            events: events.max(1),
            interval: Duration::from_millis(millis.max(1)),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        matches!(self, Rate::Unlimited)
    }
}

fn parse_interval(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(s.len());
    let (num, unit) = s.split_at(split);
    let n: u64 = num.parse().ok()?;
    let millis = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "ms" => n,
        "s" => n.checked_mul(1_000)?,
        "m" => n.checked_mul(60_000)?,
        "h" => n.checked_mul(3_600_000)?,
        "d" => n.checked_mul(86_400_000)?,
        _ => return None,
    };
    Some(Duration::from_millis(millis))
}

impl FromStr for Rate {
    type Err = RateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("unlimited") {
            return Ok(Rate::Unlimited);
        }
        let (events, interval) = trimmed
            .split_once('/')
            .ok_or_else(|| RateError::Malformed(s.to_string()))?;
        let events: u32 = events
            .trim()
            .parse()
            .map_err(|_| RateError::Malformed(s.to_string()))?;
        let interval = parse_interval(interval).ok_or_else(|| RateError::Malformed(s.to_string()))?;
        Rate::new(events, interval)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rate::Unlimited => f.write_str("unlimited"),
            Rate::Limited { events, interval } => {
                write!(f, "{}/{}ms", events, interval.as_millis())
            }
        }
    }
}

impl TryFrom<String> for Rate {
    type Error = RateError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Rate> for String {
    fn from(rate: Rate) -> Self {
        rate.to_string()
    }
}
