//! Sampling resolution — a lexically checked duration token.
//!
//! Two spellings are accepted:
//! - ISO-style `P[nD][T[nH][nM][n[.n]S]]`, e.g. `P1D`, `PT15M`, `P1DT12H`, `PT0.5S`
//! - compact `<n><unit>` with unit in `s`, `m`/`min`, `h`, `d`, `w`, e.g. `5min`, `1d`
//!
//! The token is carried verbatim: expansion never interprets it, because calendar and
//! vendor semantics belong to the fetch side. `approx_duration` exists only for
//! scheduling, where a nominal length is enough.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use chrono::Duration;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const ISO_PATTERN: &str =
    r"^P(?:(?P<days>\d+)D)?(?:T(?:(?P<hours>\d+)H)?(?:(?P<minutes>\d+)M)?(?:(?P<seconds>\d+(?:\.\d+)?)S)?)?$";
const COMPACT_PATTERN: &str = r"^(?P<count>\d+)(?P<unit>s|min|m|h|d|w)$";

fn iso_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ISO_PATTERN).expect("ISO duration pattern is valid"))
}

fn compact_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(COMPACT_PATTERN).expect("compact duration pattern is valid"))
}

/// Rejected duration token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{token}' is not a duration (expected e.g. P1D, PT15M or 5min)")]
pub struct ResolutionParseError {
    pub token: String,
}

/// A sampling interval, stored as the token the user wrote.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution(String);

impl Resolution {
    /// Parse and lexically validate a duration token.
    pub fn parse(token: &str) -> Result<Self, ResolutionParseError> {
        if is_iso(token) || compact_re().is_match(token) {
            Ok(Self(token.to_string()))
        } else {
            Err(ResolutionParseError {
                token: token.to_string(),
            })
        }
    }

    /// The token exactly as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Nominal length of the interval (days are 24h, weeks are 7 days).
    ///
    /// Returns `None` when the magnitude does not fit a `chrono::Duration`.
    pub fn approx_duration(&self) -> Option<Duration> {
        if let Some(caps) = iso_re().captures(&self.0) {
            let part = |name: &str| -> Option<i64> {
                caps.name(name).map_or(Some(0), |m| m.as_str().parse().ok())
            };
            let seconds_ms = match caps.name("seconds") {
                Some(m) => seconds_to_millis(m.as_str())?,
                None => 0,
            };
            let ms = part("days")?
                .checked_mul(86_400_000)?
                .checked_add(part("hours")?.checked_mul(3_600_000)?)?
                .checked_add(part("minutes")?.checked_mul(60_000)?)?
                .checked_add(seconds_ms)?;
            return Duration::try_milliseconds(ms);
        }

        let caps = compact_re().captures(&self.0)?;
        let count: i64 = caps["count"].parse().ok()?;
        let unit_ms: i64 = match &caps["unit"] {
            "s" => 1_000,
            "m" | "min" => 60_000,
            "h" => 3_600_000,
            "d" => 86_400_000,
            "w" => 604_800_000,
            _ => return None,
        };
        Duration::try_milliseconds(count.checked_mul(unit_ms)?)
    }
}

/// `P` alone and a dangling `T` match the pattern but name no component.
fn is_iso(token: &str) -> bool {
    iso_re().is_match(token) && token != "P" && !token.ends_with('T')
}

fn seconds_to_millis(raw: &str) -> Option<i64> {
    let (whole, frac) = raw.split_once('.').unwrap_or((raw, ""));
    let whole_ms = whole.parse::<i64>().ok()?.checked_mul(1_000)?;
    let frac_ms = frac
        .chars()
        .chain(std::iter::repeat('0'))
        .take(3)
        .collect::<String>()
        .parse::<i64>()
        .ok()?;
    whole_ms.checked_add(frac_ms)
}

impl FromStr for Resolution {
    type Err = ResolutionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Resolution {
    type Error = ResolutionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_iso_tokens() {
        for token in ["P1D", "PT15M", "P1DT12H", "PT0.5S", "PT1H30M", "P0D"] {
            assert!(Resolution::parse(token).is_ok(), "{token} should parse");
        }
    }

    #[test]
    fn accepts_compact_tokens() {
        for token in ["30s", "5m", "5min", "1h", "1d", "2w"] {
            assert!(Resolution::parse(token).is_ok(), "{token} should parse");
        }
    }

    #[test]
    fn rejects_empty_and_malformed_tokens() {
        for token in ["", "P", "PT", "P1DT", "1D", "daily", "P1H", "-1d", "1.5h", " P1D"] {
            assert!(Resolution::parse(token).is_err(), "{token} should be rejected");
        }
    }

    #[test]
    fn token_is_preserved_verbatim() {
        let r = Resolution::parse("P1DT12H").unwrap();
        assert_eq!(r.as_str(), "P1DT12H");
        assert_eq!(r.to_string(), "P1DT12H");
    }

    #[test]
    fn approx_duration_iso() {
        let r = Resolution::parse("P1DT2H3M4.5S").unwrap();
        let expected = Duration::days(1)
            + Duration::hours(2)
            + Duration::minutes(3)
            + Duration::milliseconds(4_500);
        assert_eq!(r.approx_duration(), Some(expected));
    }

    #[test]
    fn approx_duration_compact() {
        assert_eq!(
            Resolution::parse("15min").unwrap().approx_duration(),
            Some(Duration::minutes(15))
        );
        assert_eq!(
            Resolution::parse("2w").unwrap().approx_duration(),
            Some(Duration::days(14))
        );
    }

    #[test]
    fn approx_duration_overflow_is_none() {
        let r = Resolution::parse("P99999999999999999999D").unwrap();
        assert_eq!(r.approx_duration(), None);
    }

    #[test]
    fn serde_uses_plain_string() {
        let r = Resolution::parse("PT1H").unwrap();
        assert_eq!(serde_json::to_string(&r).unwrap(), "\"PT1H\"");
        let back: Resolution = serde_json::from_str("\"PT1H\"").unwrap();
        assert_eq!(back, r);
        assert!(serde_json::from_str::<Resolution>("\"hourly\"").is_err());
    }
}
