//! Canonical period keys
//!
//! Every source reports dates differently (`2023-03-15`, `202303`,
//! `2023-03`, `Mar 2023`, ...). All of them are parsed as calendar dates,
//! without any time-zone handling, and then truncated to the granularity of
//! the table they join: the first day of the month for monthly tables, the
//! day itself for daily tables.

use crate::error::{LabError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Resolution of a period key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Monthly,
    Daily,
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Monthly => write!(f, "monthly"),
            Granularity::Daily => write!(f, "daily"),
        }
    }
}

/// Canonical join key: a calendar date at a given granularity.
///
/// Monthly periods always sit on the first day of their month, so two
/// monthly keys compare equal exactly when they name the same year-month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Period {
    date: NaiveDate,
    granularity: Granularity,
}

impl Period {
    /// Key for `date` at `granularity`
    pub fn from_date(date: NaiveDate, granularity: Granularity) -> Self {
        let date = match granularity {
            Granularity::Monthly => date.with_day(1).unwrap_or(date),
            Granularity::Daily => date,
        };
        Self { date, granularity }
    }

    /// Monthly key for a year and month
    pub fn monthly(year: i32, month: u32) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| {
            LabError::UnparseableDate {
                value: format!("{}-{:02}", year, month),
                reason: "month out of range".to_string(),
            }
        })?;
        Ok(Self::from_date(date, Granularity::Monthly))
    }

    /// Daily key for a calendar date
    pub fn daily(year: i32, month: u32, day: u32) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| {
            LabError::UnparseableDate {
                value: format!("{}-{:02}-{:02}", year, month, day),
                reason: "not a calendar date".to_string(),
            }
        })?;
        Ok(Self::from_date(date, Granularity::Daily))
    }

    /// Parse a native representation and normalize it to `granularity`
    pub fn parse(raw: &str, granularity: Granularity) -> Result<Self> {
        normalize(raw, granularity)
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.granularity {
            Granularity::Monthly => write!(f, "{}", self.date.format("%Y-%m")),
            Granularity::Daily => write!(f, "{}", self.date.format("%Y-%m-%d")),
        }
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Native date layouts understood by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateFormat {
    /// `2023-03-15` or `2023/03/15`, optionally followed by a time part
    IsoDate,
    /// `2023-03`
    YearMonth,
    /// `202303`
    CompactYearMonth,
    /// `20230315`
    CompactDate,
    /// `Mar 2023`, `March 2023`, `15 Mar 2023`
    TextMonth,
}

impl DateFormat {
    /// Guess the layout of `raw` from its shape
    pub fn detect(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let bytes = raw.as_bytes();
        let all_digits = !raw.is_empty() && bytes.iter().all(u8::is_ascii_digit);

        if all_digits && raw.len() == 6 {
            Some(DateFormat::CompactYearMonth)
        } else if all_digits && raw.len() == 8 {
            Some(DateFormat::CompactDate)
        } else if raw.len() >= 10
            && raw.is_char_boundary(10)
            && matches!(bytes[4], b'-' | b'/')
            && bytes[7] == bytes[4]
        {
            Some(DateFormat::IsoDate)
        } else if raw.len() == 7 && bytes[4] == b'-' {
            Some(DateFormat::YearMonth)
        } else if raw.chars().any(char::is_alphabetic) {
            Some(DateFormat::TextMonth)
        } else {
            None
        }
    }

    /// Parse `raw` as a calendar date in this layout; month-only layouts map to the 1st
    pub fn parse(self, raw: &str) -> Result<NaiveDate> {
        let raw = raw.trim();
        match self {
            DateFormat::IsoDate => {
                let head = raw.get(..10).ok_or_else(|| unparseable(raw, "too short"))?;
                NaiveDate::parse_from_str(head, "%Y-%m-%d")
                    .or_else(|_| NaiveDate::parse_from_str(head, "%Y/%m/%d"))
                    .map_err(|e| unparseable(raw, e))
            }
            DateFormat::YearMonth => {
                let (year, month) = raw
                    .split_once('-')
                    .ok_or_else(|| unparseable(raw, "expected YYYY-MM"))?;
                year_month(raw, year, month)
            }
            DateFormat::CompactYearMonth => {
                if raw.len() != 6 || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(unparseable(raw, "expected six digits YYYYMM"));
                }
                year_month(raw, &raw[..4], &raw[4..])
            }
            DateFormat::CompactDate => {
                if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(unparseable(raw, "expected eight digits YYYYMMDD"));
                }
                NaiveDate::parse_from_str(raw, "%Y%m%d").map_err(|e| unparseable(raw, e))
            }
            DateFormat::TextMonth => {
                let with_day = format!("1 {}", raw);
                ["%d %b %Y", "%d %B %Y"]
                    .iter()
                    .find_map(|fmt| {
                        NaiveDate::parse_from_str(raw, fmt)
                            .or_else(|_| NaiveDate::parse_from_str(&with_day, fmt))
                            .ok()
                    })
                    .ok_or_else(|| unparseable(raw, "expected 'Mon YYYY' or 'DD Mon YYYY'"))
            }
        }
    }
}

/// Parse any supported layout into a calendar date
pub fn parse_native_date(raw: &str) -> Result<NaiveDate> {
    let format = DateFormat::detect(raw).ok_or_else(|| unparseable(raw, "unrecognized layout"))?;
    format.parse(raw)
}

/// Map a native representation to its canonical key
pub fn normalize(raw: &str, granularity: Granularity) -> Result<Period> {
    Ok(Period::from_date(parse_native_date(raw)?, granularity))
}

fn year_month(raw: &str, year: &str, month: &str) -> Result<NaiveDate> {
    let year: i32 = year.parse().map_err(|_| unparseable(raw, "invalid year"))?;
    let month: u32 = month.parse().map_err(|_| unparseable(raw, "invalid month"))?;
    NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| unparseable(raw, "month out of range"))
}

fn unparseable(raw: &str, reason: impl ToString) -> LabError {
    LabError::UnparseableDate {
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_keys_sit_on_first_day() {
        let period = normalize("2023-03-15", Granularity::Monthly).unwrap();
        assert_eq!(period.date(), NaiveDate::from_ymd_opt(2023, 3, 1).unwrap());
        assert_eq!(period.to_string(), "2023-03");
    }

    #[test]
    fn daily_keys_keep_the_day() {
        let period = normalize("2023-03-15", Granularity::Daily).unwrap();
        assert_eq!(period.to_string(), "2023-03-15");
    }

    #[test]
    fn detect_rejects_noise() {
        assert_eq!(DateFormat::detect("12-3"), None);
        assert_eq!(DateFormat::detect(""), None);
    }
}
