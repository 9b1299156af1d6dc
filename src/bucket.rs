//! Time buckets
//!
//! A block is attributed to one daily and one monthly bucket by its UTC
//! timestamp. Buckets are formatted to their string keys only when they
//! hit storage or output.

use anyhow::{Context, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Bucket granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    Daily,
    Monthly,
}

impl BucketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketKind::Daily => "daily",
            BucketKind::Monthly => "monthly",
        }
    }
}

impl fmt::Display for BucketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BucketKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "daily" => Ok(BucketKind::Daily),
            "monthly" => Ok(BucketKind::Monthly),
            other => anyhow::bail!("Unknown bucket kind '{}' (expected daily or monthly)", other),
        }
    }
}

/// A calendar day or calendar month in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Bucket {
    Daily(NaiveDate),
    Monthly { year: i32, month: u32 },
}

impl Bucket {
    /// Day containing `ts`.
    pub fn daily(ts: DateTime<Utc>) -> Self {
        Bucket::Daily(ts.date_naive())
    }

    /// Month containing `ts`.
    pub fn monthly(ts: DateTime<Utc>) -> Self {
        Bucket::Monthly {
            year: ts.year(),
            month: ts.month(),
        }
    }

    pub fn kind(&self) -> BucketKind {
        match self {
            Bucket::Daily(_) => BucketKind::Daily,
            Bucket::Monthly { .. } => BucketKind::Monthly,
        }
    }

    /// Storage key: `YYYY-MM-DD` for days, `YYYY-MM` for months.
    pub fn key(&self) -> String {
        match self {
            Bucket::Daily(date) => date.format("%Y-%m-%d").to_string(),
            Bucket::Monthly { year, month } => format!("{:04}-{:02}", year, month),
        }
    }

    /// Parse a key produced by [`Bucket::key`].
    pub fn parse(kind: BucketKind, key: &str) -> Result<Self> {
        match kind {
            BucketKind::Daily => {
                let date = NaiveDate::parse_from_str(key, "%Y-%m-%d")
                    .with_context(|| format!("Invalid daily key: {}", key))?;
                Ok(Bucket::Daily(date))
            }
            BucketKind::Monthly => {
                // Validate through a full date so "2024-13" is rejected.
                let date = NaiveDate::parse_from_str(&format!("{}-01", key), "%Y-%m-%d")
                    .with_context(|| format!("Invalid monthly key: {}", key))?;
                Ok(Bucket::Monthly {
                    year: date.year(),
                    month: date.month(),
                })
            }
        }
    }

    /// Parse a key, inferring the kind from its shape.
    pub fn parse_any(key: &str) -> Result<Self> {
        match key.len() {
            10 => Self::parse(BucketKind::Daily, key),
            7 => Self::parse(BucketKind::Monthly, key),
            _ => anyhow::bail!("Key '{}' is neither YYYY-MM-DD nor YYYY-MM", key),
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.key())
    }
}
