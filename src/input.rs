//! Command argument parsing.
//!
//! The trigger command carries free text like `"general 24h"`,
//! `"1d 2h"`, or `"sales-updates 2d #36a2eb"`. The first token is the
//! target channel unless it already looks like a timeframe, in which
//! case the channel comes from the configured default. A trailing token
//! that is not a timeframe is kept as an optional accent color.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};

static RE_TIMEFRAME_TOKEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+[dh]$").unwrap());
static RE_DAYS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)d").unwrap());
static RE_HOURS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)h").unwrap());

/// A lookback window summed from `Nd` and `Nh` tokens.
///
/// `0h` parses successfully but yields `total_hours == 0`; the pipeline
/// rejects zero-length windows separately, after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub days: u32,
    pub hours: u32,
    pub total_hours: u32,
}

impl TimeWindow {
    /// Parse a timeframe spec such as `24h`, `2d`, or `1d2h`.
    ///
    /// Fails only when the spec contains neither a day nor an hour count.
    pub fn parse(spec: &str) -> Result<Self> {
        let days = RE_DAYS
            .captures(spec)
            .and_then(|c| c[1].parse::<u32>().ok())
            .unwrap_or(0);
        let hours = RE_HOURS
            .captures(spec)
            .and_then(|c| c[1].parse::<u32>().ok())
            .unwrap_or(0);

        if !RE_DAYS.is_match(spec) && !RE_HOURS.is_match(spec) {
            return Err(Error::InvalidInput(format!(
                "invalid time format {spec:?}: use [Nd][Nh] (e.g. 1d 2h, 24h, 2d)"
            )));
        }

        Ok(TimeWindow {
            days,
            hours,
            total_hours: days * 24 + hours,
        })
    }

    /// Human label used in the summarization prompt and user messages.
    pub fn label(&self) -> String {
        if self.total_hours >= 24 {
            format!("{} days", self.total_hours / 24)
        } else {
            format!("{} hours", self.total_hours)
        }
    }
}

/// Where the report goes, plus the optional accent color token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTarget {
    pub channel: String,
    pub color: Option<String>,
}

/// Configured fallbacks applied when the command omits a field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Defaults<'a> {
    pub channel: Option<&'a str>,
    pub timeframe: Option<&'a str>,
}

/// Parse the raw command text into a target and a time window.
pub fn parse(raw: &str, defaults: &Defaults) -> Result<(ReportTarget, TimeWindow)> {
    let tokens: Vec<&str> = raw.split_whitespace().collect();
    let mut idx = 0;

    let channel = match tokens.first() {
        Some(first) if !RE_TIMEFRAME_TOKEN.is_match(first) => {
            idx = 1;
            (*first).to_string()
        }
        _ => defaults
            .channel
            .ok_or_else(|| Error::InvalidInput("no channel given and no default configured".into()))?
            .to_string(),
    };

    // Up to two timeframe tokens (one day count, one hour count),
    // concatenated before extraction.
    let mut spec = String::new();
    let mut taken = 0;
    while idx < tokens.len() && taken < 2 && RE_TIMEFRAME_TOKEN.is_match(tokens[idx]) {
        spec.push_str(tokens[idx]);
        idx += 1;
        taken += 1;
    }

    let window = if spec.is_empty() {
        let fallback = defaults.timeframe.ok_or_else(|| {
            Error::InvalidInput("no timeframe given and no default configured".into())
        })?;
        TimeWindow::parse(fallback)?
    } else {
        TimeWindow::parse(&spec)?
    };

    let color = tokens.get(idx).map(|s| (*s).to_string());

    Ok((ReportTarget { channel, color }, window))
}
