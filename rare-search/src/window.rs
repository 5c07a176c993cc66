//! Publish-time windows and their expansion/contraction.
//!
//! A [`TimeWindow`] is immutable: every resize produces a new window with
//! the same center. Windows are symmetric around their center at
//! millisecond granularity, which is finer than the second-precision
//! timestamps sent upstream.

use std::fmt;

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::SearchConfig;

const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// A contiguous publish-time interval used to bound a search call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Inclusive lower bound (`publishedAfter`).
    pub start: DateTime<Utc>,
    /// Upper bound (`publishedBefore`).
    pub end: DateTime<Utc>,
    /// Length of the window in minutes. Always positive.
    pub duration_minutes: f64,
}

impl TimeWindow {
    /// Window of `duration_minutes` centered on `center`.
    pub fn new(center: DateTime<Utc>, duration_minutes: f64) -> Self {
        let half_millis = (duration_minutes * MILLIS_PER_MINUTE / 2.0).round() as i64;
        let half = TimeDelta::try_milliseconds(half_millis).unwrap_or(TimeDelta::MAX);
        Self {
            start: center
                .checked_sub_signed(half)
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
            end: center
                .checked_add_signed(half)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            duration_minutes,
        }
    }

    /// First window of a session: the configured initial duration around `center`.
    pub fn initial(center: DateTime<Utc>, config: &SearchConfig) -> Self {
        Self::new(center, config.initial_window_minutes)
    }

    /// Midpoint of the window.
    pub fn center(&self) -> DateTime<Utc> {
        self.start + (self.end - self.start) / 2
    }

    /// Same center, duration multiplied by `factor`.
    pub fn expand(&self, factor: f64) -> Self {
        Self::new(self.center(), self.duration_minutes * factor)
    }

    /// Same center, duration multiplied by `factor` but never below
    /// `min_duration_minutes`.
    pub fn contract(&self, factor: f64, min_duration_minutes: f64) -> Self {
        let duration = (self.duration_minutes * factor).max(min_duration_minutes);
        Self::new(self.center(), duration)
    }

    /// Same center, duration capped at `max_duration_minutes`.
    pub fn clamp_to(&self, max_duration_minutes: f64) -> Self {
        if self.duration_minutes <= max_duration_minutes {
            self.clone()
        } else {
            Self::new(self.center(), max_duration_minutes)
        }
    }

    /// Cache key derived from the second-precision bounds sent upstream.
    pub fn cache_key(&self) -> String {
        format!("{}/{}", self.published_after(), self.published_before())
    }

    /// Lower bound formatted for the upstream API.
    pub fn published_after(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    /// Upper bound formatted for the upstream API.
    pub fn published_before(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} .. {} ({})",
            self.start.format("%Y-%m-%d %H:%M"),
            self.end.format("%Y-%m-%d %H:%M"),
            describe_minutes(self.duration_minutes)
        )
    }
}

/// Human-readable duration, e.g. `1 minute`, `2.5 hours`, `3 days`.
pub fn describe_minutes(minutes: f64) -> String {
    let (value, unit) = if minutes < 60.0 {
        (minutes, "minute")
    } else if minutes < 1440.0 {
        (minutes / 60.0, "hour")
    } else if minutes < 525_600.0 {
        (minutes / 1440.0, "day")
    } else {
        (minutes / 525_600.0, "year")
    };
    let rounded = (value * 10.0).round() / 10.0;
    let plural = if (rounded - 1.0).abs() < f64::EPSILON { "" } else { "s" };
    if rounded.fract() == 0.0 {
        format!("{rounded:.0} {unit}{plural}")
    } else {
        format!("{rounded:.1} {unit}{plural}")
    }
}
