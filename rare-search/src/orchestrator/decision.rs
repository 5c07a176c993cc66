//! Window resizing policy.
//!
//! After a step finds no rare video, the number of candidates in the window
//! decides what happens next:
//!
//! | candidates                          | density    | next window              |
//! |-------------------------------------|------------|--------------------------|
//! | 0                                   | `Empty`    | aggressive expansion     |
//! | `1..=moderate_threshold`            | `Sparse`   | aggressive expansion     |
//! | `moderate_threshold+1..=busy`       | `Moderate` | moderate expansion       |
//! | `> busy_threshold`                  | `Busy`     | contraction (with floor) |

use crate::config::SearchConfig;
use crate::window::{describe_minutes, TimeWindow};

/// How populated a window was.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Density {
    /// No candidates at all (or the search call failed).
    Empty,
    /// At most `moderate_threshold` candidates.
    Sparse,
    /// More than `moderate_threshold`, at most `busy_threshold` candidates.
    Moderate,
    /// More than `busy_threshold` candidates.
    Busy,
}

impl Density {
    /// Classify a window by its candidate count.
    pub fn classify(candidates: usize, config: &SearchConfig) -> Self {
        if candidates == 0 {
            Self::Empty
        } else if candidates > config.busy_threshold {
            Self::Busy
        } else if candidates > config.moderate_threshold {
            Self::Moderate
        } else {
            Self::Sparse
        }
    }

    /// Whether the next window is larger than the current one.
    pub fn expands(self) -> bool {
        !matches!(self, Self::Busy)
    }
}

/// Next window for a step that found no rare video. Not clamped.
pub fn next_window(current: &TimeWindow, density: Density, config: &SearchConfig) -> TimeWindow {
    match density {
        Density::Empty | Density::Sparse => current.expand(config.aggressive_expansion_factor),
        Density::Moderate => current.expand(config.moderate_expansion_factor),
        Density::Busy => current.contract(config.contraction_factor, config.min_window_minutes),
    }
}

/// Status message describing the chosen resize.
pub fn resize_message(
    density: Density,
    candidates: usize,
    current: &TimeWindow,
    next: &TimeWindow,
) -> String {
    let span = describe_minutes(next.duration_minutes);
    match density {
        Density::Empty => {
            let multiple = (next.duration_minutes / current.duration_minutes).round();
            format!("No videos found. Expanding search window {multiple:.0}x to {span}.")
        }
        Density::Sparse => {
            format!("Found {candidates} videos, none rare. Expanding search window to {span}.")
        }
        Density::Moderate => format!(
            "Found {candidates} videos, none rare. Expanding search window moderately to {span}."
        ),
        Density::Busy => format!(
            "Found {candidates} videos, none rare. This period is busy, narrowing window to {span}."
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn config() -> SearchConfig {
        SearchConfig {
            busy_threshold: 50,
            moderate_threshold: 10,
            aggressive_expansion_factor: 1440.0,
            moderate_expansion_factor: 2.0,
            contraction_factor: 0.5,
            min_window_minutes: 1.0,
            ..Default::default()
        }
    }

    fn window(minutes: f64) -> TimeWindow {
        let center = DateTime::parse_from_rfc3339("2014-04-04T04:04:04Z")
            .expect("valid timestamp")
            .with_timezone(&Utc);
        TimeWindow::new(center, minutes)
    }

    #[test]
    fn classify_boundaries() {
        let config = config();
        assert_eq!(Density::classify(0, &config), Density::Empty);
        assert_eq!(Density::classify(1, &config), Density::Sparse);
        assert_eq!(Density::classify(10, &config), Density::Sparse);
        assert_eq!(Density::classify(11, &config), Density::Moderate);
        assert_eq!(Density::classify(50, &config), Density::Moderate);
        assert_eq!(Density::classify(51, &config), Density::Busy);
    }

    #[test]
    fn only_busy_windows_shrink() {
        assert!(Density::Empty.expands());
        assert!(Density::Sparse.expands());
        assert!(Density::Moderate.expands());
        assert!(!Density::Busy.expands());
    }

    #[test]
    fn empty_window_expands_aggressively() {
        let next = next_window(&window(1.0), Density::Empty, &config());
        assert!((next.duration_minutes - 1440.0).abs() < f64::EPSILON);
        assert_eq!(next.center(), window(1.0).center());
    }

    #[test]
    fn moderate_window_expands_moderately() {
        let next = next_window(&window(30.0), Density::Moderate, &config());
        assert!((next.duration_minutes - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn busy_window_contracts_to_floor() {
        let config = config();
        let next = next_window(&window(10.0), Density::Busy, &config);
        assert!((next.duration_minutes - 5.0).abs() < f64::EPSILON);
        let floored = next_window(&window(1.0), Density::Busy, &config);
        assert!((floored.duration_minutes - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_message_names_multiple() {
        let current = window(1.0);
        let next = current.expand(1440.0);
        let msg = resize_message(Density::Empty, 0, &current, &next);
        assert_eq!(msg, "No videos found. Expanding search window 1440x to 1 day.");
    }

    #[test]
    fn busy_message_mentions_count_and_narrowing() {
        let current = window(10.0);
        let next = current.contract(0.5, 1.0);
        let msg = resize_message(Density::Busy, 60, &current, &next);
        assert!(msg.contains("60 videos"));
        assert!(msg.contains("narrowing"));
        assert!(msg.contains("5 minutes"));
    }
}
