use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Display labels for the weekly histogram, Monday-first.
pub const DAYS: [&str; 7] = ["Mon", "Tues", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Ten-minute usage buckets per day.
pub const BUCKETS_PER_DAY: usize = 144;

const BUCKETS_PER_BAR: usize = 12;

/// Two-hour bars per charted day.
pub const BARS_PER_DAY: usize = BUCKETS_PER_DAY / BUCKETS_PER_BAR;

/// A charge running longer than this is flagged as stalled.
const LONG_CHARGE_SECS: u64 = 7200;

/// Coarse availability reported per meter. Strings the service invents
/// beyond the documented three decode to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    InUse,
    PluggedIn,
    Unknown,
}

impl Availability {
    pub fn label(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InUse => "in use",
            Self::PluggedIn => "plugged in...",
            Self::Unknown => "unknown",
        }
    }
}

impl<'de> Deserialize<'de> for Availability {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(match raw.as_str() {
            "available" => Self::Available,
            "in use" => Self::InUse,
            "plugged in..." => Self::PluggedIn,
            _ => Self::Unknown,
        })
    }
}

impl Serialize for Availability {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Charger-reported state flag. Only `ChargeStopped` changes client
/// behavior; everything undocumented collapses into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterState {
    Idle,
    PluggedOut,
    PluggedIn,
    Charging,
    ChargeStopped,
    #[serde(other)]
    Other,
}

/// Running mean of in-use durations, maintained server side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cnt: u64,
    #[serde(default)]
    pub avg: f64,
}

/// Seven days of ten-minute usage counts, Monday-first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeeklyUsage(pub Vec<Vec<u32>>);

impl WeeklyUsage {
    /// Collapse one day's buckets into two-hour bars labelled by their
    /// starting clock hour. Out-of-range days and short rows chart as zero.
    pub fn day_histogram(&self, day: usize) -> Vec<(String, u64)> {
        let empty = Vec::new();
        let buckets = self.0.get(day).unwrap_or(&empty);
        (0..BARS_PER_DAY)
            .map(|bar| {
                let sum = buckets
                    .iter()
                    .skip(bar * BUCKETS_PER_BAR)
                    .take(BUCKETS_PER_BAR)
                    .map(|&count| u64::from(count))
                    .sum();
                (hour_label(bar * 2), sum)
            })
            .collect()
    }
}

fn hour_label(hour: usize) -> String {
    let (clock, suffix) = match hour % 24 {
        0 => (12, "a"),
        h @ 1..=11 => (h, "a"),
        12 => (12, "p"),
        h => (h - 12, "p"),
    };
    format!("{clock}{suffix}")
}

/// Live status for a single meter as served by `/meters/{ids}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeterStatus {
    pub availability: Availability,
    #[serde(default)]
    pub state: Option<MeterState>,
    #[serde(default)]
    pub charge_duration: u64,
    #[serde(default)]
    pub in_use_charging_stats: UsageStats,
    #[serde(
        default,
        rename = "in_use_stopped_stats",
        alias = "in_use_idle_stats"
    )]
    pub squat_stats: UsageStats,
    #[serde(default)]
    pub weekly_usage: WeeklyUsage,
}

impl MeterStatus {
    /// Occupied, whether or not current is flowing.
    pub fn is_busy(&self) -> bool {
        matches!(self.availability, Availability::InUse | Availability::PluggedIn)
    }

    /// Charging stopped at the charger, or the session has run past the
    /// two-hour mark.
    pub fn charge_stalled(&self) -> bool {
        self.state == Some(MeterState::ChargeStopped) || self.charge_duration > LONG_CHARGE_SECS
    }

    /// Current charge as a fraction of the two-hour mark, capped at full.
    pub fn charge_progress(&self) -> f64 {
        (self.charge_duration as f64 / LONG_CHARGE_SECS as f64).min(1.0)
    }
}

/// The "enable watch" flag for a station: every meter busy. An available
/// or unknown meter means there is nothing to wait for.
pub fn watch_enabled(meters: &[MeterStatus]) -> bool {
    !meters.is_empty() && meters.iter().all(MeterStatus::is_busy)
}

/// `0 -> "0sec"`, `90 -> "1min"`, `3661 -> "1hr 1min"`. Seconds only show
/// for sub-minute totals.
pub fn format_duration(total_secs: u64) -> String {
    let hrs = total_secs / 3600;
    let mins = (total_secs / 60) % 60;
    let secs = total_secs % 60;

    if hrs == 0 && mins == 0 {
        return format!("{secs}sec");
    }

    let mut parts = Vec::new();
    if hrs > 0 {
        parts.push(format!("{hrs}hr"));
    }
    if mins > 0 {
        parts.push(format!("{mins}min"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::{
        format_duration, watch_enabled, Availability, MeterState, MeterStatus, WeeklyUsage,
        BARS_PER_DAY, BUCKETS_PER_DAY,
    };

    fn meter(availability: Availability) -> MeterStatus {
        MeterStatus {
            availability,
            state: None,
            charge_duration: 0,
            in_use_charging_stats: Default::default(),
            squat_stats: Default::default(),
            weekly_usage: Default::default(),
        }
    }

    #[test]
    fn decodes_documented_availability_strings() {
        let json = r#"[
            {"availability": "available"},
            {"availability": "in use"},
            {"availability": "plugged in..."},
            {"availability": "out of service"}
        ]"#;
        let meters: Vec<MeterStatus> = serde_json::from_str(json).expect("meters");

        assert_eq!(meters[0].availability, Availability::Available);
        assert_eq!(meters[1].availability, Availability::InUse);
        assert_eq!(meters[2].availability, Availability::PluggedIn);
        assert_eq!(meters[3].availability, Availability::Unknown);
    }

    #[test]
    fn accepts_backend_alias_for_squat_stats() {
        let json = r#"{
            "availability": "in use",
            "state": "charging",
            "charge_duration": 600,
            "in_use_charging_stats": {"start": null, "cnt": 3, "avg": 1800.0},
            "in_use_idle_stats": {"start": null, "cnt": 2, "avg": 900.0}
        }"#;
        let status: MeterStatus = serde_json::from_str(json).expect("meter");

        assert_eq!(status.state, Some(MeterState::Charging));
        assert_eq!(status.squat_stats.cnt, 2);
        assert_eq!(status.squat_stats.avg, 900.0);
    }

    #[test]
    fn undocumented_state_decodes_to_other() {
        let json = r#"{"availability": "unknown", "state": "old data"}"#;
        let status: MeterStatus = serde_json::from_str(json).expect("meter");

        assert_eq!(status.state, Some(MeterState::Other));
    }

    #[test]
    fn busy_covers_in_use_and_plugged_in_only() {
        assert!(meter(Availability::InUse).is_busy());
        assert!(meter(Availability::PluggedIn).is_busy());
        assert!(!meter(Availability::Available).is_busy());
        assert!(!meter(Availability::Unknown).is_busy());
    }

    #[test]
    fn stalled_on_charge_stopped_or_long_session() {
        let mut stopped = meter(Availability::InUse);
        stopped.state = Some(MeterState::ChargeStopped);
        assert!(stopped.charge_stalled());

        let mut long = meter(Availability::InUse);
        long.charge_duration = 7201;
        assert!(long.charge_stalled());

        let mut fine = meter(Availability::InUse);
        fine.charge_duration = 7200;
        fine.state = Some(MeterState::Charging);
        assert!(!fine.charge_stalled());
    }

    #[test]
    fn watch_needs_every_meter_busy() {
        assert!(watch_enabled(&[
            meter(Availability::InUse),
            meter(Availability::PluggedIn)
        ]));
        assert!(!watch_enabled(&[
            meter(Availability::InUse),
            meter(Availability::Available)
        ]));
        assert!(!watch_enabled(&[
            meter(Availability::InUse),
            meter(Availability::Unknown)
        ]));
        assert!(!watch_enabled(&[]));
    }

    #[test]
    fn charge_progress_caps_at_the_two_hour_mark() {
        let mut status = meter(Availability::InUse);
        status.charge_duration = 3600;
        assert_eq!(status.charge_progress(), 0.5);

        status.charge_duration = 10_000;
        assert_eq!(status.charge_progress(), 1.0);
    }

    #[test]
    fn histogram_sums_two_hour_windows() {
        let mut week = vec![vec![0_u32; BUCKETS_PER_DAY]; 7];
        week[2][0] = 1;
        week[2][11] = 2;
        week[2][12] = 5;
        week[2][143] = 7;
        let usage = WeeklyUsage(week);

        let bars = usage.day_histogram(2);
        assert_eq!(bars.len(), BARS_PER_DAY);
        assert_eq!(bars[0], ("12a".to_string(), 3));
        assert_eq!(bars[1], ("2a".to_string(), 5));
        assert_eq!(bars[6].0, "12p");
        assert_eq!(bars[11], ("10p".to_string(), 7));
    }

    #[test]
    fn histogram_tolerates_missing_data() {
        let usage = WeeklyUsage(vec![vec![4_u32; 10]]);

        assert!(usage.day_histogram(6).iter().all(|(_, count)| *count == 0));
        let partial = usage.day_histogram(0);
        assert_eq!(partial[0].1, 40);
        assert_eq!(partial[1].1, 0);
    }

    #[test]
    fn formats_durations_like_the_network_site() {
        assert_eq!(format_duration(0), "0sec");
        assert_eq!(format_duration(59), "59sec");
        assert_eq!(format_duration(90), "1min");
        assert_eq!(format_duration(3600), "1hr");
        assert_eq!(format_duration(3661), "1hr 1min");
        assert_eq!(format_duration(7322), "2hr 2min");
    }
}
