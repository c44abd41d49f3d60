use std::time::{Duration, Instant};

use crate::selection::Selection;

/// Raised when the watched station stops being fully busy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    StationFreed { station: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum WatchState {
    Idle,
    Watching {
        target: Selection,
        next_poll: Instant,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchToggle {
    Started,
    Stopped,
    Rejected,
}

/// Re-polls a captured station selection on a fixed interval until it
/// frees up, the user toggles off, or the selection moves elsewhere.
#[derive(Debug, Clone)]
pub struct WatchMonitor {
    interval: Duration,
    state: WatchState,
}

impl WatchMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: WatchState::Idle,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_watching(&self) -> bool {
        matches!(self.state, WatchState::Watching { .. })
    }

    pub fn target(&self) -> Option<&Selection> {
        match &self.state {
            WatchState::Watching { target, .. } => Some(target),
            WatchState::Idle => None,
        }
    }

    /// Arm on a fully-selected, currently watchable station; disarm when
    /// already watching. The caller re-polls immediately after arming.
    pub fn toggle(&mut self, selection: &Selection, watchable: bool, now: Instant) -> WatchToggle {
        match self.state {
            WatchState::Watching { .. } => {
                self.state = WatchState::Idle;
                WatchToggle::Stopped
            }
            WatchState::Idle => {
                if selection.station().is_none() || !watchable {
                    return WatchToggle::Rejected;
                }
                self.state = WatchState::Watching {
                    target: selection.clone(),
                    next_poll: now + self.interval,
                };
                WatchToggle::Started
            }
        }
    }

    pub fn due(&self, now: Instant) -> bool {
        match self.state {
            WatchState::Watching { next_poll, .. } => now >= next_poll,
            WatchState::Idle => false,
        }
    }

    pub fn rearm(&mut self, now: Instant) {
        if let WatchState::Watching { next_poll, .. } = &mut self.state {
            *next_poll = now + self.interval;
        }
    }

    /// Re-evaluate after a poll. A freed station disarms the watch and
    /// raises the notification exactly once; a stale target disarms
    /// silently.
    pub fn observe(&mut self, selection: &Selection, watchable: bool) -> Option<WatchEvent> {
        let WatchState::Watching { target, .. } = &self.state else {
            return None;
        };

        if target != selection {
            self.state = WatchState::Idle;
            return None;
        }

        if watchable {
            return None;
        }

        let station = target.station().unwrap_or_default().to_string();
        self.state = WatchState::Idle;
        Some(WatchEvent::StationFreed { station })
    }

    /// Any unrelated selection change while watching resets to idle
    /// without a notification.
    pub fn on_selection_changed(&mut self, selection: &Selection) {
        if let WatchState::Watching { target, .. } = &self.state {
            if target != selection {
                self.state = WatchState::Idle;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::{WatchEvent, WatchMonitor, WatchToggle};
    use crate::catalog::Catalog;
    use crate::selection::{Level, Selection};

    const INTERVAL: Duration = Duration::from_secs(60);

    fn station_selection() -> Selection {
        let catalog: Catalog = serde_json::from_str(
            r#"{"ca": {"oakland": [["JLS", [{"name": "JLS #1", "meters": ["m1"]}]]]}}"#,
        )
        .expect("catalog");
        let mut selection = Selection::default();
        selection
            .select(&catalog, Level::State, "ca")
            .expect("cascades to the only station");
        assert_eq!(selection.station(), Some("JLS #1"));
        selection
    }

    #[test]
    fn toggle_requires_a_watchable_station() {
        let mut monitor = WatchMonitor::new(INTERVAL);
        let now = Instant::now();

        assert_eq!(
            monitor.toggle(&Selection::default(), true, now),
            WatchToggle::Rejected
        );
        assert_eq!(
            monitor.toggle(&station_selection(), false, now),
            WatchToggle::Rejected
        );
        assert_eq!(
            monitor.toggle(&station_selection(), true, now),
            WatchToggle::Started
        );
        assert!(monitor.is_watching());
        assert_eq!(
            monitor.toggle(&station_selection(), true, now),
            WatchToggle::Stopped
        );
        assert!(!monitor.is_watching());
    }

    #[test]
    fn polls_come_due_on_the_fixed_interval() {
        let mut monitor = WatchMonitor::new(INTERVAL);
        let now = Instant::now();
        monitor.toggle(&station_selection(), true, now);

        assert!(!monitor.due(now));
        assert!(!monitor.due(now + INTERVAL - Duration::from_secs(1)));
        assert!(monitor.due(now + INTERVAL));

        monitor.rearm(now + INTERVAL);
        assert!(!monitor.due(now + INTERVAL));
        assert!(monitor.due(now + INTERVAL * 2));
    }

    #[test]
    fn freed_station_disarms_and_notifies_once() {
        let mut monitor = WatchMonitor::new(INTERVAL);
        let selection = station_selection();
        monitor.toggle(&selection, true, Instant::now());

        assert_eq!(monitor.observe(&selection, true), None);
        assert!(monitor.is_watching());

        assert_eq!(
            monitor.observe(&selection, false),
            Some(WatchEvent::StationFreed {
                station: "JLS #1".to_string()
            })
        );
        assert!(!monitor.is_watching());
        assert_eq!(monitor.observe(&selection, false), None);
    }

    #[test]
    fn unrelated_selection_change_tears_down_silently() {
        let mut monitor = WatchMonitor::new(INTERVAL);
        let selection = station_selection();
        monitor.toggle(&selection, true, Instant::now());

        let mut elsewhere = selection.clone();
        elsewhere.clear_from(Level::Station);
        monitor.on_selection_changed(&elsewhere);
        assert!(!monitor.is_watching());

        // and a stale target observed mid-poll also stays silent
        monitor.toggle(&selection, true, Instant::now());
        assert_eq!(monitor.observe(&elsewhere, false), None);
        assert!(!monitor.is_watching());
    }

    #[test]
    fn reselecting_the_watched_station_keeps_the_watch() {
        let mut monitor = WatchMonitor::new(INTERVAL);
        let selection = station_selection();
        monitor.toggle(&selection, true, Instant::now());

        monitor.on_selection_changed(&selection);
        assert!(monitor.is_watching());
    }
}
