use std::fmt;

use thiserror::Error;

use crate::catalog::Catalog;

/// The four cascading panels, outermost first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    State,
    City,
    Site,
    Station,
}

impl Level {
    pub const ALL: [Level; 4] = [Level::State, Level::City, Level::Site, Level::Station];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn deeper(self) -> Option<Level> {
        match self {
            Level::State => Some(Level::City),
            Level::City => Some(Level::Site),
            Level::Site => Some(Level::Station),
            Level::Station => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::State => "state",
            Level::City => "city",
            Level::Site => "site",
            Level::Station => "station",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no {level} named {name:?} is currently listed")]
    UnknownOption { level: Level, name: String },
}

/// Requested pre-selections, matched case-insensitively against option
/// display text. Stands in for the original URL query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preselect {
    pub state: Option<String>,
    pub city: Option<String>,
    pub site: Option<String>,
    pub station: Option<String>,
}

impl Preselect {
    fn get(&self, level: Level) -> Option<&str> {
        match level {
            Level::State => self.state.as_deref(),
            Level::City => self.city.as_deref(),
            Level::Site => self.site.as_deref(),
            Level::Station => self.station.as_deref(),
        }
    }
}

/// At most one active entry per level; selecting at level N clears every
/// deeper level, and a panel left with exactly one option selects itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    state: Option<String>,
    city: Option<String>,
    site: Option<String>,
    station: Option<String>,
}

impl Selection {
    pub fn state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.city.as_deref()
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    pub fn station(&self) -> Option<&str> {
        self.station.as_deref()
    }

    pub fn get(&self, level: Level) -> Option<&str> {
        match level {
            Level::State => self.state(),
            Level::City => self.city(),
            Level::Site => self.site(),
            Level::Station => self.station(),
        }
    }

    fn set(&mut self, level: Level, value: Option<String>) {
        match level {
            Level::State => self.state = value,
            Level::City => self.city = value,
            Level::Site => self.site = value,
            Level::Station => self.station = value,
        }
    }

    pub fn clear_from(&mut self, level: Level) {
        for lvl in Level::ALL {
            if lvl >= level {
                self.set(lvl, None);
            }
        }
    }

    /// Option names for a panel given the current ancestor selections.
    /// Station options come back name-sorted, matching the rendered list.
    pub fn options<'a>(&self, catalog: &'a Catalog, level: Level) -> Vec<&'a str> {
        match level {
            Level::State => catalog.states(),
            Level::City => self
                .state()
                .map(|state| catalog.cities(state))
                .unwrap_or_default(),
            Level::Site => match (self.state(), self.city()) {
                (Some(state), Some(city)) => catalog
                    .sites(state, city)
                    .iter()
                    .map(|site| site.name.as_str())
                    .collect(),
                _ => Vec::new(),
            },
            Level::Station => match (self.state(), self.city(), self.site()) {
                (Some(state), Some(city), Some(site)) => {
                    let mut names: Vec<&str> = catalog
                        .site(state, city, site)
                        .map(|site| {
                            site.stations
                                .iter()
                                .map(|station| station.name.as_str())
                                .collect()
                        })
                        .unwrap_or_default();
                    names.sort_unstable();
                    names
                }
                _ => Vec::new(),
            },
        }
    }

    /// Activate an option: clears every deeper level, then cascades
    /// auto-selection through panels that end up with a single option.
    pub fn select(
        &mut self,
        catalog: &Catalog,
        level: Level,
        name: &str,
    ) -> Result<(), SelectionError> {
        if !self.options(catalog, level).contains(&name) {
            return Err(SelectionError::UnknownOption {
                level,
                name: name.to_string(),
            });
        }

        self.clear_from(level);
        self.set(level, Some(name.to_string()));
        self.cascade_auto(catalog, level.deeper());
        Ok(())
    }

    /// Auto-select from the first unset level down, as on initial load.
    pub fn auto_select(&mut self, catalog: &Catalog) {
        let first_unset = Level::ALL
            .into_iter()
            .find(|level| self.get(*level).is_none());
        self.cascade_auto(catalog, first_unset);
    }

    fn cascade_auto(&mut self, catalog: &Catalog, start: Option<Level>) {
        let mut next = start;
        while let Some(level) = next {
            let options = self.options(catalog, level);
            if options.len() != 1 {
                break;
            }
            let only = options[0].to_string();
            self.set(level, Some(only));
            next = level.deeper();
        }
    }

    /// Apply pre-selections outer level first; each value is matched
    /// case-insensitively against the listed options. Returns the requests
    /// that matched nothing, so callers can surface them.
    pub fn preselect(
        &mut self,
        catalog: &Catalog,
        requested: &Preselect,
    ) -> Vec<(Level, String)> {
        let mut missed = Vec::new();
        for level in Level::ALL {
            let Some(wanted) = requested.get(level) else {
                continue;
            };
            let matched = self
                .options(catalog, level)
                .iter()
                .find(|option| option.to_lowercase() == wanted.to_lowercase())
                .map(|option| option.to_string());
            match matched {
                Some(name) => {
                    // name came from the option list, so this cannot fail
                    let _ = self.select(catalog, level, &name);
                }
                None => missed.push((level, wanted.to_string())),
            }
        }
        missed
    }
}

#[cfg(test)]
mod tests {
    use super::{Level, Preselect, Selection, SelectionError};
    use crate::catalog::Catalog;

    fn catalog() -> Catalog {
        serde_json::from_str(
            r#"{
                "ca": {
                    "san francisco": [
                        ["Ferry Building", [
                            {"name": "Ferry #1", "meters": ["m1"]},
                            {"name": "Ferry #2", "meters": ["m2"]}
                        ]],
                        ["Stonestown", [{"name": "Stonestown #1", "meters": ["m3"]}]]
                    ],
                    "oakland": [
                        ["Jack London Square", [{"name": "JLS #1", "meters": ["m4"]}]]
                    ]
                },
                "wa": {
                    "seattle": [
                        ["Pacific Place", [{"name": "Pacific #1", "meters": ["m5"]}]]
                    ]
                }
            }"#,
        )
        .expect("catalog")
    }

    #[test]
    fn selecting_a_state_clears_deeper_levels() {
        let catalog = catalog();
        let mut selection = Selection::default();

        selection.select(&catalog, Level::State, "ca").expect("state");
        selection
            .select(&catalog, Level::City, "san francisco")
            .expect("city");
        selection
            .select(&catalog, Level::Site, "Stonestown")
            .expect("site");
        assert_eq!(selection.station(), Some("Stonestown #1"));

        selection.select(&catalog, Level::State, "wa").expect("state");
        assert_eq!(selection.state(), Some("wa"));
        // wa cascades: one city, one site, one station
        assert_eq!(selection.city(), Some("seattle"));
        assert_eq!(selection.site(), Some("Pacific Place"));
        assert_eq!(selection.station(), Some("Pacific #1"));
    }

    #[test]
    fn auto_select_fires_only_on_single_option_panels() {
        let catalog = catalog();
        let mut selection = Selection::default();

        // two states listed, nothing selects itself
        selection.auto_select(&catalog);
        assert_eq!(selection.state(), None);

        selection.select(&catalog, Level::State, "ca").expect("state");
        // two cities, cascade stops immediately
        assert_eq!(selection.city(), None);

        selection
            .select(&catalog, Level::City, "san francisco")
            .expect("city");
        // two sites
        assert_eq!(selection.site(), None);

        selection
            .select(&catalog, Level::Site, "Stonestown")
            .expect("site");
        // exactly one station
        assert_eq!(selection.station(), Some("Stonestown #1"));
    }

    #[test]
    fn rejects_options_that_are_not_listed() {
        let catalog = catalog();
        let mut selection = Selection::default();

        let err = selection
            .select(&catalog, Level::State, "nv")
            .expect_err("unknown state");
        assert_eq!(
            err,
            SelectionError::UnknownOption {
                level: Level::State,
                name: "nv".to_string()
            }
        );

        // city options depend on a selected state
        let err = selection
            .select(&catalog, Level::City, "seattle")
            .expect_err("no state yet");
        assert!(matches!(err, SelectionError::UnknownOption { .. }));
    }

    #[test]
    fn station_options_are_name_sorted() {
        let catalog = catalog();
        let mut selection = Selection::default();
        selection.select(&catalog, Level::State, "ca").expect("state");
        selection
            .select(&catalog, Level::City, "san francisco")
            .expect("city");
        selection
            .select(&catalog, Level::Site, "Ferry Building")
            .expect("site");

        assert_eq!(
            selection.options(&catalog, Level::Station),
            vec!["Ferry #1", "Ferry #2"]
        );
    }

    #[test]
    fn preselect_matches_display_text_case_insensitively() {
        let catalog = catalog();
        let mut selection = Selection::default();

        let missed = selection.preselect(
            &catalog,
            &Preselect {
                state: Some("CA".to_string()),
                city: Some("San Francisco".to_string()),
                site: Some("stonestown".to_string()),
                station: None,
            },
        );

        assert!(missed.is_empty());
        assert_eq!(selection.state(), Some("ca"));
        assert_eq!(selection.city(), Some("san francisco"));
        assert_eq!(selection.site(), Some("Stonestown"));
        assert_eq!(selection.station(), Some("Stonestown #1"));
    }

    #[test]
    fn preselect_reports_values_that_match_nothing() {
        let catalog = catalog();
        let mut selection = Selection::default();

        let missed = selection.preselect(
            &catalog,
            &Preselect {
                state: Some("ca".to_string()),
                city: Some("fresno".to_string()),
                site: None,
                station: None,
            },
        );

        assert_eq!(missed, vec![(Level::City, "fresno".to_string())]);
        assert_eq!(selection.state(), Some("ca"));
        assert_eq!(selection.city(), None);
    }

    #[test]
    fn clear_from_wipes_the_level_and_everything_deeper() {
        let catalog = catalog();
        let mut selection = Selection::default();
        selection.select(&catalog, Level::State, "wa").expect("state");
        assert_eq!(selection.station(), Some("Pacific #1"));

        selection.clear_from(Level::City);
        assert_eq!(selection.state(), Some("wa"));
        assert_eq!(selection.city(), None);
        assert_eq!(selection.site(), None);
        assert_eq!(selection.station(), None);
    }
}
