use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

type CityMap = BTreeMap<String, Vec<Site>>;

/// One charging station and the meter IDs it aggregates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Station {
    pub name: String,
    pub meters: Vec<String>,
}

/// A site travels on the wire as a `[name, stations]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "SitePair")]
pub struct Site {
    pub name: String,
    pub stations: Vec<Station>,
}

#[derive(Deserialize)]
struct SitePair(String, Vec<Station>);

impl From<SitePair> for Site {
    fn from(pair: SitePair) -> Self {
        Self {
            name: pair.0,
            stations: pair.1,
        }
    }
}

impl Serialize for Site {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.name, &self.stations).serialize(serializer)
    }
}

impl Site {
    pub fn station(&self, name: &str) -> Option<&Station> {
        self.stations.iter().find(|station| station.name == name)
    }
}

/// The full `state -> city -> site` hierarchy returned by `/sites`.
/// Fetched once per session; sites are kept sorted by name within a city.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(from = "BTreeMap<String, CityMap>")]
pub struct Catalog {
    states: BTreeMap<String, CityMap>,
}

impl From<BTreeMap<String, CityMap>> for Catalog {
    fn from(mut states: BTreeMap<String, CityMap>) -> Self {
        for cities in states.values_mut() {
            for sites in cities.values_mut() {
                sites.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        Self { states }
    }
}

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.states.serialize(serializer)
    }
}

impl Catalog {
    pub fn states(&self) -> Vec<&str> {
        self.states.keys().map(String::as_str).collect()
    }

    pub fn cities(&self, state: &str) -> Vec<&str> {
        self.states
            .get(state)
            .map(|cities| cities.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn sites(&self, state: &str, city: &str) -> &[Site] {
        self.states
            .get(state)
            .and_then(|cities| cities.get(city))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn site(&self, state: &str, city: &str, name: &str) -> Option<&Site> {
        self.sites(state, city).iter().find(|site| site.name == name)
    }
}

/// States render uppercased, the way the network labels them.
pub fn state_label(name: &str) -> String {
    name.to_uppercase()
}

/// Cities render title-cased.
pub fn city_label(name: &str) -> String {
    title_case(name)
}

pub fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
