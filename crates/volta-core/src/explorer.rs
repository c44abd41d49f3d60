use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::api::{ApiError, VoltaApi};
use crate::catalog::{Catalog, Station};
use crate::config::ClientConfig;
use crate::meter::{self, MeterStatus};
use crate::selection::{Level, Preselect, Selection, SelectionError};
use crate::watch::{WatchEvent, WatchMonitor, WatchToggle};

/// A station with its most recently fetched meter statuses.
#[derive(Debug, Clone, Serialize)]
pub struct StationStatus {
    pub name: String,
    pub meters: Vec<MeterStatus>,
}

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("api error: {0}")]
    Api(#[from] ApiError),
    #[error("{0}")]
    Selection(#[from] SelectionError),
    #[error("site catalog not loaded")]
    NoCatalog,
}

/// Drives one browsing session: the catalog, the four-level selection,
/// the loaded station statuses for the active site, and the watch.
pub struct Explorer<A> {
    api: Arc<A>,
    catalog: Option<Catalog>,
    selection: Selection,
    stations: Vec<StationStatus>,
    watch: WatchMonitor,
}

impl<A: VoltaApi + 'static> Explorer<A> {
    pub fn new(api: A, config: &ClientConfig) -> Self {
        Self {
            api: Arc::new(api),
            catalog: None,
            selection: Selection::default(),
            stations: Vec::new(),
            watch: WatchMonitor::new(config.watch_interval),
        }
    }

    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_ref()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn stations(&self) -> &[StationStatus] {
        &self.stations
    }

    pub fn watch(&self) -> &WatchMonitor {
        &self.watch
    }

    /// Fetch `/sites` once for the session, then apply pre-selections and
    /// the initial auto-select cascade. Returns the pre-selection values
    /// that matched no option.
    pub async fn load_catalog(
        &mut self,
        requested: &Preselect,
    ) -> Result<Vec<(Level, String)>, ExplorerError> {
        let catalog = self.api.fetch_catalog().await?;
        info!(states = catalog.states().len(), "loaded site catalog");

        self.selection = Selection::default();
        self.stations.clear();
        self.watch.on_selection_changed(&self.selection);

        self.selection.auto_select(&catalog);
        let missed = self.selection.preselect(&catalog, requested);
        self.catalog = Some(catalog);

        if self.selection.site().is_some() {
            self.reload_site().await?;
        }
        Ok(missed)
    }

    /// Drive the selection machine. Resolving a site fans out one meter
    /// fetch per station and joins them all before the list is usable;
    /// a selection that moves off the watched station disarms the watch.
    pub async fn select(&mut self, level: Level, name: &str) -> Result<(), ExplorerError> {
        {
            let catalog = self.catalog.as_ref().ok_or(ExplorerError::NoCatalog)?;
            self.selection.select(catalog, level, name)?;
        }

        if level < Level::Station {
            if self.selection.site().is_some() {
                self.reload_site().await?;
            } else {
                self.stations.clear();
            }
        }

        self.watch.on_selection_changed(&self.selection);
        Ok(())
    }

    /// Statuses for the currently selected station, if loaded.
    pub fn station_status(&self) -> Option<&StationStatus> {
        let name = self.selection.station()?;
        self.stations.iter().find(|status| status.name == name)
    }

    /// The selected station's "enable watch" flag.
    pub fn watch_enabled(&self) -> bool {
        self.station_status()
            .map(|status| meter::watch_enabled(&status.meters))
            .unwrap_or(false)
    }

    /// Toggle the watch. Arming re-polls the station immediately, so a
    /// station that freed in the meantime dismisses straight away.
    pub async fn toggle_watch(
        &mut self,
        now: Instant,
    ) -> Result<(WatchToggle, Option<WatchEvent>), ExplorerError> {
        let toggle = self.watch.toggle(&self.selection, self.watch_enabled(), now);
        let mut event = None;
        if toggle == WatchToggle::Started {
            info!(
                station = self.selection.station().unwrap_or_default(),
                "watch armed"
            );
            self.refresh_watched().await?;
            event = self.watch.observe(&self.selection, self.watch_enabled());
        }
        Ok((toggle, event))
    }

    /// Unconditional watch re-poll: refresh the watched station's meters
    /// and re-evaluate. The schedule is rearmed up front, so a failed
    /// fetch keeps the watch armed for the next interval.
    pub async fn poll_watch(&mut self, now: Instant) -> Result<Option<WatchEvent>, ExplorerError> {
        if !self.watch.is_watching() {
            return Ok(None);
        }
        self.watch.rearm(now);
        self.refresh_watched().await?;
        Ok(self.watch.observe(&self.selection, self.watch_enabled()))
    }

    /// Interval-gated variant for event loops that tick faster than the
    /// watch interval.
    pub async fn poll_watch_if_due(
        &mut self,
        now: Instant,
    ) -> Result<Option<WatchEvent>, ExplorerError> {
        if !self.watch.due(now) {
            return Ok(None);
        }
        self.poll_watch(now).await
    }

    async fn reload_site(&mut self) -> Result<(), ExplorerError> {
        self.stations.clear();

        let stations: Vec<Station> = {
            let catalog = self.catalog.as_ref().ok_or(ExplorerError::NoCatalog)?;
            let (Some(state), Some(city), Some(site)) = (
                self.selection.state(),
                self.selection.city(),
                self.selection.site(),
            ) else {
                return Ok(());
            };
            let Some(site) = catalog.site(state, city, site) else {
                return Ok(());
            };
            site.stations.clone()
        };

        debug!(count = stations.len(), "loading station meters");

        let handles: Vec<JoinHandle<Result<StationStatus, ApiError>>> = stations
            .into_iter()
            .map(|station| {
                let api = Arc::clone(&self.api);
                tokio::spawn(async move {
                    let meters = api.fetch_meters(&station.meters).await?;
                    Ok(StationStatus {
                        name: station.name,
                        meters,
                    })
                })
            })
            .collect();

        let mut loaded = Vec::with_capacity(handles.len());
        for handle in handles {
            let status = handle
                .await
                .map_err(|err| ApiError::Join(err.to_string()))??;
            loaded.push(status);
        }
        loaded.sort_by(|a, b| a.name.cmp(&b.name));

        self.stations = loaded;
        Ok(())
    }

    async fn refresh_watched(&mut self) -> Result<(), ExplorerError> {
        let Some(target) = self.watch.target().cloned() else {
            return Ok(());
        };

        let (name, meter_ids) = {
            let catalog = self.catalog.as_ref().ok_or(ExplorerError::NoCatalog)?;
            let (Some(state), Some(city), Some(site), Some(station)) = (
                target.state(),
                target.city(),
                target.site(),
                target.station(),
            ) else {
                return Ok(());
            };
            let Some(station) = catalog
                .site(state, city, site)
                .and_then(|site| site.station(station))
            else {
                return Ok(());
            };
            (station.name.clone(), station.meters.clone())
        };

        let meters = self.api.fetch_meters(&meter_ids).await?;
        debug!(station = %name, "watch poll refreshed station");

        match self.stations.iter_mut().find(|status| status.name == name) {
            Some(entry) => entry.meters = meters,
            None => {
                self.stations.push(StationStatus { name, meters });
                self.stations.sort_by(|a, b| a.name.cmp(&b.name));
            }
        }
        Ok(())
    }
}
