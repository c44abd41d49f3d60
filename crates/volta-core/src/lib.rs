pub mod api;
pub mod catalog;
pub mod config;
pub mod explorer;
pub mod meter;
pub mod selection;
pub mod watch;

pub use api::{ApiError, HttpVoltaApi, VoltaApi};
pub use catalog::{Catalog, Site, Station};
pub use config::ClientConfig;
pub use explorer::{Explorer, ExplorerError, StationStatus};
pub use meter::{format_duration, watch_enabled, Availability, MeterState, MeterStatus, WeeklyUsage, DAYS};
pub use selection::{Level, Preselect, Selection, SelectionError};
pub use watch::{WatchEvent, WatchMonitor, WatchToggle};
