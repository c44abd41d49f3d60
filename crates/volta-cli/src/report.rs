use volta_core::catalog::{city_label, state_label, Catalog};
use volta_core::{format_duration, StationStatus};

/// Indented plain-text rendering of the full site hierarchy.
pub fn render_hierarchy(catalog: &Catalog) -> String {
    let mut out = String::new();
    for state in catalog.states() {
        out.push_str(&format!("{}\n", state_label(state)));
        for city in catalog.cities(state) {
            out.push_str(&format!("  {}\n", city_label(city)));
            for site in catalog.sites(state, city) {
                out.push_str(&format!("    {}\n", site.name));
                for station in &site.stations {
                    let meters = station.meters.len();
                    let noun = if meters == 1 { "meter" } else { "meters" };
                    out.push_str(&format!("      {} ({meters} {noun})\n", station.name));
                }
            }
        }
    }
    out
}

/// One line per meter: availability, current charge when occupied, and the
/// historical averages.
pub fn render_station(status: &StationStatus) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== {} ===\n", status.name));
    for (idx, meter) in status.meters.iter().enumerate() {
        let mut line = format!("meter {}: {:<13}", idx + 1, meter.availability.label());
        if meter.is_busy() {
            line.push_str(&format!("  current {}", format_duration(meter.charge_duration)));
            if meter.charge_stalled() {
                line.push_str(" (stalled)");
            }
        }
        line.push_str(&format!(
            "  avg charge {}  avg squat {}",
            format_duration(meter.in_use_charging_stats.avg as u64),
            format_duration(meter.squat_stats.avg as u64)
        ));
        out.push_str(&line);
        out.push('\n');
    }
    out
}
