//! Helpers shared by the live and static catalogs.

use tracing::debug;

use super::traits::ServerSize;
use crate::config::DeployMode;

/// Whether a size satisfies the deploy mode's memory floor.
#[must_use]
pub fn meets_floor(size: &ServerSize, mode: DeployMode) -> bool {
    size.memory_mb >= mode.memory_floor_mb()
}

/// Static fallback for a live size lookup: the mode-filtered static catalog,
/// or the whole catalog when nothing passes the floor.
#[must_use]
pub fn fallback_sizes(all: Vec<ServerSize>, mode: DeployMode) -> Vec<ServerSize> {
    let filtered: Vec<ServerSize> = all.iter().filter(|s| meets_floor(s, mode)).cloned().collect();
    if filtered.is_empty() {
        debug!(mode = %mode, "No static sizes above memory floor, returning full catalog");
        all
    } else {
        filtered
    }
}

/// Build a size entry.
pub(crate) fn size(id: &str, vcpus: u32, memory_mb: u64, disk_gb: u64, price: &str) -> ServerSize {
    ServerSize {
        id: id.to_string(),
        name: id.to_string(),
        vcpus,
        memory_mb,
        disk_gb,
        price_monthly: price.to_string(),
    }
}

/// Render a decimal price string as e.g. `€4.51`.
pub(crate) fn format_price(currency: &str, raw: &str) -> String {
    raw.trim()
        .parse::<f64>()
        .map_or_else(|_| format!("{currency}{raw}"), |p| format!("{currency}{p:.2}"))
}
