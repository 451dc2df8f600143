//! Console output helpers for the `provision` CLI.

use colored::Colorize;

use crate::providers::{Region, ServerSize, SnapshotInfo};
use crate::state::{PendingCreation, ServerRecord};

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(70).bright_black());
    println!();
}

/// Print a step indicator with message.
pub fn print_step(message: &str) {
    println!("{} {}", "▶".cyan(), message.bold());
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print an aligned key/value line.
pub fn print_field(key: &str, value: &str) {
    println!("  {:<12} {}", format!("{key}:").bright_black(), value);
}

/// Print one server record.
pub fn print_record(record: &ServerRecord) {
    println!("{}", record.name.cyan().bold());
    print_field("ID", &record.id);
    print_field("Vendor", record.vendor.as_str());
    print_field("IP", &record.ip);
    print_field("Region", &record.region);
    print_field("Size", &record.size);
    print_field("Mode", &record.mode.to_string());
    print_field("Created", &record.created_at.to_rfc3339());
}

/// Print a region list.
pub fn print_regions(regions: &[Region]) {
    for region in regions {
        println!("  {:<16} {}", region.id.cyan(), region.name);
    }
}

/// Print a size list.
pub fn print_sizes(sizes: &[ServerSize]) {
    for size in sizes {
        #[allow(clippy::cast_precision_loss)]
        let memory_gb = size.memory_mb as f64 / 1024.0;
        println!(
            "  {:<20} {:>3} vCPU {:>6.1} GB RAM {:>5} GB disk  {}",
            size.id.cyan(),
            size.vcpus,
            memory_gb,
            size.disk_gb,
            size.price_monthly.green()
        );
    }
}

/// Print a snapshot list.
pub fn print_snapshots(snapshots: &[SnapshotInfo]) {
    if snapshots.is_empty() {
        print_info("No snapshots found");
        return;
    }
    for snap in snapshots {
        println!(
            "  {:<14} {:<28} {:<12} {:>8.1} GB  {}  {}",
            snap.id.cyan(),
            snap.name,
            snap.status,
            snap.size_gb,
            snap.created_at.bright_black(),
            snap.monthly_cost
        );
    }
}

/// Print leftover journal entries.
pub fn print_pending(entries: &[PendingCreation]) {
    if entries.is_empty() {
        print_success("No unrecorded server creations");
        return;
    }
    print_warning(&format!(
        "{} creation(s) started but never recorded; check the vendor console for orphaned servers",
        entries.len()
    ));
    for entry in entries {
        println!(
            "  {} {} {} {}/{} {}",
            entry.run_id.bright_black(),
            entry.vendor.as_str().cyan(),
            entry.name.bold(),
            entry.region,
            entry.size,
            entry.started_at.to_rfc3339().bright_black()
        );
    }
}
