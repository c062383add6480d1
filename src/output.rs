//! Output formatting and persistence for dashboard snapshots.
//!
//! Supports pretty-printing, JSON serialization, a plain-text summary and a
//! page of the trips table.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::metrics::DashboardMetrics;
use crate::view::{
    TripPage, format_count, format_currency, format_currency_whole, format_distance,
    format_pickup_time,
};

/// Logs metrics using Rust's debug pretty-print format.
pub fn print_pretty(metrics: &DashboardMetrics) {
    debug!("{:#?}", metrics);
}

/// Logs metrics as pretty-printed JSON.
pub fn print_json(metrics: &DashboardMetrics) -> Result<()> {
    info!("{}", serde_json::to_string_pretty(metrics)?);
    Ok(())
}

/// Writes `value` as pretty JSON to `path`, creating parent directories.
pub fn write_json(path: &str, value: &impl Serialize) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let body = serde_json::to_vec_pretty(value)?;
    fs::write(path, body).with_context(|| format!("Failed to write {path}"))?;
    debug!(path, "Wrote JSON output");
    Ok(())
}

/// Renders the summary cards and the three breakdowns as plain text.
pub fn render_summary(metrics: &DashboardMetrics) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "NYC Yellow Taxi Analytics");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "Total Revenue      {}",
        format_currency_whole(metrics.total_revenue)
    );
    let _ = writeln!(out, "Total Trips        {}", format_count(metrics.total_trips));
    let _ = writeln!(
        out,
        "Avg Trip Distance  {}",
        format_distance(metrics.avg_trip_distance)
    );
    let _ = writeln!(
        out,
        "Average Tip        {}",
        format_currency_whole(metrics.avg_tip)
    );

    let _ = writeln!(out);
    let _ = writeln!(out, "Revenue by Borough");
    if metrics.revenue_by_borough.is_empty() {
        let _ = writeln!(out, "  (no trips)");
    }
    for b in &metrics.revenue_by_borough {
        let _ = writeln!(out, "  {:<16} {:>14}", b.borough, format_currency(b.revenue));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Trips Over Time");
    if metrics.trips_over_time.is_empty() {
        let _ = writeln!(out, "  (no trips)");
    }
    for d in &metrics.trips_over_time {
        let _ = writeln!(
            out,
            "  {}  {:>7} trips  {:>14}",
            d.date,
            format_count(d.trips),
            format_currency(d.revenue)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Payment Types");
    if metrics.payment_type_distribution.is_empty() {
        let _ = writeln!(out, "  (no trips)");
    }
    for p in &metrics.payment_type_distribution {
        let _ = writeln!(
            out,
            "  {:<16} {:>7}  {:>5.1}%",
            p.payment_type,
            format_count(p.count),
            p.percentage
        );
    }

    out
}

/// Renders one page of the trips table.
pub fn render_trips_page(page: &TripPage<'_>) -> String {
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Showing {}-{} of {} trips",
        page.start,
        page.end,
        format_count(page.total)
    );
    let _ = writeln!(
        out,
        "{:<18} {:<14} {:>10} {:>10} {:>9} {:>10}",
        "Pickup Time", "Borough", "Distance", "Fare", "Tip", "Total"
    );
    for t in page.rows {
        let _ = writeln!(
            out,
            "{:<18} {:<14} {:>10} {:>10} {:>9} {:>10}",
            format_pickup_time(&t.pickup_datetime),
            t.borough,
            format_distance(t.trip_distance),
            format_currency(t.fare_amount),
            format_currency(t.tip_amount),
            format_currency(t.total_amount)
        );
    }
    let _ = writeln!(out, "Page {} of {}", page.page, page.total_pages);

    out
}
