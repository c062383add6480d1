//! Dashboard aggregation: reduces a batch of trips into one metrics snapshot.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::trip::{TripRecord, parse_timestamp};

/// Label used when a trip has no borough or no payment type.
pub const UNKNOWN: &str = "Unknown";

/// Revenue summed over one borough.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoroughRevenue {
    pub borough: String,
    pub revenue: f64,
}

/// Trip count and revenue for one calendar day (`YYYY-MM-DD`, UTC).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyTrips {
    pub date: String,
    pub trips: usize,
    pub revenue: f64,
}

/// Share of trips paid with one payment type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentShare {
    #[serde(rename = "type")]
    pub payment_type: String,
    pub count: usize,
    pub percentage: f64,
}

/// Aggregate snapshot over one complete trip collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardMetrics {
    pub total_revenue: f64,
    pub total_trips: usize,
    pub avg_trip_distance: f64,
    pub avg_tip: f64,
    pub revenue_by_borough: Vec<BoroughRevenue>,
    pub trips_over_time: Vec<DailyTrips>,
    pub payment_type_distribution: Vec<PaymentShare>,
}

impl DashboardMetrics {
    /// Computes every metric from scratch.
    ///
    /// With no trips the averages are 0.0 and every breakdown is empty.
    pub fn from_trips(trips: &[TripRecord]) -> Self {
        let total_trips = trips.len();

        let mut revenue = 0.0;
        let mut distance = 0.0;
        let mut tips = 0.0;
        for t in trips {
            revenue += t.total_amount;
            distance += t.trip_distance;
            tips += t.tip_amount;
        }

        DashboardMetrics {
            total_revenue: round_to(revenue, 2),
            total_trips,
            avg_trip_distance: round_to(mean(distance, total_trips), 2),
            avg_tip: round_to(mean(tips, total_trips), 2),
            revenue_by_borough: revenue_by_borough(trips),
            trips_over_time: trips_over_time(trips),
            payment_type_distribution: payment_type_distribution(trips),
        }
    }
}

/// Rounds half-up to `decimals` places, matching how the dashboard has always
/// displayed money (`-2.5` rounds to `-2`, not `-3`).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor + 0.5).floor() / factor
}

fn mean(sum: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Maps a raw payment code to its display name. Unmapped values pass through;
/// an empty value is [`UNKNOWN`].
pub fn payment_label(raw: &str) -> &str {
    match raw {
        "1" => "Credit Card",
        "2" => "Cash",
        "3" => "No Charge",
        "4" => "Dispute",
        "5" => "Unknown",
        "6" => "Voided Trip",
        "" => UNKNOWN,
        other => other,
    }
}

/// Extracts the UTC calendar date from a pickup timestamp.
pub fn pickup_date(raw: &str) -> Option<NaiveDate> {
    parse_timestamp(raw).map(|dt| dt.date())
}

/// Groups keyed values while remembering the order each key first appeared,
/// so that a stable sort breaks ties by discovery order.
struct FirstSeen<V> {
    index: HashMap<String, usize>,
    groups: Vec<(String, V)>,
}

impl<V: Default> FirstSeen<V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            groups: Vec::new(),
        }
    }

    fn entry(&mut self, key: &str) -> &mut V {
        let slot = match self.index.get(key) {
            Some(&i) => i,
            None => {
                self.groups.push((key.to_string(), V::default()));
                self.index.insert(key.to_string(), self.groups.len() - 1);
                self.groups.len() - 1
            }
        };
        &mut self.groups[slot].1
    }
}

fn revenue_by_borough(trips: &[TripRecord]) -> Vec<BoroughRevenue> {
    let mut groups: FirstSeen<f64> = FirstSeen::new();
    for t in trips {
        let borough = if t.borough.is_empty() {
            UNKNOWN
        } else {
            t.borough.as_str()
        };
        *groups.entry(borough) += t.total_amount;
    }

    let mut out: Vec<BoroughRevenue> = groups
        .groups
        .into_iter()
        .map(|(borough, revenue)| BoroughRevenue {
            borough,
            revenue: round_to(revenue, 2),
        })
        .collect();

    out.sort_by(|a, b| b.revenue.total_cmp(&a.revenue));
    out
}

fn trips_over_time(trips: &[TripRecord]) -> Vec<DailyTrips> {
    let mut days: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    let mut undated = 0usize;

    for t in trips {
        let Some(pickup) = t.pickup_time() else {
            undated += 1;
            continue;
        };
        let entry = days
            .entry(pickup.date().format("%Y-%m-%d").to_string())
            .or_default();
        entry.0 += 1;
        entry.1 += t.total_amount;
    }

    if undated > 0 {
        debug!(undated, "Trips without a readable pickup time left out of daily series");
    }

    days.into_iter()
        .map(|(date, (trips, revenue))| DailyTrips {
            date,
            trips,
            revenue: round_to(revenue, 2),
        })
        .collect()
}

fn payment_type_distribution(trips: &[TripRecord]) -> Vec<PaymentShare> {
    let total = trips.len();
    let mut counts: FirstSeen<usize> = FirstSeen::new();
    for t in trips {
        *counts.entry(payment_label(&t.payment_type)) += 1;
    }

    let mut out: Vec<PaymentShare> = counts
        .groups
        .into_iter()
        .map(|(payment_type, count)| PaymentShare {
            payment_type,
            count,
            percentage: round_to(count as f64 / total as f64 * 100.0, 1),
        })
        .collect();

    out.sort_by(|a, b| b.count.cmp(&a.count));
    out
}
