//! Read-only helpers the display layer uses on top of the loaded trips:
//! borough selection, table pagination and value formatting.

use crate::trip::{TripRecord, parse_timestamp};

/// Rows shown per page of the trips table.
pub const TRIPS_PER_PAGE: usize = 8;

/// Which trips the dashboard is looking at.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoroughFilter {
    #[default]
    All,
    Only(String),
}

impl BoroughFilter {
    /// `"All"` (any case) selects everything, anything else one borough.
    pub fn parse(selection: &str) -> Self {
        if selection.eq_ignore_ascii_case("all") {
            BoroughFilter::All
        } else {
            BoroughFilter::Only(selection.to_string())
        }
    }

    pub fn matches(&self, trip: &TripRecord) -> bool {
        match self {
            BoroughFilter::All => true,
            BoroughFilter::Only(borough) => trip.borough == *borough,
        }
    }

    pub fn apply(&self, trips: &[TripRecord]) -> Vec<TripRecord> {
        trips.iter().filter(|t| self.matches(t)).cloned().collect()
    }
}

/// One page of the trips table.
#[derive(Debug)]
pub struct TripPage<'a> {
    /// 1-based page number after clamping.
    pub page: usize,
    pub total_pages: usize,
    /// 1-based index of the first row shown, 0 when empty.
    pub start: usize,
    /// 1-based index of the last row shown, 0 when empty.
    pub end: usize,
    pub total: usize,
    pub rows: &'a [TripRecord],
}

/// Slices out page `page` (1-based), clamped into `1..=total_pages`.
pub fn paginate(trips: &[TripRecord], page: usize, per_page: usize) -> TripPage<'_> {
    let per_page = per_page.max(1);
    let total = trips.len();
    let total_pages = total.div_ceil(per_page);
    let page = page.clamp(1, total_pages.max(1));

    let offset = (page - 1) * per_page;
    let stop = (offset + per_page).min(total);
    let rows: &[TripRecord] = if offset < total {
        &trips[offset..stop]
    } else {
        &[]
    };

    TripPage {
        page,
        total_pages,
        start: if rows.is_empty() { 0 } else { offset + 1 },
        end: if rows.is_empty() { 0 } else { stop },
        total,
        rows,
    }
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `1234567` -> `1,234,567`
pub fn format_count(value: usize) -> String {
    group_thousands(&value.to_string())
}

/// US dollars with cents: `1234.5` -> `$1,234.50`, `-1.5` -> `-$1.50`.
pub fn format_currency(value: f64) -> String {
    format_money(value, 2)
}

/// US dollars rounded to whole dollars: `1234.75` -> `$1,235`.
pub fn format_currency_whole(value: f64) -> String {
    format_money(value, 0)
}

fn format_money(value: f64, decimals: usize) -> String {
    let formatted = format!("{:.*}", decimals, value.abs());
    let (whole, frac) = match formatted.split_once('.') {
        Some((w, f)) => (w, Some(f)),
        None => (formatted.as_str(), None),
    };

    let sign = if value < 0.0 && formatted.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
        "-"
    } else {
        ""
    };

    match frac {
        Some(f) => format!("{sign}${}.{f}", group_thousands(whole)),
        None => format!("{sign}${}", group_thousands(whole)),
    }
}

/// `3.2` -> `3.20 mi`
pub fn format_distance(miles: f64) -> String {
    format!("{miles:.2} mi")
}

/// Short pickup time such as `Jan 5, 10:00 AM`, in UTC. Unreadable
/// timestamps are shown as they are.
pub fn format_pickup_time(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt.format("%b %-d, %I:%M %p").to_string(),
        None => raw.to_string(),
    }
}
