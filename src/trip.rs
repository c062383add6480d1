//! Taxi trip record and the column schema used to build it.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a column's raw cell is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
}

/// Every column a [`TripRecord`] knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripField {
    VendorId,
    PickupDatetime,
    DropoffDatetime,
    PassengerCount,
    TripDistance,
    RateCode,
    StoreAndFwdFlag,
    PaymentType,
    FareAmount,
    Extra,
    MtaTax,
    TipAmount,
    TollsAmount,
    ImprovementSurcharge,
    AirportFee,
    TotalAmount,
    PickupLocationId,
    DropoffLocationId,
    DataFileYear,
    DataFileMonth,
    Borough,
}

impl TripField {
    /// Resolves a CSV header name. `imp_surcharge` is accepted as an alias of
    /// `improvement_surcharge`.
    pub fn from_header(name: &str) -> Option<Self> {
        let field = match name {
            "vendor_id" => TripField::VendorId,
            "pickup_datetime" => TripField::PickupDatetime,
            "dropoff_datetime" => TripField::DropoffDatetime,
            "passenger_count" => TripField::PassengerCount,
            "trip_distance" => TripField::TripDistance,
            "rate_code" => TripField::RateCode,
            "store_and_fwd_flag" => TripField::StoreAndFwdFlag,
            "payment_type" => TripField::PaymentType,
            "fare_amount" => TripField::FareAmount,
            "extra" => TripField::Extra,
            "mta_tax" => TripField::MtaTax,
            "tip_amount" => TripField::TipAmount,
            "tolls_amount" => TripField::TollsAmount,
            "improvement_surcharge" | "imp_surcharge" => TripField::ImprovementSurcharge,
            "airport_fee" => TripField::AirportFee,
            "total_amount" => TripField::TotalAmount,
            "pickup_location_id" => TripField::PickupLocationId,
            "dropoff_location_id" => TripField::DropoffLocationId,
            "data_file_year" => TripField::DataFileYear,
            "data_file_month" => TripField::DataFileMonth,
            "borough" => TripField::Borough,
            _ => return None,
        };
        Some(field)
    }

    pub fn kind(self) -> FieldKind {
        match self {
            TripField::PassengerCount
            | TripField::TripDistance
            | TripField::FareAmount
            | TripField::Extra
            | TripField::MtaTax
            | TripField::TipAmount
            | TripField::TollsAmount
            | TripField::ImprovementSurcharge
            | TripField::AirportFee
            | TripField::TotalAmount
            | TripField::DataFileYear
            | TripField::DataFileMonth => FieldKind::Numeric,
            _ => FieldKind::Text,
        }
    }
}

/// Coerces a raw cell into a number. Anything that does not parse as a
/// finite float, including the empty string, becomes 0.
pub fn coerce_numeric(raw: &str) -> f64 {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

const OFFSET_FORMATS: [&str; 12] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M:%S%:z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%dT%H:%M%z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M%:z",
    "%Y-%m-%d %H:%M%z",
];

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Reads an ISO-8601 style timestamp as a UTC wall-clock time.
///
/// Accepts `T` or space between date and time, minute or second precision
/// with optional fractions, and a `Z`, `+05:00` or `+0500` suffix. Offsets
/// are converted to UTC and naive values are taken as UTC. A bare date is
/// midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Some(utc) = raw.strip_suffix('Z').or_else(|| raw.strip_suffix('z')) {
        return parse_naive(utc);
    }
    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.naive_utc());
        }
    }
    parse_naive(raw)
}

fn parse_naive(raw: &str) -> Option<NaiveDateTime> {
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// One taxi trip, as read from a single CSV row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub vendor_id: String,
    pub pickup_datetime: String,
    pub dropoff_datetime: String,
    pub passenger_count: u32,
    pub trip_distance: f64,
    pub rate_code: String,
    pub store_and_fwd_flag: String,
    pub payment_type: String,

    // money
    pub fare_amount: f64,
    pub extra: f64,
    pub mta_tax: f64,
    pub tip_amount: f64,
    pub tolls_amount: f64,
    pub improvement_surcharge: f64,
    pub airport_fee: f64,
    pub total_amount: f64,

    pub pickup_location_id: String,
    pub dropoff_location_id: String,
    pub data_file_year: i32,
    pub data_file_month: i32,
    pub borough: String,

    /// Columns outside the known schema, kept verbatim.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra_columns: BTreeMap<String, String>,
}

impl TripRecord {
    /// Stores `raw` into the slot for `field`, coercing per the field's kind.
    pub fn set_field(&mut self, field: TripField, raw: &str) {
        if field.kind() == FieldKind::Numeric {
            let value = coerce_numeric(raw);
            match field {
                // `as` saturates: negatives land on 0, fractions truncate.
                TripField::PassengerCount => self.passenger_count = value as u32,
                TripField::TripDistance => self.trip_distance = value,
                TripField::FareAmount => self.fare_amount = value,
                TripField::Extra => self.extra = value,
                TripField::MtaTax => self.mta_tax = value,
                TripField::TipAmount => self.tip_amount = value,
                TripField::TollsAmount => self.tolls_amount = value,
                TripField::ImprovementSurcharge => self.improvement_surcharge = value,
                TripField::AirportFee => self.airport_fee = value,
                TripField::TotalAmount => self.total_amount = value,
                TripField::DataFileYear => self.data_file_year = value as i32,
                TripField::DataFileMonth => self.data_file_month = value as i32,
                _ => {}
            }
            return;
        }

        let value = raw.to_string();
        match field {
            TripField::VendorId => self.vendor_id = value,
            TripField::PickupDatetime => self.pickup_datetime = value,
            TripField::DropoffDatetime => self.dropoff_datetime = value,
            TripField::RateCode => self.rate_code = value,
            TripField::StoreAndFwdFlag => self.store_and_fwd_flag = value,
            TripField::PaymentType => self.payment_type = value,
            TripField::PickupLocationId => self.pickup_location_id = value,
            TripField::DropoffLocationId => self.dropoff_location_id = value,
            TripField::Borough => self.borough = value,
            _ => {}
        }
    }

    /// Pickup time in UTC, if the timestamp is readable.
    pub fn pickup_time(&self) -> Option<NaiveDateTime> {
        parse_timestamp(&self.pickup_datetime)
    }

    /// Returns a copy tagged with the given borough label.
    pub fn with_borough(mut self, borough: &str) -> Self {
        self.borough = borough.to_string();
        self
    }
}
