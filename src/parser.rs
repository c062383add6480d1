//! CSV parser for taxi trip exports.
//!
//! Fields are split strictly on `,`: quoting is turned off, so a value that
//! itself contains a comma shifts every following column of its row.

use csv::{ReaderBuilder, StringRecord, Terminator};
use tracing::{debug, warn};

use crate::trip::{TripField, TripRecord};

enum Column {
    Known(TripField),
    Extra(String),
}

/// Parses a comma-separated blob (first line = header) into trip records.
///
/// Never fails. Every line after the header is one record: numeric cells
/// that do not parse become 0, short rows are padded with empty cells,
/// surplus cells are dropped and an empty line yields an all-default record.
pub fn parse_trips(text: &str) -> Vec<TripRecord> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let splitter = line_splitter();
    let mut lines = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line));

    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let columns: Vec<Column> = split_line(&splitter, header)
        .iter()
        .map(|h| match TripField::from_header(h) {
            Some(field) => Column::Known(field),
            None => Column::Extra(h.to_string()),
        })
        .collect();

    let trips: Vec<TripRecord> = lines
        .map(|line| build_trip(&columns, &split_line(&splitter, line)))
        .collect();

    debug!(
        columns = columns.len(),
        rows = trips.len(),
        "Parsed trip CSV"
    );
    trips
}

fn line_splitter() -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .terminator(Terminator::Any(b'\n'))
        .buffer_capacity(1024);
    builder
}

/// Splits one line into cells. An empty line has no cells.
fn split_line(splitter: &ReaderBuilder, line: &str) -> StringRecord {
    let mut record = StringRecord::new();
    if line.is_empty() {
        return record;
    }

    let mut rdr = splitter.from_reader(line.as_bytes());
    if let Err(e) = rdr.read_record(&mut record) {
        warn!(error = %e, "Unreadable CSV line, treating it as empty");
        record.clear();
    }
    record
}

fn build_trip(columns: &[Column], record: &StringRecord) -> TripRecord {
    let mut trip = TripRecord::default();

    for (index, column) in columns.iter().enumerate() {
        let raw = record.get(index).unwrap_or("");
        match column {
            Column::Known(field) => trip.set_field(*field, raw),
            Column::Extra(name) => {
                trip.extra_columns.insert(name.clone(), raw.to_string());
            }
        }
    }

    trip
}
