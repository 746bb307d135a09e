use std::collections::BTreeMap;

use csv::ReaderBuilder;
use serde::Serialize;
use serde_json::Value;

use super::pipeline;

/// Board members that can own a trip. Empty string means unassigned.
pub const ASSIGNEES: [&str; 4] = ["Justin", "Caz", "Greg", "CJ"];

/// Destination states that get flagged for special handling.
pub const SPECIAL_DESTS: [&str; 6] = ["CA", "NV", "NJ", "NY", "CO", "MA"];

/// Traveler roster whose trips count as ambassador trips. Matched by
/// substring, since the sheet pads names with middle names and suffixes.
pub const AMBASSADORS: &[&str] = &[
    "Gabriela",
    "Endara",
    "Jose Arroyo",
    "Andres Alvarez",
    "Gianni Bloise",
    "Genesis Ronquillo",
    "Martha Aguirre",
    "Paola Salcan",
    "Karen Chapman",
    "Daniel Molineros",
    "Veronica Endara",
    "Delia Vera",
    "Milton Jijon",
    "Kenia Jimenez",
    "Carlos Matute",
    "Andrea Martinez",
    "Delicia Rodriguez",
    "Mendez",
    "Vuelo de carga",
    "Daniel Lliguicota",
    "Romina Campodonico",
    "Jeampiero",
    "Isabella Piedrahita",
    "Juan C Chevrasco",
    "Nicole Matamoros",
    "Fabricio Triviño",
    "Freddy Arboleda",
    "David Muzzio",
    "Ruliova",
    "Darwin Parrales",
    "Eva Novotona",
    "Jorge Alejandro",
    "Josue Alejandro",
    "Betty Lastre",
    "Priscila Alejandro",
    "Jeniffer Zambrano",
    "Alison Fajardo",
    "Wesley Triviño",
    "Leonardo Pauta",
    "Ornella Bloise",
    "Erick Pauta",
    "Bruno Pagnacco",
    "Katy Valdivieso",
    "Eddy Vera",
];

const KEY_TRIP_ID: &str = "Trip ID";
const KEY_TRAVELER: &str = "Traveler";
const KEY_DESTINATION: &str = "USA Dest";
const KEY_SHIP_BUNDLE: &str = "Ship Bundle";
const KEY_ITEMS_ACCEPTED: &str = "Items Accepted";
const KEY_WEIGHT: &str = "Weight";
const KEY_MAX_USA_DATE: &str = "Max USA Date";
const KEY_NOTES: &str = "Notes";
const KEY_VERIFICATION_STATUS: &str = "Trip Verification Status";
const KEY_ORIGINAL_STATUS: &str = "originalStatus";
const KEY_BOARD_STATUS: &str = "boardStatus";
const KEY_ASSIGNED_TO: &str = "assignedTo";
const KEY_LEGACY_STATUS: &str = "currentStatus";

const KNOWN_KEYS: [&str; 13] = [
    KEY_TRIP_ID,
    KEY_TRAVELER,
    KEY_DESTINATION,
    KEY_SHIP_BUNDLE,
    KEY_ITEMS_ACCEPTED,
    KEY_WEIGHT,
    KEY_MAX_USA_DATE,
    KEY_NOTES,
    KEY_VERIFICATION_STATUS,
    KEY_ORIGINAL_STATUS,
    KEY_BOARD_STATUS,
    KEY_ASSIGNED_TO,
    KEY_LEGACY_STATUS,
];

/// One record as it arrives from a CSV row or a stored payload, before
/// normalization. Keys are column headers / JSON keys verbatim.
pub type RawRecord = BTreeMap<String, Value>;

/// A trip on the board. Wire names match the original CSV headers so data
/// written by older deployments stays readable, with the three
/// board-progress fields (`originalStatus`, `boardStatus`, `assignedTo`)
/// alongside them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    #[serde(rename = "Trip ID")]
    pub trip_id: String,
    #[serde(rename = "Traveler", skip_serializing_if = "Option::is_none")]
    pub traveler: Option<String>,
    #[serde(rename = "USA Dest", skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(rename = "Ship Bundle", skip_serializing_if = "Option::is_none")]
    pub ship_bundle: Option<String>,
    #[serde(rename = "Items Accepted", skip_serializing_if = "Option::is_none")]
    pub items_accepted: Option<String>,
    #[serde(rename = "Weight", skip_serializing_if = "Option::is_none")]
    pub weight: Option<String>,
    #[serde(rename = "Max USA Date", skip_serializing_if = "Option::is_none")]
    pub max_usa_date: Option<String>,
    #[serde(rename = "Notes", skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "originalStatus")]
    pub original_status: String,
    #[serde(rename = "boardStatus")]
    pub board_status: String,
    #[serde(rename = "assignedTo")]
    pub assigned_to: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Trip {
    /// Builds a trip from a raw record. Missing fields fall back in a fixed
    /// order:
    ///
    /// - `originalStatus`: stored value, else the `Trip Verification Status`
    ///   CSV column, else the legacy `currentStatus` key, else the first
    ///   pipeline stage.
    /// - `boardStatus`: stored value, else legacy `currentStatus`, else
    ///   whatever `originalStatus` resolved to.
    /// - `assignedTo`: stored value, else unassigned.
    ///
    /// The id and both statuses are trimmed; every other field is kept
    /// verbatim. Unrecognized keys pass through untouched in `extra`.
    pub fn from_raw(raw: &RawRecord) -> Self {
        let original_status = status_field(raw, KEY_ORIGINAL_STATUS)
            .or_else(|| status_field(raw, KEY_VERIFICATION_STATUS))
            .or_else(|| status_field(raw, KEY_LEGACY_STATUS))
            .unwrap_or_else(|| pipeline::first_stage().to_string());
        let board_status = status_field(raw, KEY_BOARD_STATUS)
            .or_else(|| status_field(raw, KEY_LEGACY_STATUS))
            .unwrap_or_else(|| original_status.clone());

        Trip {
            trip_id: text_field(raw, KEY_TRIP_ID)
                .map(|id| id.trim().to_string())
                .unwrap_or_default(),
            traveler: text_field(raw, KEY_TRAVELER),
            destination: text_field(raw, KEY_DESTINATION),
            ship_bundle: text_field(raw, KEY_SHIP_BUNDLE),
            items_accepted: text_field(raw, KEY_ITEMS_ACCEPTED),
            weight: text_field(raw, KEY_WEIGHT),
            max_usa_date: text_field(raw, KEY_MAX_USA_DATE),
            notes: text_field(raw, KEY_NOTES),
            original_status,
            board_status,
            assigned_to: text_field(raw, KEY_ASSIGNED_TO).unwrap_or_default(),
            extra: passthrough(raw),
        }
    }

    /// Re-applies the defaulting rules to an already-built trip. Used before
    /// merging so entries that predate the current rules still satisfy them.
    pub fn normalized(mut self) -> Self {
        self.trip_id = self.trip_id.trim().to_string();
        self.original_status = non_blank(&self.original_status)
            .unwrap_or_else(|| pipeline::first_stage().to_string());
        self.board_status =
            non_blank(&self.board_status).unwrap_or_else(|| self.original_status.clone());
        self
    }

    pub fn stage(&self) -> &'static str {
        pipeline::canonical_stage(&self.board_status)
    }

    pub fn stage_index(&self) -> usize {
        pipeline::stage_index(&self.board_status).unwrap_or(0)
    }

    pub fn items(&self) -> Option<i64> {
        self.items_accepted.as_deref().and_then(lenient_int)
    }

    pub fn weight_value(&self) -> Option<f64> {
        self.weight.as_deref().and_then(lenient_float)
    }

    pub fn has_notes(&self) -> bool {
        self.notes
            .as_deref()
            .map(|notes| !notes.trim().is_empty())
            .unwrap_or(false)
    }

    pub fn is_special_destination(&self) -> bool {
        self.destination
            .as_deref()
            .map(|dest| SPECIAL_DESTS.contains(&dest.trim().to_uppercase().as_str()))
            .unwrap_or(false)
    }

    pub fn is_ambassador(&self) -> bool {
        self.traveler
            .as_deref()
            .map(|traveler| AMBASSADORS.iter().any(|name| traveler.contains(name)))
            .unwrap_or(false)
    }

    /// The approved side of the KPI split: exactly the "TX Approved"
    /// stage, any case. Every other status counts as pending there.
    pub fn is_approved(&self) -> bool {
        self.board_status.eq_ignore_ascii_case("TX Approved")
    }

    /// Statuses containing "pending" (any case) count toward the
    /// ready-to-process total.
    pub fn has_pending_status(&self) -> bool {
        self.board_status.to_lowercase().contains("pending")
    }
}

/// Parses a pasted CSV sheet (header row first) into raw records. Rows are
/// ragged in the wild, so short and long rows are both tolerated; lines
/// with nothing in them are dropped.
pub fn records_from_csv(text: &str) -> Result<Vec<RawRecord>, csv::Error> {
    let mut reader = ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let mut raw = RawRecord::new();
        for (index, field) in record.iter().enumerate() {
            let Some(header) = headers.get(index) else {
                continue;
            };
            if header.trim().is_empty() {
                continue;
            }
            raw.insert(header.to_string(), Value::String(field.to_string()));
        }
        rows.push(raw);
    }
    Ok(rows)
}

fn text_field(raw: &RawRecord, key: &str) -> Option<String> {
    match raw.get(key)? {
        Value::String(text) => Some(text.clone()),
        // legacy boards stored some ids and counts as JSON numbers
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn status_field(raw: &RawRecord, key: &str) -> Option<String> {
    text_field(raw, key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn passthrough(raw: &RawRecord) -> BTreeMap<String, Value> {
    // currentStatus is consumed by the status fallbacks; passing it through
    // would resurrect a stale status on the next read.
    raw.iter()
        .filter(|(key, _)| !KNOWN_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Integer prefix of a string, `parseInt` style: leading whitespace and an
/// optional sign, then as many digits as are there. `"12 pcs"` is 12,
/// `"abc"` is nothing.
pub fn lenient_int(value: &str) -> Option<i64> {
    let rest = value.trim_start();
    let (negative, rest) = match rest.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, rest.strip_prefix('+').unwrap_or(rest)),
    };
    let end = rest
        .as_bytes()
        .iter()
        .take_while(|byte| byte.is_ascii_digit())
        .count();
    if end == 0 {
        return None;
    }
    rest[..end]
        .parse::<i64>()
        .ok()
        .map(|parsed| if negative { -parsed } else { parsed })
}

/// Float prefix of a string, `parseFloat` style: sign, digits, at most one
/// decimal point. `"30.5kg"` is 30.5.
pub fn lenient_float(value: &str) -> Option<f64> {
    let rest = value.trim_start();
    let bytes = rest.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut seen_digit = false;
    let mut seen_dot = false;
    while end < bytes.len() {
        match bytes[end] {
            digit if digit.is_ascii_digit() => {
                seen_digit = true;
                end += 1;
            }
            b'.' if !seen_dot => {
                seen_dot = true;
                end += 1;
            }
            _ => break,
        }
    }
    if !seen_digit {
        return None;
    }
    rest[..end].parse::<f64>().ok()
}
