use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::models::trip::Trip;

// %y must come before %Y, which also accepts "26" and would read it as
// the literal year 26; %y in turn rejects four-digit years as trailing
// input, so both slash forms still parse
const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%m/%d/%y", "%m/%d/%Y", "%Y/%m/%d", "%B %d, %Y"];

/// Date-only parse of the loose strings found in the `Ship Bundle` column.
/// Time-of-day and zone information is dropped.
pub fn parse_date_only(raw: &str) -> Option<NaiveDate> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    if let Ok(stamp) = DateTime::parse_from_rfc3339(text) {
        return Some(stamp.date_naive());
    }
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|stamp| stamp.date())
}

/// Monday through Sunday of the week containing `date`.
pub fn week_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeShortcut {
    ThisWeek,
    NextWeek,
    AllUpcoming,
}

impl RangeShortcut {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "thisWeek" => Some(Self::ThisWeek),
            "nextWeek" => Some(Self::NextWeek),
            "allUpcoming" => Some(Self::AllUpcoming),
            _ => None,
        }
    }

    pub fn bounds(self, today: NaiveDate) -> (Option<NaiveDate>, Option<NaiveDate>) {
        match self {
            Self::ThisWeek => {
                let (monday, sunday) = week_bounds(today);
                (Some(monday), Some(sunday))
            }
            Self::NextWeek => {
                let (monday, sunday) = week_bounds(today + Duration::days(7));
                (Some(monday), Some(sunday))
            }
            Self::AllUpcoming => (Some(today), None),
        }
    }
}

/// Filter over the trip list. Date bounds are inclusive and only take
/// effect when `start` is set; a lone `end` never filtered on the original
/// board and still does not. The search term is a case-insensitive
/// substring match over id, traveler, destination and both statuses.
#[derive(Debug, Clone, Default)]
pub struct TripFilter {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub search: Option<String>,
}

impl TripFilter {
    pub fn is_date_active(&self) -> bool {
        self.start.is_some()
    }

    /// Applies the filter, preserving input order.
    pub fn apply(&self, trips: &[Trip]) -> Vec<Trip> {
        let term = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(str::to_lowercase);
        trips
            .iter()
            .filter(|trip| self.matches_dates(trip))
            .filter(|trip| match term.as_deref() {
                Some(term) => matches_term(trip, term),
                None => true,
            })
            .cloned()
            .collect()
    }

    fn matches_dates(&self, trip: &Trip) -> bool {
        let Some(start) = self.start else {
            return true;
        };
        // trips without a parseable bundle date drop out while a date
        // filter is active
        let Some(bundle) = trip.ship_bundle.as_deref().and_then(parse_date_only) else {
            return false;
        };
        match self.end {
            Some(end) => start <= bundle && bundle <= end,
            None => start <= bundle,
        }
    }
}

fn matches_term(trip: &Trip, term: &str) -> bool {
    haystacks(trip).any(|field| field.to_lowercase().contains(term))
}

fn haystacks(trip: &Trip) -> impl Iterator<Item = &str> {
    [
        Some(trip.trip_id.as_str()),
        trip.traveler.as_deref(),
        trip.destination.as_deref(),
        Some(trip.board_status.as_str()),
        Some(trip.original_status.as_str()),
    ]
    .into_iter()
    .flatten()
}
