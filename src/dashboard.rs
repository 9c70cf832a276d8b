//! Admin dashboard logic: date ranges, transaction filters, paging and
//! the derived metrics shown next to the raw records.

use std::fmt;

use chrono::{Local, NaiveDate};
use url::Url;

use crate::api::types::{Bowser, Transaction, TransactionPage, TransactionStatus, Vehicle};
use crate::config;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Dashboard sections, one per navigation tab
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DashboardSection {
    Summary,
    Transactions,
    Vehicles,
    Bowsers,
    Drivers,
}

/// Inclusive date range sent as `start_date` / `end_date`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Build a range; reversed bounds are swapped
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self { start: end, end: start }
        }
    }

    /// The `days` days leading up to `end`
    pub fn ending_on(end: NaiveDate, days: i64) -> Self {
        Self::new(end - chrono::Duration::days(days), end)
    }

    /// Default dashboard window: the last week up to today
    pub fn last_week() -> Self {
        Self::ending_on(Local::now().date_naive(), config::DEFAULT_SUMMARY_DAYS)
    }

    /// Range from optional bounds: an open end means today, an open start
    /// means the default window before `end`
    pub fn from_bounds(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Option<Self> {
        match (start, end) {
            (None, None) => None,
            (Some(start), Some(end)) => Some(Self::new(start, end)),
            (Some(start), None) => Some(Self::new(start, Local::now().date_naive())),
            (None, Some(end)) => Some(Self::ending_on(end, config::DEFAULT_SUMMARY_DAYS)),
        }
    }

    pub fn append_to(&self, url: &mut Url) {
        url.query_pairs_mut()
            .append_pair("start_date", &self.start.format(DATE_FORMAT).to_string())
            .append_pair("end_date", &self.end.format(DATE_FORMAT).to_string());
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} to {}",
            self.start.format(DATE_FORMAT),
            self.end.format(DATE_FORMAT)
        )
    }
}

/// Query for the transaction listing
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionFilter {
    pub range: Option<DateRange>,
    pub vehicle_id: Option<String>,
    pub driver_id: Option<String>,
    pub bowser_id: Option<String>,
    pub status: Option<TransactionStatus>,
    pub limit: u32,
    pub offset: u32,
}

impl Default for TransactionFilter {
    fn default() -> Self {
        Self {
            range: None,
            vehicle_id: None,
            driver_id: None,
            bowser_id: None,
            status: None,
            limit: config::TRANSACTION_PAGE_SIZE,
            offset: 0,
        }
    }
}

impl TransactionFilter {
    pub fn append_to(&self, url: &mut Url) {
        let mut pairs = url.query_pairs_mut();
        pairs
            .append_pair("limit", &self.limit.to_string())
            .append_pair("offset", &self.offset.to_string());

        if let Some(range) = &self.range {
            pairs
                .append_pair("start_date", &range.start.format(DATE_FORMAT).to_string())
                .append_pair("end_date", &range.end.format(DATE_FORMAT).to_string());
        }

        let ids = [
            ("vehicle_id", &self.vehicle_id),
            ("driver_id", &self.driver_id),
            ("bowser_id", &self.bowser_id),
        ];
        for (key, value) in ids {
            if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
                pairs.append_pair(key, value);
            }
        }

        if let Some(status) = self.status {
            pairs.append_pair("status", status.as_str());
        }
    }
}

/// Position within a paged transaction listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageInfo {
    /// 1-based index of the first row shown, 0 when there are no rows
    pub start: u64,
    pub end: u64,
    pub total: u64,
    pub has_prev: bool,
    pub has_next: bool,
}

impl PageInfo {
    pub fn new(offset: u32, limit: u32, total: u64) -> Self {
        let offset = u64::from(offset);
        let end = (offset + u64::from(limit)).min(total);
        Self {
            // Past the last row (or no rows) collapses to `end-end`
            start: if offset >= total { end } else { offset + 1 },
            end,
            total,
            has_prev: offset > 0,
            has_next: end < total,
        }
    }
}

impl fmt::Display for PageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Showing {}-{} of {}", self.start, self.end, self.total)
    }
}

/// Tracks the current page of the transaction listing.
///
/// Pages are 1-based. The pager only learns the total from the pages it is
/// given, so `next` refuses to move until a page has been recorded.
#[derive(Debug, Clone)]
pub struct TransactionPager {
    filter: TransactionFilter,
    page: u32,
    total: u64,
}

impl TransactionPager {
    pub fn new(filter: TransactionFilter) -> Self {
        Self {
            filter,
            page: 1,
            total: 0,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    fn limit(&self) -> u32 {
        self.filter.limit.max(1)
    }

    /// Jump to a page without knowing the total yet
    pub fn go_to(&mut self, page: u32) {
        self.page = page.max(1);
    }

    /// Replace the filters and return to the first page
    pub fn apply_filters(&mut self, filter: TransactionFilter) {
        self.filter = filter;
        self.page = 1;
    }

    /// Filter for the current page
    pub fn query(&self) -> TransactionFilter {
        TransactionFilter {
            limit: self.limit(),
            offset: (self.page - 1).saturating_mul(self.limit()),
            ..self.filter.clone()
        }
    }

    /// Remember the total reported with a fetched page
    pub fn record(&mut self, page: &TransactionPage) {
        self.total = page.total;
    }

    pub fn next(&mut self) -> bool {
        if u64::from(self.page) * u64::from(self.limit()) < self.total {
            self.page += 1;
            true
        } else {
            false
        }
    }

    pub fn prev(&mut self) -> bool {
        if self.page > 1 {
            self.page -= 1;
            true
        } else {
            false
        }
    }

    pub fn info(&self) -> PageInfo {
        let query = self.query();
        PageInfo::new(query.offset, query.limit, self.total)
    }
}

/// Navigation typed while browsing transactions
#[derive(Debug, Clone, PartialEq)]
pub enum PagerCommand {
    Next,
    Prev,
    /// Replace the filters; keys not given are cleared
    Filter(TransactionFilter),
    Quit,
}

/// Parse `n`, `p`, `q` or `filter key=value...`. An empty line means next.
pub fn parse_pager_command(line: &str, current: &TransactionFilter) -> Result<PagerCommand, String> {
    let mut words = line.split_whitespace();
    match words.next().map(str::to_ascii_lowercase).as_deref() {
        None | Some("n") | Some("next") => Ok(PagerCommand::Next),
        Some("p") | Some("prev") => Ok(PagerCommand::Prev),
        Some("q") | Some("quit") => Ok(PagerCommand::Quit),
        Some("f") | Some("filter") => {
            let mut filter = TransactionFilter {
                limit: current.limit,
                ..TransactionFilter::default()
            };
            let (mut start, mut end) = (None, None);

            for pair in words {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| format!("Expected key=value, got {}", pair))?;
                match key {
                    "vehicle" => filter.vehicle_id = Some(value.to_string()),
                    "driver" => filter.driver_id = Some(value.to_string()),
                    "bowser" => filter.bowser_id = Some(value.to_string()),
                    "status" => {
                        filter.status =
                            Some(<TransactionStatus as clap::ValueEnum>::from_str(value, true)?)
                    }
                    "start" | "end" => {
                        let date = NaiveDate::parse_from_str(value, DATE_FORMAT)
                            .map_err(|e| format!("Invalid date {}: {}", value, e))?;
                        if key == "start" {
                            start = Some(date);
                        } else {
                            end = Some(date);
                        }
                    }
                    other => return Err(format!("Unknown filter {}", other)),
                }
            }

            filter.range = DateRange::from_bounds(start, end);
            Ok(PagerCommand::Filter(filter))
        }
        Some(other) => Err(format!("Unknown command {}", other)),
    }
}

/// Fraction of capacity currently held, when both figures are known
pub fn fuel_fraction(level: Option<f64>, capacity: Option<f64>) -> Option<f64> {
    match (level, capacity) {
        (Some(level), Some(capacity)) if capacity > 0.0 => Some(level / capacity),
        _ => None,
    }
}

pub fn is_low_fuel(level: Option<f64>, capacity: Option<f64>) -> bool {
    fuel_fraction(level, capacity).is_some_and(|f| f < config::LOW_FUEL_RATIO)
}

impl Vehicle {
    pub fn fuel_fraction(&self) -> Option<f64> {
        fuel_fraction(self.fuel_level, self.fuel_capacity)
    }

    pub fn is_low_fuel(&self) -> bool {
        is_low_fuel(self.fuel_level, self.fuel_capacity)
    }
}

impl Bowser {
    pub fn fuel_fraction(&self) -> Option<f64> {
        fuel_fraction(self.fuel_level, self.capacity)
    }

    pub fn is_low_fuel(&self) -> bool {
        is_low_fuel(self.fuel_level, self.capacity)
    }
}

impl Transaction {
    /// Litres dispensed by the bowser but not received by the vehicle.
    /// Prefers the backend's figure over recomputing it.
    pub fn discrepancy(&self) -> Option<f64> {
        self.discrepancy
            .or(match (self.dispensed_amount, self.received_amount) {
                (Some(dispensed), Some(received)) => Some(dispensed - received),
                _ => None,
            })
    }
}
