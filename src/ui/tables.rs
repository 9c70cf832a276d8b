//! Plain-text rendering of dashboard records.

use chrono::{DateTime, NaiveDateTime};

use crate::api::types::*;
use crate::dashboard::{DateRange, PageInfo};

const NOT_AVAILABLE: &str = "N/A";

/// Group thousands and keep at most one decimal: `1234.56` -> `1,234.6`
pub fn format_number(value: f64) -> String {
    let rounded = (value * 10.0).round() / 10.0;
    let text = format!("{:.1}", rounded.abs());
    let (int_part, frac_part) = text.split_once('.').unwrap_or((text.as_str(), "0"));

    let mut out = String::with_capacity(text.len() + int_part.len() / 3 + 1);
    if rounded < 0.0 {
        out.push('-');
    }
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if frac_part != "0" {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

/// `Some(1050.0)`, `"km"` -> `1,050 km`; `None` -> `N/A`
pub fn format_quantity(value: Option<f64>, unit: &str) -> String {
    value
        .map(|v| format!("{} {}", format_number(v), unit))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Render a backend timestamp as `YYYY-MM-DD HH:MM`, or pass it through
pub fn format_timestamp(raw: Option<&str>) -> String {
    let Some(raw) = raw else {
        return NOT_AVAILABLE.to_string();
    };
    const OUT: &str = "%Y-%m-%d %H:%M";

    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.format(OUT).to_string();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(OUT).to_string();
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, pattern) {
            return dt.format(OUT).to_string();
        }
    }
    raw.to_string()
}

fn text_or_na(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}

fn fuel_cell(level: Option<f64>, capacity: Option<f64>, fraction: Option<f64>, low: bool) -> String {
    let percentage = fraction
        .map(|f| format!("{:.1}%", f * 100.0))
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let level = level.map(format_number).unwrap_or_else(|| NOT_AVAILABLE.into());
    let capacity = capacity.map(format_number).unwrap_or_else(|| NOT_AVAILABLE.into());
    let marker = if low { " LOW" } else { "" };
    format!("{} / {} L ({}){}", level, capacity, percentage, marker)
}

/// Column-aligned text table
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render(&self) -> String {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if let Some(width) = widths.get_mut(i) {
                    *width = (*width).max(cell.chars().count());
                }
            }
        }

        let line = |cells: Vec<&str>| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = vec![line(self.headers.clone())];
        out.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("  "),
        );
        for row in &self.rows {
            out.push(line(row.iter().map(String::as_str).collect()));
        }
        out.join("\n")
    }
}

fn transactions_table(transactions: &[Transaction], with_discrepancy: bool) -> String {
    let mut headers = vec!["Time", "ID", "Driver", "Vehicle", "Bowser", "Dispensed", "Received"];
    if with_discrepancy {
        headers.push("Discrepancy");
    }
    headers.push("Status");

    let mut table = Table::new(headers);
    for tx in transactions {
        let mut row = vec![
            format_timestamp(tx.timestamp.as_deref()),
            tx.transaction_id.clone(),
            tx.driver_name.clone(),
            tx.vehicle_name.clone(),
            tx.bowser_name.clone(),
            format_quantity(tx.dispensed_amount, "L"),
            format_quantity(tx.received_amount, "L"),
        ];
        if with_discrepancy {
            row.push(
                tx.discrepancy()
                    .map(|d| format!("{:.1} L", d))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            );
        }
        row.push(tx.status.to_string());
        table.push(row);
    }

    if table.is_empty() {
        "No transactions found".to_string()
    } else {
        table.render()
    }
}

pub fn render_summary(summary: &DashboardSummary, range: &DateRange) -> String {
    let totals = &summary.transaction_summary;
    let mut out = vec![
        format!("Dashboard ({})", range),
        format!(
            "  Total fuel dispensed:     {}",
            format_quantity(Some(totals.total_fuel_dispensed.unwrap_or(0.0)), "L")
        ),
        format!("  Completed transactions:   {}", totals.completed_transactions),
        format!("  Discrepancy transactions: {}", totals.discrepancy_transactions),
        format!("  Low fuel alerts:          {}", summary.low_fuel_alerts()),
        String::new(),
        "Recent transactions".to_string(),
    ];
    out.push(transactions_table(&summary.recent_transactions, false));
    out.join("\n")
}

pub fn render_transactions(page: &TransactionPage, info: &PageInfo) -> String {
    format!("{}\n{}", transactions_table(&page.transactions, true), info)
}

pub fn render_transaction_detail(detail: &TransactionDetail) -> String {
    let tx = &detail.transaction;
    let discrepancy = match (tx.discrepancy(), tx.discrepancy_percentage) {
        (Some(d), Some(p)) => format!("{:.1} L ({:.1}%)", d, p),
        (Some(d), None) => format!("{:.1} L ({})", d, NOT_AVAILABLE),
        _ => NOT_AVAILABLE.to_string(),
    };

    let mut out = vec![
        format!("Transaction {}", tx.transaction_id),
        format!("  Date/Time:       {}", format_timestamp(tx.timestamp.as_deref())),
        format!("  Status:          {}", tx.status),
        format!("  Driver:          {}", tx.driver_name),
        format!(
            "  Vehicle:         {} ({})",
            tx.vehicle_name,
            text_or_na(tx.vehicle_registration.as_deref())
        ),
        format!("  Bowser:          {}", tx.bowser_name),
        format!("  Dispensed:       {}", format_quantity(tx.dispensed_amount, "L")),
        format!("  Received:        {}", format_quantity(tx.received_amount, "L")),
        format!("  Discrepancy:     {}", discrepancy),
        format!("  Odometer before: {}", format_quantity(tx.odometer_before, "km")),
        format!("  Odometer after:  {}", format_quantity(tx.odometer_after, "km")),
        format!("  Distance:        {}", format_quantity(tx.odo_distance, "km")),
        String::new(),
        "Odometer readings".to_string(),
    ];

    if detail.odometer_readings.is_empty() {
        out.push("No odometer readings".to_string());
    } else {
        let mut table = Table::new(vec!["Time", "Reading", "Method"]);
        for reading in &detail.odometer_readings {
            table.push(vec![
                format_timestamp(reading.timestamp.as_deref()),
                format_quantity(reading.reading, "km"),
                text_or_na(reading.input_method.as_deref()),
            ]);
        }
        out.push(table.render());
    }

    out.push(String::new());
    out.push("Fuel events".to_string());
    if detail.fuel_events.is_empty() {
        out.push("No fuel events".to_string());
    } else {
        let mut table = Table::new(vec!["Time", "Type", "Amount"]);
        for event in &detail.fuel_events {
            table.push(vec![
                format_timestamp(event.timestamp.as_deref()),
                event.event_type.clone(),
                format_quantity(event.amount, "L"),
            ]);
        }
        out.push(table.render());
    }

    out.join("\n")
}

pub fn render_vehicles(vehicles: &[Vehicle]) -> String {
    let mut table = Table::new(vec!["Name", "Registration", "Fuel", "Odometer", "Burn rate", "Updated"]);
    for vehicle in vehicles {
        table.push(vec![
            vehicle.name.clone(),
            text_or_na(vehicle.registration.as_deref()),
            fuel_cell(
                vehicle.fuel_level,
                vehicle.fuel_capacity,
                vehicle.fuel_fraction(),
                vehicle.is_low_fuel(),
            ),
            format_quantity(vehicle.odometer, "km"),
            vehicle
                .standard_burn_rate
                .map(|r| format!("{} L/100km", r))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            format_timestamp(vehicle.last_updated.as_deref()),
        ]);
    }
    if table.is_empty() {
        "No vehicles found".to_string()
    } else {
        table.render()
    }
}

pub fn render_bowsers(bowsers: &[Bowser]) -> String {
    let mut table = Table::new(vec!["Name", "Fuel", "Capacity", "Critical", "Dispensed", "Updated"]);
    for bowser in bowsers {
        table.push(vec![
            bowser.name.clone(),
            fuel_cell(
                bowser.fuel_level,
                bowser.capacity,
                bowser.fuel_fraction(),
                bowser.is_low_fuel(),
            ),
            format_quantity(bowser.capacity, "L"),
            format_quantity(bowser.critical_level, "L"),
            format_quantity(bowser.total_dispensed, "L"),
            format_timestamp(bowser.last_updated.as_deref()),
        ]);
    }
    if table.is_empty() {
        "No bowsers found".to_string()
    } else {
        table.render()
    }
}

pub fn render_drivers(drivers: &[Driver]) -> String {
    let mut table = Table::new(vec!["Name", "Role", "iButton"]);
    for driver in drivers {
        table.push(vec![
            driver.name.clone(),
            text_or_na(driver.role.as_deref()),
            text_or_na(driver.ibutton_code.as_deref()),
        ]);
    }
    if table.is_empty() {
        "No drivers found".to_string()
    } else {
        table.render()
    }
}

pub fn render_status(status: &SystemStatus) -> String {
    format!(
        "Backend {} (version {}, time {})",
        status.status,
        text_or_na(status.version.as_deref()),
        format_timestamp(status.time.as_deref())
    )
}
