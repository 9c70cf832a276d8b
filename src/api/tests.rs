use super::types::*;
use super::*;
use crate::dashboard::{DateRange, TransactionFilter};
use chrono::NaiveDate;
use httpmock::prelude::*;
use serde_json::json;

fn vehicle_json(id: &str, odometer: serde_json::Value) -> serde_json::Value {
    json!({
        "vehicle_id": id,
        "name": "Land Cruiser",
        "registration": "KAA 001A",
        "odometer": odometer,
        "fuel_level": "45.5",
        "fuel_capacity": 90,
        "standard_burn_rate": null,
        "last_updated": "Tue, 04 Mar 2025 08:15:00 GMT"
    })
}

fn transaction_json(id: &str, status: &str) -> serde_json::Value {
    json!({
        "transaction_id": id,
        "timestamp": "2025-03-04T08:15:00",
        "status": status,
        "driver_id": "D1",
        "vehicle_id": "V1",
        "bowser_id": "B1",
        "driver_name": "John Kamau",
        "vehicle_name": "Land Cruiser",
        "vehicle_registration": "KAA 001A",
        "bowser_name": "Main Bowser",
        "dispensed_amount": "60.00",
        "received_amount": "58.50",
        "discrepancy_percentage": "2.50",
        "odometer_before": 15000,
        "odometer_after": 15120,
        "odo_distance": 120
    })
}

fn api_client(server: &MockServer) -> ApiClient {
    ApiClient::with_base_url(&server.url("/api")).unwrap()
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[tokio::test]
async fn reference_lists_load() {
    let server = MockServer::start_async().await;

    server.mock(|when, then| {
        when.method(GET).path("/api/drivers");
        then.status(200).json_body(json!([
            { "driver_id": "D1", "name": "John Kamau", "role": "Driver", "ibutton_code": "IB-0001" },
            { "driver_id": "D2", "name": "Mary Wanjiru", "role": null }
        ]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/vehicles");
        then.status(200)
            .json_body(json!([vehicle_json("V1", json!("15000.0")), vehicle_json("V2", json!(null))]));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/bowsers");
        then.status(200).json_body(json!([{
            "bowser_id": "B1",
            "name": "Main Bowser",
            "capacity": "5000",
            "critical_level": 500,
            "fuel_level": 3200.5,
            "total_dispensed": null
        }]));
    });

    let client = api_client(&server);

    let drivers = client.list_drivers().await.unwrap();
    assert_eq!(drivers.len(), 2);
    assert_eq!(drivers[0].ibutton_code.as_deref(), Some("IB-0001"));
    assert_eq!(drivers[1].role, None);

    let vehicles = client.list_vehicles().await.unwrap();
    assert_eq!(vehicles[0].odometer, Some(15000.0));
    assert_eq!(vehicles[0].fuel_level, Some(45.5));
    assert_eq!(vehicles[1].odometer, None);

    let bowsers = client.list_bowsers().await.unwrap();
    assert_eq!(bowsers[0].capacity, Some(5000.0));
    assert_eq!(bowsers[0].fuel_level, Some(3200.5));
}

#[tokio::test]
async fn summary_sends_date_range() {
    let server = MockServer::start_async().await;

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/dashboard/summary")
            .query_param("start_date", "2025-03-01")
            .query_param("end_date", "2025-03-07");
        then.status(200).json_body(json!({
            "transaction_summary": {
                "total_transactions": 12,
                "total_fuel_dispensed": "640.5",
                "completed_transactions": 9,
                "discrepancy_transactions": 2
            },
            "vehicle_summary": { "total_vehicles": 5, "low_fuel_vehicles": 1 },
            "bowser_summary": { "total_bowsers": 2, "low_fuel_bowsers": 1 },
            "recent_transactions": [transaction_json("T-1", "completed")]
        }));
    });

    let range = DateRange::new(day(2025, 3, 7), day(2025, 3, 1));
    let summary = api_client(&server).dashboard_summary(&range).await.unwrap();

    mock.assert_async().await;
    assert_eq!(summary.transaction_summary.total_fuel_dispensed, Some(640.5));
    assert_eq!(summary.transaction_summary.pending_transactions, 0);
    assert_eq!(summary.low_fuel_alerts(), 2);
    assert_eq!(summary.recent_transactions.len(), 1);
}

#[tokio::test]
async fn transactions_send_filters() {
    let server = MockServer::start_async().await;

    let mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/transactions")
            .query_param("limit", "10")
            .query_param("offset", "10")
            .query_param("vehicle_id", "V1")
            .query_param("status", "timed_out");
        then.status(200).json_body(json!({
            "transactions": [transaction_json("T-11", "timed_out")],
            "total": 11,
            "limit": 10,
            "offset": 10
        }));
    });

    let filter = TransactionFilter {
        vehicle_id: Some("V1".into()),
        driver_id: Some(String::new()),
        status: Some(TransactionStatus::TimedOut),
        offset: 10,
        ..TransactionFilter::default()
    };
    let page = api_client(&server).transactions(&filter).await.unwrap();

    mock.assert_async().await;
    assert_eq!(page.total, 11);
    let tx = &page.transactions[0];
    assert_eq!(tx.status, TransactionStatus::TimedOut);
    assert_eq!(tx.dispensed_amount, Some(60.0));
    assert_eq!(tx.discrepancy(), Some(1.5));
}

#[tokio::test]
async fn transaction_detail_and_not_found() {
    let server = MockServer::start_async().await;

    server.mock(|when, then| {
        when.method(GET).path("/api/transactions/T-1");
        then.status(200).json_body(json!({
            "transaction": transaction_json("T-1", "discrepancy"),
            "odometer_readings": [
                { "timestamp": "2025-03-04T08:10:00", "reading": "15000", "input_method": "manual" }
            ],
            "fuel_events": [
                { "timestamp": "2025-03-04T08:12:00", "event_type": "dispensed", "amount": 60 }
            ]
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/transactions/T-404");
        then.status(404).json_body(json!({ "error": "Transaction not found" }));
    });

    let client = api_client(&server);

    let detail = client.transaction("T-1").await.unwrap();
    assert_eq!(detail.transaction.status, TransactionStatus::Discrepancy);
    assert_eq!(detail.odometer_readings[0].reading, Some(15000.0));
    assert_eq!(detail.fuel_events[0].event_type, "dispensed");

    match client.transaction("T-404").await {
        Err(ApiError::NotFound(what)) => assert_eq!(what, "transaction T-404"),
        other => panic!("expected not found, got {:?}", other.map(|d| d.transaction)),
    }
}

#[tokio::test]
async fn refresh_and_simulate_post() {
    let server = MockServer::start_async().await;

    let refresh = server.mock(|when, then| {
        when.method(POST).path("/api/refresh-data");
        then.status(200).json_body(json!({
            "success": null,
            "message": "Data refresh started",
            "request_id": 42
        }));
    });
    server.mock(|when, then| {
        when.method(POST).path("/api/simulate/transaction");
        then.status(200).json_body(json!({
            "success": true,
            "transaction": {
                "transaction_id": "SIM-000042",
                "vehicle": "Land Cruiser",
                "driver": "John Kamau",
                "bowser": "Main Bowser",
                "fuel_amount": 60.0,
                "received_amount": "58.5"
            }
        }));
    });

    let client = api_client(&server);

    let outcome = client.refresh_data().await.unwrap();
    refresh.assert_async().await;
    assert_eq!(outcome.success, None);
    assert_eq!(outcome.request_id, Some(json!(42)));

    let simulated = client.simulate_transaction().await.unwrap();
    assert!(simulated.success);
    let tx = simulated.transaction.unwrap();
    assert_eq!(tx.transaction_id, "SIM-000042");
    assert_eq!(tx.received_amount, Some(58.5));
}

#[tokio::test]
async fn server_errors_surface() {
    let server = MockServer::start_async().await;

    server.mock(|when, then| {
        when.method(GET).path("/api/status");
        then.status(500).body("database unavailable");
    });

    let err = api_client(&server).status().await.unwrap_err();
    match err {
        ApiError::Server(message) => assert!(message.contains("database unavailable")),
        other => panic!("expected server error, got {:?}", other),
    }
}

#[tokio::test]
async fn status_reports_version() {
    let server = MockServer::start_async().await;

    server.mock(|when, then| {
        when.method(GET).path("/api/status");
        then.status(200)
            .json_body(json!({ "status": "ok", "version": "1.0.0", "time": "2025-03-04T08:15:00" }));
    });

    let status = api_client(&server).status().await.unwrap();
    assert_eq!(status.status, "ok");
    assert_eq!(status.version.as_deref(), Some("1.0.0"));
}
