//! Shift table generation and workbook exports over HTTP.

mod common;

use axum::http::{header, StatusCode};
use serde_json::json;

use common::{body_bytes, body_json, json_request, send, test_app};
use efficepart::office::read_first_sheet;

fn morning_request() -> serde_json::Value {
    json!({
        "staff_count": 4,
        "position_names": ["レジ", "品出し"],
        "extra_positions": ["清掃"],
        "work_start": "09:00",
        "work_end": "12:00",
        "break_start": "10:00",
        "break_end": "11:00",
        "break_duration": 30
    })
}

#[tokio::test]
async fn test_generate_table() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, json_request("/shift/generate", &morning_request())).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["headers"], json!(["①", "②", "③", "④"]));

    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 12);
    assert_eq!(rows[0]["time"], "09:00");
    assert_eq!(rows[11]["time"], "11:45");

    for row in rows {
        let staff: Vec<&str> = row["staff"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c.as_str().unwrap())
            .collect();
        assert_eq!(staff.len(), 4);
        assert!(staff.contains(&"レジ"));
        assert!(staff.contains(&"品出し"));
    }
}

#[tokio::test]
async fn test_generate_rejects_too_many_positions() {
    let (app, _state, _dir) = test_app().await;
    let mut request = morning_request();
    request["staff_count"] = json!(1);
    let response = send(&app, json_request("/shift/generate", &request)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_generate_rejects_break_outside_hours() {
    let (app, _state, _dir) = test_app().await;
    let mut request = morning_request();
    request["break_end"] = json!("13:00");
    let response = send(&app, json_request("/shift/generate", &request)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_download_excel() {
    let (app, _state, _dir) = test_app().await;
    let request = json!({
        "shift_data": [
            ["時間", "①", "②"],
            ["09:00", "レジ", "休憩"]
        ],
        "color_map": { "休憩": "#FFCC00" }
    });
    let response = send(&app, json_request("/shift/download_excel", &request)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .contains("shift_table.xlsx"));

    let rows = read_first_sheet(&body_bytes(response).await).unwrap();
    assert_eq!(rows[1][2], "休憩");
}

#[tokio::test]
async fn test_calendar_workbook() {
    let (app, _state, _dir) = test_app().await;
    let request = json!({ "start_date": "2024-04-01", "num_days": 7, "num_workers": 3 });
    let response = send(&app, json_request("/shift/calendar", &request)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let rows = read_first_sheet(&body_bytes(response).await).unwrap();
    assert_eq!(rows[0][1], "04/01 (Mon)");
    assert_eq!(rows[3][0], "スタッフ3");
}

#[tokio::test]
async fn test_calendar_bad_date() {
    let (app, _state, _dir) = test_app().await;
    let request = json!({ "start_date": "April 1st" });
    let response = send(&app, json_request("/shift/calendar", &request)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_calendar_rejects_oversized_or_overflowing_requests() {
    let (app, _state, _dir) = test_app().await;
    for request in [
        json!({ "start_date": "+262142-12-31", "num_days": 2, "num_workers": 1 }),
        json!({ "start_date": "2024-04-01", "num_days": 4000000000u32, "num_workers": 1 }),
        json!({ "start_date": "2024-04-01", "num_days": 7, "num_workers": 4000000000u32 }),
    ] {
        let response = send(&app, json_request("/shift/calendar", &request)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["success"], false);
    }
}

#[tokio::test]
async fn test_generate_rejects_huge_staff_count() {
    let (app, _state, _dir) = test_app().await;
    let mut request = morning_request();
    request["staff_count"] = json!(1_000_000_000u64);
    let response = send(&app, json_request("/shift/generate", &request)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}
