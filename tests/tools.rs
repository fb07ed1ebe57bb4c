//! Proofreading, name tags, conversion and table-of-contents endpoints.

mod common;

use std::io::Cursor;

use axum::http::{header, StatusCode};
use serde_json::json;

use common::{body_bytes, body_json, get, json_request, multipart_request, send, test_app, Part};
use efficepart::office::{CellStyle, Workbook, Worksheet};

fn badge_workbook() -> Vec<u8> {
    let mut sheet = Worksheet::new("Sheet1");
    sheet.set(1, 1, "1行目", CellStyle::new());
    sheet.set(1, 2, "2行目", CellStyle::new());
    sheet.set(2, 1, "株式会社サンプル", CellStyle::new());
    sheet.set(2, 2, "山田 太郎", CellStyle::new());
    sheet.set(3, 1, "サンプル商事", CellStyle::new());
    sheet.set(3, 2, "佐藤 花子", CellStyle::new());

    let mut workbook = Workbook::new();
    workbook.add_sheet(sheet);
    workbook.to_bytes().unwrap()
}

fn png_bytes() -> Vec<u8> {
    let image = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 30, 30]));
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut buffer, image::ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

#[tokio::test]
async fn test_proofread_and_history() {
    let (app, _state, _dir) = test_app().await;

    let text = "今日は 晴れです 。";
    let response = send(&app, json_request("/proofreading/proofread", &json!({ "text": text }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["original"], text);
    assert!(!body["suggestions"].as_array().unwrap().is_empty());
    assert!(body.get("structure_suggestion").is_none());

    let history = body_json(send(&app, get("/proofreading/history")).await).await;
    let runs = history["history"].as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(history["structures"], json!({}));
}

#[tokio::test]
async fn test_proofread_requires_text() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, json_request("/proofreading/proofread", &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "校正するテキストが必要です");
}

#[tokio::test]
async fn test_proofread_upload_txt() {
    let (app, _state, _dir) = test_app().await;
    let part = Part::file("file", "draft.txt", "text/plain", "これは これは 例文です。".as_bytes().to_vec());
    let response = send(&app, multipart_request("/proofreading/upload", &[part])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["filename"], "draft.txt");
    assert_eq!(body["text"], "これは これは 例文です。");
}

#[tokio::test]
async fn test_structure_needs_prompt_and_llm() {
    let (app, _state, _dir) = test_app().await;

    let response = send(&app, json_request("/proofreading/generate-structure", &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = json!({ "prompt": "社内研修の資料", "type": "simple" });
    let response = send(&app, json_request("/proofreading/generate-structure", &request)).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_nametag_upload_then_pdf() {
    let (app, _state, _dir) = test_app().await;

    let part = Part::file(
        "file",
        "members.xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        badge_workbook(),
    );
    let response = send(&app, multipart_request("/nametag/upload", &[part])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["rows"], 2);
    assert_eq!(body["preview_data"][0]["2行目"], "山田 太郎");
    let file_id = body["file_id"].as_str().unwrap().to_string();

    let request = json!({ "file_id": file_id, "alignment": "LEFT" });
    let response = send(&app, json_request("/nametag/generate_pdf", &request)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    let doc = lopdf::Document::load_mem(&body_bytes(response).await).unwrap();
    assert_eq!(doc.get_pages().len(), 2);
}

#[tokio::test]
async fn test_nametag_pdf_errors() {
    let (app, _state, _dir) = test_app().await;

    let response = send(&app, json_request("/nametag/generate_pdf", &json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let request = json!({ "file_id": "missing" });
    let response = send(&app, json_request("/nametag/generate_pdf", &request)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_nametag_preview() {
    let (app, _state, _dir) = test_app().await;
    let request = json!({ "background_color": "#EEEEEE" });
    let response = send(&app, json_request("/nametag/generate_preview", &request)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["preview_image"]
        .as_str()
        .unwrap()
        .starts_with("data:image/png;base64,"));
}

#[tokio::test]
async fn test_converter_png_to_jpg() {
    let (app, _state, _dir) = test_app().await;
    let parts = [
        Part::file("file", "dot.png", "image/png", png_bytes()),
        Part::text("output_format", "jpg"),
    ];
    let response = send(&app, multipart_request("/converter/upload", &parts)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/jpeg");

    let bytes = body_bytes(response).await;
    let image = image::load_from_memory(&bytes).unwrap();
    assert_eq!((image.width(), image.height()), (8, 8));
}

#[tokio::test]
async fn test_converter_png_to_pdf_by_default() {
    let (app, _state, _dir) = test_app().await;
    let parts = [Part::file("file", "dot.png", "image/png", png_bytes())];
    let response = send(&app, multipart_request("/converter/upload", &parts)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
}

#[tokio::test]
async fn test_toc_rejects_other_formats() {
    let (app, _state, _dir) = test_app().await;
    let part = Part::file("file", "deck.pdf", "application/pdf", b"%PDF-1.4".to_vec());
    let response = send(&app, multipart_request("/toc/upload", &[part])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "PPTXファイルのみアップロードできます。");
}
