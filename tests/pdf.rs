//! PDF tool endpoints end to end.

mod common;

use std::io::Cursor;

use axum::http::{header, StatusCode};
use lopdf::Document;

use common::{body_bytes, body_json, multipart_request, sample_pdf, send, test_app, Part};

fn pdf_part(name: &'static str, filename: &'static str, pages: u32) -> Part<'static> {
    Part::file(name, filename, "application/pdf", sample_pdf(pages))
}

fn page_count(bytes: &[u8]) -> usize {
    Document::load_mem(bytes).unwrap().get_pages().len()
}

#[tokio::test]
async fn test_info() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, multipart_request("/pdf/info", &[pdf_part("pdf_file", "a.pdf", 3)])).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["pages"], 3);
}

#[tokio::test]
async fn test_combine() {
    let (app, _state, _dir) = test_app().await;
    let parts = [
        pdf_part("pdf_files", "a.pdf", 2),
        pdf_part("pdf_files", "b.pdf", 3),
        Part::file("pdf_files", "notes.txt", "text/plain", b"skip me".to_vec()),
    ];
    let response = send(&app, multipart_request("/pdf/combine", &parts)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(page_count(&body_bytes(response).await), 5);
}

#[tokio::test]
async fn test_combine_without_pdfs() {
    let (app, _state, _dir) = test_app().await;
    let parts = [Part::file("pdf_files", "notes.txt", "text/plain", b"x".to_vec())];
    let response = send(&app, multipart_request("/pdf/combine", &parts)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_split_into_zip() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, multipart_request("/pdf/split", &[pdf_part("pdf_file", "a.pdf", 3)])).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");

    let mut archive = zip::ZipArchive::new(Cursor::new(body_bytes(response).await)).unwrap();
    assert_eq!(archive.len(), 3);
    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    assert!(names.contains(&"page_1.pdf".to_string()));
    assert!(names.contains(&"page_3.pdf".to_string()));

    let mut page = Vec::new();
    std::io::Read::read_to_end(&mut archive.by_name("page_2.pdf").unwrap(), &mut page).unwrap();
    assert_eq!(page_count(&page), 1);
}

#[tokio::test]
async fn test_extract_ranges() {
    let (app, _state, _dir) = test_app().await;
    let parts = [pdf_part("pdf_file", "a.pdf", 5), Part::text("page_ranges", "1, 3-4")];
    let response = send(&app, multipart_request("/pdf/extract", &parts)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(page_count(&body_bytes(response).await), 3);
}

#[tokio::test]
async fn test_extract_clamps_huge_range_end() {
    let (app, _state, _dir) = test_app().await;
    let parts = [pdf_part("pdf_file", "a.pdf", 2), Part::text("page_ranges", "1-4294967295")];
    let response = send(&app, multipart_request("/pdf/extract", &parts)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(page_count(&body_bytes(response).await), 2);
}

#[tokio::test]
async fn test_extract_requires_ranges() {
    let (app, _state, _dir) = test_app().await;
    let response = send(&app, multipart_request("/pdf/extract", &[pdf_part("pdf_file", "a.pdf", 2)])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_extract_out_of_range() {
    let (app, _state, _dir) = test_app().await;
    let parts = [pdf_part("pdf_file", "a.pdf", 2), Part::text("page_ranges", "5")];
    let response = send(&app, multipart_request("/pdf/extract", &parts)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rejects_non_pdf_payload() {
    let (app, _state, _dir) = test_app().await;
    let part = Part::file("pdf_file", "fake.pdf", "application/pdf", b"not a pdf".to_vec());
    let response = send(&app, multipart_request("/pdf/info", &[part])).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
