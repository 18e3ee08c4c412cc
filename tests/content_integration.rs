//! Integration tests for content fetch: selection, size caps, decode
//! resilience.

use std::io::{Cursor, Write};

use bookferry_core::feed::{Candidate, DownloadTarget};
use bookferry_core::{
    CatalogClient, ContentKind, ContentResolver, FetchError, IngestConfig,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zip::write::SimpleFileOptions;

fn test_config(server: &MockServer) -> IngestConfig {
    IngestConfig {
        proxy: None,
        max_retries: 1,
        ..IngestConfig::for_root(server.uri())
    }
}

fn resolver_with(config: &IngestConfig) -> ContentResolver {
    let client = CatalogClient::new(config).expect("client builds");
    ContentResolver::new(client, config)
}

fn candidate(server: &MockServer, format: &str, href: &str) -> Candidate {
    Candidate {
        title: "Тестовая книга".to_string(),
        author: "Автор".to_string(),
        description: None,
        genres: Vec::new(),
        targets: vec![DownloadTarget {
            format: format.to_string(),
            url: format!("{}{href}", server.uri()),
            mime: String::new(),
        }],
        external_id: Some("1".to_string()),
        cover_url: None,
    }
}

fn build_zip(members: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, data) in members {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("zip member starts");
        writer.write_all(data).expect("zip member writes");
    }
    writer.finish().expect("zip finishes").into_inner()
}

const FB2: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<FictionBook xmlns="http://www.gribuser.ru/xml/fictionbook/2.0">
<body><section>
<p>Первый абзац книги.</p>
<p>Второй абзац книги.</p>
</section></body></FictionBook>"#;

#[tokio::test]
async fn test_fetch_zip_wrapped_fb2_selects_fb2_member() {
    let server = MockServer::start().await;
    let archive = build_zip(&[
        ("info.txt", b"not the book".as_slice()),
        ("kniga.fb2", FB2.as_bytes()),
    ]);
    Mock::given(method("GET"))
        .and(path("/b/1/fb2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(archive, "application/zip"))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let content = resolver
        .fetch(&candidate(&server, "fb2+zip", "/b/1/fb2"), "fb2")
        .await
        .expect("fetch succeeds");

    assert_eq!(content.format, "fb2");
    assert_eq!(content.kind, ContentKind::PlainText);
    assert!(content.text.contains("Первый абзац книги."));
    assert!(content.text.contains("\n\n"));
    assert!(!content.quality.is_degraded());
}

#[tokio::test]
async fn test_fetch_windows_1251_txt_round_trips() {
    let server = MockServer::start().await;
    let text = "Мороз и солнце; день чудесный! Ещё ты дремлешь, друг прелестный.";
    let (encoded, _, _) = encoding_rs::WINDOWS_1251.encode(text);
    Mock::given(method("GET"))
        .and(path("/b/1/txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(encoded.into_owned(), "text/plain"))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let content = resolver
        .fetch(&candidate(&server, "txt", "/b/1/txt"), "txt")
        .await
        .expect("fetch succeeds");

    assert_eq!(content.text, text, "legacy encoding must round-trip exactly");
}

#[tokio::test]
async fn test_fetch_truncated_archive_degrades_not_panics() {
    let server = MockServer::start().await;
    let mut archive = build_zip(&[("kniga.fb2", FB2.as_bytes())]);
    archive.truncate(16);
    Mock::given(method("GET"))
        .and(path("/b/1/fb2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(archive, "application/zip"))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let content = resolver
        .fetch(&candidate(&server, "fb2+zip", "/b/1/fb2"), "fb2")
        .await
        .expect("fetch must not fail on malformed payloads");
    assert!(content.quality.is_degraded());
}

#[tokio::test]
async fn test_fetch_non_xml_stream_degrades_to_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1/fb2"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("это вообще не книга", "text/plain"),
        )
        .mount(&server)
        .await;

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let content = resolver
        .fetch(&candidate(&server, "fb2", "/b/1/fb2"), "fb2")
        .await
        .expect("fetch must not fail on non-XML payloads");
    assert!(content.quality.is_degraded());
    assert!(content.text.contains("не книга"));
}

#[tokio::test]
async fn test_fetch_format_unavailable_without_any_network() {
    let server = MockServer::start().await;
    let config = test_config(&server);
    let resolver = resolver_with(&config);

    let mut pdf_only = candidate(&server, "pdf", "/b/1/pdf");
    pdf_only.targets[0].format = "pdf".to_string();

    let result = resolver.fetch(&pdf_only, "fb2").await;
    assert!(matches!(result, Err(FetchError::FormatUnavailable { .. })));
}

#[tokio::test]
async fn test_fetch_rejects_oversized_content_by_declared_length() {
    let server = MockServer::start().await;
    let body = vec![0u8; 4096];
    Mock::given(method("GET"))
        .and(path("/b/1/fb2"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/zip"))
        .mount(&server)
        .await;

    let config = IngestConfig {
        max_content_bytes: 1024,
        ..test_config(&server)
    };
    let resolver = resolver_with(&config);
    let result = resolver
        .fetch(&candidate(&server, "fb2", "/b/1/fb2"), "fb2")
        .await;
    assert!(matches!(
        result,
        Err(FetchError::SizeExceeded { limit: 1024, .. })
    ));
}

#[tokio::test]
async fn test_fetch_download_failure_surfaces_as_catalog_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1/fb2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let result = resolver
        .fetch(&candidate(&server, "fb2", "/b/1/fb2"), "fb2")
        .await;
    assert!(matches!(result, Err(FetchError::Catalog(_))));
}

#[tokio::test]
async fn test_fetch_epub_extracts_markup_members_in_order() {
    let server = MockServer::start().await;
    let epub = build_zip(&[
        ("mimetype", b"application/epub+zip".as_slice()),
        (
            "OEBPS/ch1.xhtml",
            "<html><body><p>Первая глава.</p><script>var x=1;</script></body></html>".as_bytes(),
        ),
        (
            "OEBPS/ch2.xhtml",
            "<html><body><p>Вторая глава.</p></body></html>".as_bytes(),
        ),
    ]);
    Mock::given(method("GET"))
        .and(path("/b/1/epub"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(epub, "application/epub+zip"))
        .mount(&server)
        .await;

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let content = resolver
        .fetch(&candidate(&server, "epub", "/b/1/epub"), "epub")
        .await
        .expect("fetch succeeds");

    let first = content.text.find("Первая глава.").expect("first chapter");
    let second = content.text.find("Вторая глава.").expect("second chapter");
    assert!(first < second);
    assert!(!content.text.contains("var x"));
}

#[tokio::test]
async fn test_fetch_pdf_passes_through_as_base64() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1/pdf"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(b"%PDF-1.4 binary".as_slice(), "application/pdf"),
        )
        .mount(&server)
        .await;

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let content = resolver
        .fetch(&candidate(&server, "pdf", "/b/1/pdf"), "pdf")
        .await
        .expect("fetch succeeds");
    assert_eq!(content.kind, ContentKind::Base64Binary);
    assert_eq!(content.format, "pdf");
}

#[tokio::test]
async fn test_fetch_prefers_exact_format_over_archived_variant() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/b/1/fb2plain"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(FB2, "application/fb2+xml"))
        .mount(&server)
        .await;

    let mut both = candidate(&server, "fb2+zip", "/b/1/fb2zip");
    both.targets.push(DownloadTarget {
        format: "fb2".to_string(),
        url: format!("{}/b/1/fb2plain", server.uri()),
        mime: "application/fb2+xml".to_string(),
    });

    let config = test_config(&server);
    let resolver = resolver_with(&config);
    let content = resolver.fetch(&both, "fb2").await.expect("fetch succeeds");
    assert!(
        content.text.contains("Первый абзац книги."),
        "the bare fb2 target must be downloaded, not the archived one"
    );
}
