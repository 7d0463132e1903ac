//! Integration tests for the rehost pipeline
//!
//! These tests serve images from a wiremock server, upload them through a
//! recording uploader (or the SM.MS adapter pointed at a mock API) and check
//! the documents left on disk.

use async_trait::async_trait;
use md_rehost::config::FetchConfig;
use md_rehost::rehost::{build_http_client, Fetcher, Pipeline, RateLimiter, ReferenceExtractor};
use md_rehost::upload::{SmmsUploader, UploadOutcome, Uploader};
use md_rehost::RehostError;
use serde_json::json;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CDN: &str = "https://cdn.test";

/// Uploader that records every call and answers from fixed rules
#[derive(Default)]
struct RecordingUploader {
    calls: Mutex<Vec<String>>,
    reject: HashSet<String>,
    known: HashSet<String>,
}

impl RecordingUploader {
    fn rejecting(names: &[&str]) -> Self {
        Self {
            reject: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    fn knowing(names: &[&str]) -> Self {
        Self {
            known: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Uploader for RecordingUploader {
    fn name(&self) -> &str {
        "recording"
    }

    async fn upload(&self, local_path: &Path, remote_name: &str) -> UploadOutcome {
        self.calls.lock().unwrap().push(remote_name.to_string());

        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.reject.contains(&file_name) {
            UploadOutcome::Failed(RehostError::Upload {
                backend: "recording".to_string(),
                message: format!("rejected {}", file_name),
            })
        } else if self.known.contains(&file_name) {
            UploadOutcome::AlreadyExists(format!("{}/existing/{}", CDN, file_name))
        } else {
            UploadOutcome::Uploaded(format!("{}/{}", CDN, remote_name))
        }
    }
}

/// Serves `body` for GET `image_path`
async fn mount_image(server: &MockServer, image_path: &str, body: &'static [u8]) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .mount(server)
        .await;
}

/// Creates a pipeline storing images under `dir/images`
fn create_test_pipeline(dir: &TempDir, uploader: Option<Arc<dyn Uploader>>) -> Pipeline {
    let client = build_http_client(&FetchConfig::default()).expect("Failed to build client");
    let pipeline = Pipeline::new(
        ReferenceExtractor::new(vec![CDN.to_string()]),
        Fetcher::new(client, dir.path().join("images")),
        Arc::new(RateLimiter::new(100, 1000)),
    )
    .with_remote_prefix("images")
    .with_fetch_concurrency(4);

    match uploader {
        Some(uploader) => pipeline.with_uploader(uploader),
        None => pipeline,
    }
}

fn write_doc(dir: &TempDir, name: &str, text: &str) -> std::path::PathBuf {
    let doc = dir.path().join(name);
    if let Some(parent) = doc.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&doc, text).unwrap();
    doc
}

#[tokio::test]
async fn test_full_rehost_single_document() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/a.jpg", b"jpeg-bytes").await;
    mount_image(&server, "/b.png", b"png-bytes").await;

    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "post.md",
        &format!(
            "# Post\n\n![t]({base}/a.jpg)\n\n<img src=\"{base}/b.png\" width=\"50\"/>\n"
        ),
    );

    let uploader = Arc::new(RecordingUploader::default());
    let pipeline = create_test_pipeline(&dir, Some(uploader.clone()));
    let report = pipeline
        .process_document(&doc, &CancellationToken::new())
        .await;

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.successes.len(), 2);
    assert!(report.rewritten);

    let text = std::fs::read_to_string(&doc).unwrap();
    assert_eq!(
        text,
        format!(
            "# Post\n\n![t]({CDN}/images/a.jpg)\n\n<img src=\"{CDN}/images/b.png\" width=\"50\"/>\n"
        )
    );

    assert_eq!(
        std::fs::read(dir.path().join("images/a.jpg")).unwrap(),
        b"jpeg-bytes"
    );
    assert_eq!(
        std::fs::read(dir.path().join("images/b.png")).unwrap(),
        b"png-bytes"
    );

    let mut calls = uploader.calls();
    calls.sort();
    assert_eq!(calls, vec!["images/a.jpg", "images/b.png"]);
}

#[tokio::test]
async fn test_partial_failure_rewrites_only_successes() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/ok.png", b"ok").await;
    // /gone.png is not mounted, so the server answers 404

    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "post.md",
        &format!("![a]({base}/ok.png) ![b]({base}/gone.png)"),
    );

    let pipeline = create_test_pipeline(&dir, Some(Arc::new(RecordingUploader::default())));
    let report = pipeline
        .process_document(&doc, &CancellationToken::new())
        .await;

    assert_eq!(report.successes.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures[0].reference.as_deref(),
        Some(format!("{base}/gone.png").as_str())
    );
    assert!(matches!(
        report.failures[0].error,
        RehostError::HttpStatus { status: 404, .. }
    ));
    assert!(report.rewritten);

    let text = std::fs::read_to_string(&doc).unwrap();
    assert_eq!(
        text,
        format!("![a]({CDN}/images/ok.png) ![b]({base}/gone.png)")
    );
    assert!(!dir.path().join("images/gone.png").exists());
}

#[tokio::test]
async fn test_upload_rejection_keeps_reference() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/keep.png", b"keep").await;
    mount_image(&server, "/move.png", b"move").await;

    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "post.md",
        &format!("![k]({base}/keep.png)\n![m]({base}/move.png)\n"),
    );

    let uploader = Arc::new(RecordingUploader::rejecting(&["keep.png"]));
    let report = create_test_pipeline(&dir, Some(uploader))
        .process_document(&doc, &CancellationToken::new())
        .await;

    assert_eq!(report.successes.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, RehostError::Upload { .. }));

    // The original stays on disk even though its upload failed
    assert!(dir.path().join("images/keep.png").exists());

    let text = std::fs::read_to_string(&doc).unwrap();
    assert_eq!(
        text,
        format!("![k]({base}/keep.png)\n![m]({CDN}/images/move.png)\n")
    );
}

#[tokio::test]
async fn test_already_hosted_counts_as_success() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/dup.png", b"dup").await;

    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "post.md", &format!("![d]({base}/dup.png)"));

    let uploader = Arc::new(RecordingUploader::knowing(&["dup.png"]));
    let report = create_test_pipeline(&dir, Some(uploader))
        .process_document(&doc, &CancellationToken::new())
        .await;

    assert!(report.is_clean());
    assert_eq!(report.successes.len(), 1);
    assert!(report.successes[0].already_existed);
    assert_eq!(
        std::fs::read_to_string(&doc).unwrap(),
        format!("![d]({CDN}/existing/dup.png)")
    );
}

#[tokio::test]
async fn test_repeated_reference_is_uploaded_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(&b"logo"[..]))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "post.md",
        &format!("![top]({base}/logo.png)\ntext\n<img src='{base}/logo.png'>\n"),
    );

    let uploader = Arc::new(RecordingUploader::default());
    let report = create_test_pipeline(&dir, Some(uploader.clone()))
        .process_document(&doc, &CancellationToken::new())
        .await;

    assert_eq!(report.successes.len(), 1);
    assert_eq!(uploader.calls().len(), 1);
    assert_eq!(
        std::fs::read_to_string(&doc).unwrap(),
        format!("![top]({CDN}/images/logo.png)\ntext\n<img src='{CDN}/images/logo.png'>\n")
    );
}

#[tokio::test]
async fn test_download_only_leaves_document_untouched() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/a.gif", b"gif").await;

    let dir = TempDir::new().unwrap();
    let original = format!("![a]({base}/a.gif)");
    let doc = write_doc(&dir, "post.md", &original);

    let report = create_test_pipeline(&dir, None)
        .process_document(&doc, &CancellationToken::new())
        .await;

    assert!(report.is_clean());
    assert_eq!(report.successes.len(), 1);
    assert!(report.successes[0].remote_url.is_none());
    assert!(!report.rewritten);
    assert_eq!(std::fs::read_to_string(&doc).unwrap(), original);
    assert_eq!(std::fs::read(dir.path().join("images/a.gif")).unwrap(), b"gif");
}

#[tokio::test]
async fn test_rerun_skips_rehosted_references() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/a.png", b"a").await;

    let dir = TempDir::new().unwrap();
    let doc = write_doc(&dir, "post.md", &format!("![a]({base}/a.png)"));

    let uploader = Arc::new(RecordingUploader::default());
    let pipeline = create_test_pipeline(&dir, Some(uploader.clone()));
    let cancel = CancellationToken::new();

    let first = pipeline.process_document(&doc, &cancel).await;
    assert!(first.rewritten);
    let after_first = std::fs::read_to_string(&doc).unwrap();

    let second = pipeline.process_document(&doc, &cancel).await;
    assert!(second.successes.is_empty());
    assert!(second.failures.is_empty());
    assert!(!second.rewritten);
    assert_eq!(std::fs::read_to_string(&doc).unwrap(), after_first);
    assert_eq!(uploader.calls().len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_does_not_upload() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/a.png", b"a").await;

    let dir = TempDir::new().unwrap();
    let original = format!("![a]({base}/a.png)");
    let doc = write_doc(&dir, "post.md", &original);

    let uploader = Arc::new(RecordingUploader::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = create_test_pipeline(&dir, Some(uploader.clone()))
        .process_document(&doc, &cancel)
        .await;

    assert!(report.successes.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(report.failures[0].error, RehostError::Cancelled));
    assert!(!report.rewritten);
    assert!(uploader.calls().is_empty());
    assert_eq!(std::fs::read_to_string(&doc).unwrap(), original);
}

#[tokio::test]
async fn test_process_tree_visits_matching_documents() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_image(&server, "/one.png", b"1").await;
    mount_image(&server, "/two.png", b"2").await;

    let dir = TempDir::new().unwrap();
    let docs = dir.path().join("docs");
    write_doc(&dir, "docs/a.md", &format!("![1]({base}/one.png)"));
    write_doc(&dir, "docs/nested/b.md", &format!("![2]({base}/two.png)"));
    write_doc(&dir, "docs/plain.md", "no images");
    let ignored = write_doc(&dir, "docs/notes.txt", &format!("![x]({base}/one.png)"));

    let pipeline = create_test_pipeline(&dir, Some(Arc::new(RecordingUploader::default())));
    let summary = pipeline
        .process_tree(&docs, "md", &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.documents(), 3);
    assert_eq!(summary.rewritten(), 2);
    assert_eq!(summary.successes(), 2);
    assert_eq!(summary.failures(), 0);

    assert_eq!(
        std::fs::read_to_string(docs.join("nested/b.md")).unwrap(),
        format!("![2]({CDN}/images/two.png)")
    );
    assert_eq!(
        std::fs::read_to_string(ignored).unwrap(),
        format!("![x]({base}/one.png)")
    );
}

#[tokio::test]
async fn test_process_tree_missing_root() {
    let dir = TempDir::new().unwrap();
    let pipeline = create_test_pipeline(&dir, None);

    let result = pipeline
        .process_tree(&dir.path().join("nowhere"), "md", &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(RehostError::NotFound { .. })));
}

#[tokio::test]
async fn test_rehost_through_smms_api() {
    let images = MockServer::start().await;
    let base = images.uri();
    mount_image(&images, "/new.png", b"new").await;
    mount_image(&images, "/old.png", b"old").await;

    let api = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/upload"))
        .and(body_string_contains("old.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "code": "error",
            "message": "Image upload repeated limit, this image exists at: https://i.loli.net/old.png"
        })))
        .mount(&api)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/upload"))
        .and(body_string_contains("new.png"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "code": "success",
            "data": {"url": "https://i.loli.net/new.png"}
        })))
        .mount(&api)
        .await;

    let dir = TempDir::new().unwrap();
    let doc = write_doc(
        &dir,
        "post.md",
        &format!("![o]({base}/old.png)\n![n]({base}/new.png)\n"),
    );

    let client = build_http_client(&FetchConfig::default()).unwrap();
    let uploader = SmmsUploader::new(
        client.clone(),
        &format!("{}/api/v2", api.uri()),
        "token".to_string(),
    )
    .unwrap();

    let pipeline = Pipeline::new(
        ReferenceExtractor::default(),
        Fetcher::new(client, dir.path().join("images")),
        Arc::new(RateLimiter::new(100, 1000)),
    )
    .with_uploader(Arc::new(uploader));

    let report = pipeline
        .process_document(&doc, &CancellationToken::new())
        .await;

    assert!(report.is_clean(), "unexpected failures: {:?}", report.failures);
    assert_eq!(report.successes.len(), 2);
    assert!(report.successes[0].already_existed);
    assert!(!report.successes[1].already_existed);
    assert_eq!(
        std::fs::read_to_string(&doc).unwrap(),
        "![o](https://i.loli.net/old.png)\n![n](https://i.loli.net/new.png)\n"
    );
}
