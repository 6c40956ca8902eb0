//! Integration tests for the htsget reference server
//!
//! Objects live in a temporary directory. Reference dictionaries come from a
//! stub reader, and on unix the external tools are replaced by small shell
//! scripts whose output has a recognisable header and a real BGZF EOF block.

use async_trait::async_trait;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use clap::Parser;
use htsget_refserver::{
    Config, Result,
    formats::{BGZF_EOF, HeaderReader, Tools},
    handlers::{AppState, create_router},
    registry::{DataSource, Location, Registry},
    storage::Storages,
    types::Format,
};
use serde_json::{Value, json};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use url::Url;

const OBJECT: &[u8] = b"0123456789abcdefghijklmno";

struct StubHeaders;

#[async_trait]
impl HeaderReader for StubHeaders {
    async fn reference_names(&self, _: Format, _: &Location) -> Result<Vec<String>> {
        Ok(vec!["chr1".to_string(), "chr2".to_string()])
    }
}

struct Fixture {
    server: TestServer,
    _dir: TempDir,
}

fn registry(dir: &Path, extension: &str) -> Registry {
    let template = format!("{}/{{id}}.{}", dir.display(), extension);
    Registry::new(vec![DataSource::new(r"^(?P<id>[A-Za-z0-9_]+)$", template).unwrap()])
}

fn server(chunk_size: u64, reads: Registry, variants: Registry, tools: Tools) -> TestServer {
    let state = AppState {
        base_url: Url::parse("http://localhost:3000").unwrap(),
        chunk_size,
        reads: Arc::new(reads),
        variants: Arc::new(variants),
        storage: Arc::new(Storages::new().unwrap()),
        header_reader: Arc::new(StubHeaders),
        tools: Arc::new(tools),
    };
    TestServer::new(create_router(state)).unwrap()
}

fn fixture_with(chunk_size: u64, tools: impl FnOnce(&Path) -> Tools) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("sample.bam"), OBJECT).unwrap();
    std::fs::write(dir.path().join("empty.bam"), b"").unwrap();

    let server = server(
        chunk_size,
        registry(dir.path(), "bam"),
        registry(dir.path(), "vcf.gz"),
        tools(dir.path()),
    );
    Fixture { server, _dir: dir }
}

fn fixture(chunk_size: u64) -> Fixture {
    fixture_with(chunk_size, |_| Tools::default())
}

fn urls(body: &Value) -> &Vec<Value> {
    body["htsget"]["urls"].as_array().unwrap()
}

/// Fetch one ticket entry the way a client would.
async fn fetch(server: &TestServer, entry: &Value) -> Vec<u8> {
    let url = Url::parse(entry["url"].as_str().unwrap()).unwrap();
    let mut request = server.get(&url[url::Position::BeforePath..]);
    if let Some(headers) = entry["headers"].as_object() {
        for (name, value) in headers {
            request = request.add_header(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value.as_str().unwrap()).unwrap(),
            );
        }
    }
    let response = request.await;
    response.assert_status_success();
    response.as_bytes().to_vec()
}

async fn fetch_all(server: &TestServer, body: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    for entry in urls(body) {
        out.extend(fetch(server, entry).await);
    }
    out
}

#[tokio::test]
async fn test_service_info() {
    let fixture = fixture(10);

    let response = fixture.server.get("/service-info").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["type"]["artifact"], "htsget");
    assert_eq!(body["type"]["version"], "1.3.0");
    assert_eq!(body["htsget"]["datatype"], "reads");

    let body: Value = fixture.server.get("/variants/service-info").await.json();
    assert_eq!(body["htsget"]["formats"], json!(["VCF", "BCF"]));
    assert_eq!(body["htsget"]["fieldsParameterEffective"], false);
}

#[tokio::test]
async fn test_unfiltered_ticket_is_chunked() {
    let fixture = fixture(10);

    let response = fixture.server.get("/reads/sample").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["htsget"]["format"], "BAM");

    let urls = urls(&body);
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0]["headers"]["Range"], "bytes=0-9");
    assert_eq!(urls[2]["headers"]["Range"], "bytes=20-24");
    assert!(urls.iter().all(|u| u["class"] == "body"));

    assert_eq!(fetch_all(&fixture.server, &body).await, OBJECT);
}

#[tokio::test]
async fn test_empty_object_has_no_blocks() {
    let fixture = fixture(10);
    let body: Value = fixture.server.get("/reads/empty").await.json();
    assert!(urls(&body).is_empty());
}

#[tokio::test]
async fn test_header_only_ticket() {
    let fixture = fixture(10);

    let response = fixture.server.get("/reads/sample?class=header").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let urls = urls(&body);
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0]["class"], "header");
    assert_eq!(urls[0]["url"], "http://localhost:3000/reads/data/sample?class=header");
    assert_eq!(urls[0]["headers"]["HtsgetNumBlocks"], "1");
}

#[tokio::test]
async fn test_field_filter_ticket() {
    let fixture = fixture(10);

    let response = fixture.server.get("/reads/sample?fields=QNAME,SEQ&tags=NM").await;
    response.assert_status_ok();
    let body: Value = response.json();
    let urls = urls(&body);
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0]["class"], "header");
    assert_eq!(urls[1]["class"], "body");
    assert_eq!(
        urls[1]["url"],
        "http://localhost:3000/reads/data/sample?fields=QNAME%2CSEQ&tags=NM"
    );
}

#[tokio::test]
async fn test_post_regions_ticket() {
    let fixture = fixture(10);

    let body = json!({
        "format": "BAM",
        "regions": [
            {"referenceName": "chr2"},
            {"referenceName": "chr1", "start": 0, "end": 1000}
        ]
    });
    let response = fixture.server.post("/reads/sample").json(&body).await;
    response.assert_status_ok();

    let body: Value = response.json();
    let urls = urls(&body);
    assert_eq!(urls.len(), 3);
    assert_eq!(urls[0]["class"], "header");
    assert!(urls[1]["url"].as_str().unwrap().ends_with("?referenceName=chr2"));
    assert!(
        urls[2]["url"]
            .as_str()
            .unwrap()
            .ends_with("?referenceName=chr1&start=0&end=1000")
    );
    assert_eq!(urls[2]["headers"]["HtsgetBlockId"], "2");
    assert_eq!(urls[2]["headers"]["HtsgetNumBlocks"], "3");
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let fixture = fixture(10);

    let response = fixture.server.get("/reads/not.an.id").await;
    response.assert_status_not_found();
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "NotFound");

    // matches the registry but the object does not exist
    let response = fixture.server.get("/variants/sample").await;
    response.assert_status_not_found();
}

#[tokio::test]
async fn test_data_dir_ids_stay_inside_the_directory() {
    let root = tempfile::tempdir().unwrap();
    let data_dir = root.path().join("data");
    std::fs::create_dir(&data_dir).unwrap();
    std::fs::write(data_dir.join("sample.bam"), OBJECT).unwrap();
    std::fs::write(root.path().join("secret.bam"), b"secret").unwrap();

    let config = Config {
        data_dir,
        ..Config::parse_from(["htsget-refserver"])
    };
    let (reads, variants) = config.registries().unwrap();
    let server = server(10, reads, variants, Tools::default());

    server.get("/reads/data/sample").await.assert_status_ok();
    for path in [
        "/reads/data/..%2Fsecret",
        "/reads/..%2Fsecret",
        "/reads/data/..%2F..%2Fdata%2Fsample",
    ] {
        let response = server.get(path).await;
        response.assert_status_not_found();
        let body: Value = response.json();
        assert_eq!(body["htsget"]["error"], "NotFound", "{}", path);
    }
}

#[tokio::test]
async fn test_format_conversion_ticket() {
    let fixture = fixture(10);

    let body: Value = fixture.server.get("/variants/sample?format=BCF").await.json();
    assert_eq!(body["htsget"]["format"], "BCF");
    let urls = urls(&body);
    assert_eq!(urls.len(), 2);
    assert_eq!(urls[0]["class"], "header");
    assert_eq!(urls[1]["url"], "http://localhost:3000/variants/data/sample?format=BCF");
    assert!(urls[1]["headers"].get("Range").is_none());
}

#[tokio::test]
async fn test_block_class_must_match_class() {
    let fixture = fixture(10);

    let response = fixture
        .server
        .get("/reads/data/sample")
        .add_header(
            HeaderName::from_static("htsgetblockclass"),
            HeaderValue::from_static("header"),
        )
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "InvalidInput");
}

#[tokio::test]
async fn test_validation_errors() {
    let fixture = fixture(10);

    let cases = [
        ("/reads/sample?format=CRAM", "UnsupportedFormat"),
        ("/reads/sample?format=VCF", "UnsupportedFormat"),
        ("/reads/sample?start=10", "InvalidRange"),
        ("/reads/sample?referenceName=chr1&start=100&end=50", "InvalidRange"),
        ("/reads/sample?referenceName=chr1&end=0", "InvalidRange"),
        ("/reads/sample?referenceName=*&start=1", "InvalidRange"),
        ("/reads/sample?referenceName=chrZ", "InvalidInput"),
        ("/reads/sample?class=header&referenceName=chr1", "InvalidInput"),
        ("/reads/sample?fields=QNAME,NOPE", "InvalidInput"),
        ("/reads/sample?tags=NM,HI&notags=HI", "InvalidInput"),
        ("/variants/sample?referenceName=*", "InvalidInput"),
    ];

    for (path, error) in cases {
        let response = fixture.server.get(path).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert_eq!(body["htsget"]["error"], error, "{}", path);
    }
}

#[tokio::test]
async fn test_post_rejects_malformed_body() {
    let fixture = fixture(10);

    let response = fixture.server.post("/reads/sample").text("regions: chr1").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "InvalidInput");
}

#[tokio::test]
async fn test_data_endpoint_whole_object() {
    let fixture = fixture(10);

    let response = fixture.server.get("/reads/data/sample").await;
    response.assert_status_ok();
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/vnd.ga4gh.bam"
    );
    assert_eq!(response.as_bytes().as_ref(), OBJECT);
}

#[tokio::test]
async fn test_data_endpoint_partial_content() {
    let fixture = fixture(10);

    let response = fixture
        .server
        .get("/reads/data/sample")
        .add_header(
            HeaderName::from_static("range"),
            HeaderValue::from_static("bytes=5-9"),
        )
        .await;

    response.assert_status(StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers().get("content-range").unwrap(), "bytes 5-9/25");
    assert_eq!(response.headers().get("accept-ranges").unwrap(), "bytes");
    assert_eq!(response.as_bytes().as_ref(), b"56789");
}

#[tokio::test]
async fn test_data_endpoint_range_past_end() {
    let fixture = fixture(10);

    let response = fixture
        .server
        .get("/reads/data/sample")
        .add_header(
            HeaderName::from_static("range"),
            HeaderValue::from_static("bytes=25-"),
        )
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "InvalidRange");
}

#[tokio::test]
async fn test_missing_tool_is_internal_error() {
    let fixture = fixture_with(10, |_| Tools {
        samtools: "/nonexistent/samtools".to_string(),
        ..Tools::default()
    });

    let response = fixture.server.get("/reads/data/sample?class=header").await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["htsget"]["error"], "InternalServerError");
}

#[cfg(unix)]
mod pipeline {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::sync::OnceLock;

    /// Stand-in for `samtools view`: every binary output is `HEADER`, then the
    /// records, then the BGZF EOF block.
    const FAKE_SAMTOOLS: &str = r#"#!/bin/sh
EOF_BLOCK='\037\213\010\004\000\000\000\000\000\377\006\000\102\103\002\000\033\000\003\000\000\000\000\000\000\000\000\000'
shift
shift
case "$1" in
  -H)
    printf 'HEADER'
    printf "$EOF_BLOCK"
    ;;
  -b)
    printf 'HEADER'
    if [ "$2" = "-" ]; then cat; else printf 'BODY[%s]' "$3"; fi
    printf "$EOF_BLOCK"
    ;;
  -h)
    printf '@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:100\n'
    printf 'r1\t0\tchr1\t1\t60\t4M\t*\t0\t0\tACGT\tIIII\tNM:i:0\tMD:Z:4\n'
    ;;
esac
"#;

    /// Written once per test binary; executing a script other threads may
    /// still hold open for writing fails with ETXTBSY.
    fn fake_samtools() -> &'static Path {
        static SCRIPT: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
        let (_, script) = SCRIPT.get_or_init(|| {
            let dir = tempfile::tempdir().unwrap();
            let script = dir.path().join("samtools");
            std::fs::write(&script, FAKE_SAMTOOLS).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            (dir, script)
        });
        script
    }

    fn fake_tools(_: &Path) -> Tools {
        let script = fake_samtools();
        Tools {
            samtools: script.display().to_string(),
            modify_sam: env!("CARGO_BIN_EXE_htsget-modify-sam").to_string(),
            ..Tools::default()
        }
    }

    /// SAM header printed by the stand-in for `samtools view -h`.
    const SAM_HEADER: &str = "@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:100\n";

    fn with_eof(bytes: &[u8]) -> Vec<u8> {
        [bytes, &BGZF_EOF[..]].concat()
    }

    #[tokio::test]
    async fn test_header_only_block_keeps_marker() {
        let fixture = fixture_with(10, fake_tools);

        let body: Value = fixture.server.get("/reads/sample?class=header").await.json();
        assert_eq!(fetch_all(&fixture.server, &body).await, with_eof(b"HEADER"));
    }

    #[tokio::test]
    async fn test_region_blocks_concatenate_into_one_file() {
        let fixture = fixture_with(10, fake_tools);

        let request = json!({
            "regions": [
                {"referenceName": "chr1"},
                {"referenceName": "chr2", "start": 10, "end": 20}
            ]
        });
        let body: Value = fixture.server.post("/reads/sample").json(&request).await.json();
        let urls = urls(&body);
        assert_eq!(urls.len(), 3);

        assert_eq!(fetch(&fixture.server, &urls[0]).await, b"HEADER");
        assert_eq!(fetch(&fixture.server, &urls[1]).await, b"BODY[chr1]");
        assert_eq!(
            fetch(&fixture.server, &urls[2]).await,
            with_eof(b"BODY[chr2:11-20]")
        );

        assert_eq!(
            fetch_all(&fixture.server, &body).await,
            with_eof(b"HEADERBODY[chr1]BODY[chr2:11-20]")
        );
    }

    #[tokio::test]
    async fn test_field_filter_runs_through_modify_sam() {
        let fixture = fixture_with(10, fake_tools);

        let body: Value = fixture
            .server
            .get("/reads/sample?fields=QNAME,SEQ&notags=MD")
            .await
            .json();
        assert_eq!(urls(&body).len(), 2);

        let expected = format!("HEADER{}r1\t0\t*\t0\t0\t*\t*\t0\t0\tACGT\t*\tNM:i:0\n", SAM_HEADER);
        assert_eq!(
            fetch_all(&fixture.server, &body).await,
            with_eof(expected.as_bytes())
        );
    }

    #[tokio::test]
    async fn test_empty_field_list_keeps_no_columns() {
        let fixture = fixture_with(10, fake_tools);

        let body: Value = fixture.server.get("/reads/sample?fields=").await.json();
        let urls = urls(&body);
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[1]["url"], "http://localhost:3000/reads/data/sample?fields=");

        let expected = format!("HEADER{}*\t0\t*\t0\t0\t*\t*\t0\t0\t*\t*\tNM:i:0\tMD:Z:4\n", SAM_HEADER);
        assert_eq!(
            fetch_all(&fixture.server, &body).await,
            with_eof(expected.as_bytes())
        );
    }
}
