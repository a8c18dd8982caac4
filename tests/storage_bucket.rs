//! Bucket and file handles against a mocked Cloud Storage API

mod common;

use common::{bucket_full, file_full, PROJECT};
use gcloud_client::storage::{
    Bucket, BucketOptions, CorsRuleOptions, FileListOptions, FileOptions, PredefinedAcl, Storage,
};
use gcloud_client::{ClientConfig, ListOptions, Resource};
use serde_json::{json, Value};
use wiremock::matchers::{
    body_partial_json, body_string_contains, header, method, path, query_param,
    query_param_is_missing,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_bucket(server: &MockServer, value: Value) {
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket"))
        .respond_with(ResponseTemplate::new(200).set_body_json(value))
        .mount(server)
        .await;
}

async fn bucket(server: &MockServer) -> Bucket {
    common::storage(server)
        .bucket("my-bucket")
        .await
        .unwrap()
        .unwrap()
}

fn with(mut base: Value, extra: Value) -> Value {
    if let (Some(target), Value::Object(extra)) = (base.as_object_mut(), extra) {
        target.extend(extra);
    }
    base
}

fn existing_cors() -> Value {
    json!([{
        "maxAgeSeconds": 300,
        "origin": ["http://example.org", "https://example.org"],
        "method": ["*"],
        "responseHeader": ["X-My-Custom-Header"]
    }])
}

#[tokio::test]
async fn test_buckets_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b"))
        .and(query_param("project", PROJECT))
        .and(query_param("prefix", "my-"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "storage#buckets",
            "items": [
                {"kind": "storage#bucket", "name": "my-bucket", "id": "my-bucket"},
                {"kind": "storage#bucket", "name": "my-other", "id": "my-other"}
            ],
            "nextPageToken": "next"
        })))
        .mount(&server)
        .await;

    let storage = common::storage(&server);
    let page = storage
        .buckets(&ListOptions {
            prefix: Some("my-".to_string()),
            ..ListOptions::default()
        })
        .await
        .unwrap();
    let names: Vec<&str> = page.iter().map(Bucket::name).collect();
    assert_eq!(names, vec!["my-bucket", "my-other"]);
    assert_eq!(page.next_options().and_then(|o| o.token).as_deref(), Some("next"));
    assert!(!page.items[0].representation().is_full());
}

#[tokio::test]
async fn test_missing_bucket_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/nope"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": 404, "message": "Not Found"}
        })))
        .mount(&server)
        .await;

    let storage = common::storage(&server);
    assert!(storage.bucket("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_create_bucket_with_acls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/b"))
        .and(query_param("project", PROJECT))
        .and(query_param("predefinedAcl", "private"))
        .and(query_param("predefinedDefaultObjectAcl", "publicRead"))
        .and(body_partial_json(json!({"name": "new-bucket", "location": "EU"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(bucket_full("new-bucket")))
        .expect(1)
        .mount(&server)
        .await;

    let storage = common::storage(&server);
    let bucket = storage
        .create_bucket(
            "new-bucket",
            &BucketOptions {
                location: Some("EU".to_string()),
                acl: Some(PredefinedAcl::Private),
                default_acl: Some(PredefinedAcl::PublicRead),
                ..BucketOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(bucket.name(), "new-bucket");
}

#[tokio::test]
async fn test_create_bucket_with_cors_block() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/storage/v1/b"))
        .and(body_partial_json(json!({"cors": [{
            "origin": ["http://example.org"],
            "method": ["GET"],
            "responseHeader": [],
            "maxAgeSeconds": 1800
        }]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(bucket_full("cors-bucket")))
        .expect(1)
        .mount(&server)
        .await;

    let storage = common::storage(&server);
    storage
        .create_bucket_with_cors("cors-bucket", &BucketOptions::default(), |cors| {
            cors.add_rule("http://example.org", "GET", CorsRuleOptions::new());
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_set_versioning() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("PATCH"))
        .and(path("/storage/v1/b/my-bucket"))
        .and(body_partial_json(json!({"versioning": {"enabled": true}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(with(
            bucket_full("my-bucket"),
            json!({"versioning": {"enabled": true}}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut bucket = bucket(&server).await;
    assert!(!bucket.versioning().await.unwrap());
    bucket.set_versioning(true).await.unwrap();
    assert!(bucket.versioning().await.unwrap());
}

#[tokio::test]
async fn test_update_logging_and_website_in_one_patch() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    let patched = with(
        bucket_full("my-bucket"),
        json!({
            "logging": {"logBucket": "my-bucket-logs", "logObjectPrefix": "AccessLog"},
            "website": {"mainPageSuffix": "index.html", "notFoundPage": "404.html"}
        }),
    );
    Mock::given(method("PATCH"))
        .and(path("/storage/v1/b/my-bucket"))
        .and(body_partial_json(json!({
            "logging": {"logBucket": "my-bucket-logs", "logObjectPrefix": "AccessLog"},
            "website": {"mainPageSuffix": "index.html", "notFoundPage": "404.html"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(patched))
        .expect(1)
        .mount(&server)
        .await;

    let mut bucket = bucket(&server).await;
    let sent = bucket
        .update(|b| {
            b.set_logging_bucket("my-bucket-logs");
            b.set_logging_prefix("AccessLog");
            b.set_website_main("index.html");
            b.set_website_404("404.html");
            assert_eq!(b.logging_bucket(), Some("my-bucket-logs"));
        })
        .await
        .unwrap();
    assert!(sent);
    assert_eq!(
        bucket.logging_prefix().await.unwrap().as_deref(),
        Some("AccessLog")
    );
    assert_eq!(
        bucket.website_404().await.unwrap().as_deref(),
        Some("404.html")
    );
}

#[tokio::test]
async fn test_update_with_nested_cors_rules() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    let rules = json!([
        {"origin": ["http://example.org"], "method": ["GET"], "responseHeader": [], "maxAgeSeconds": 1800},
        {"origin": ["http://example.org"], "method": ["PUT", "POST"], "responseHeader": [], "maxAgeSeconds": 1800},
        {"origin": ["*"], "method": ["GET"], "responseHeader": ["X-Custom"], "maxAgeSeconds": 300}
    ]);
    Mock::given(method("PATCH"))
        .and(path("/storage/v1/b/my-bucket"))
        .and(body_partial_json(json!({"versioning": {"enabled": true}, "cors": rules.clone()})))
        .respond_with(ResponseTemplate::new(200).set_body_json(with(
            bucket_full("my-bucket"),
            json!({"versioning": {"enabled": true}, "cors": rules}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut bucket = bucket(&server).await;
    bucket
        .update(|b| {
            b.set_versioning(true);
            b.cors(|c| {
                c.add_rule("http://example.org", "GET", CorsRuleOptions::new());
                c.add_rule("http://example.org", ["PUT", "POST"], CorsRuleOptions::new());
            });
            b.cors(|c| {
                c.add_rule(
                    "*",
                    "GET",
                    CorsRuleOptions::new().headers("X-Custom").max_age(300),
                );
            });
        })
        .await
        .unwrap();
    let cors = bucket.cors().await.unwrap();
    assert_eq!(cors.len(), 3);
    assert_eq!(cors[2].max_age_seconds, Some(300));
}

#[tokio::test]
async fn test_update_cors_edits_existing_rules() {
    let server = MockServer::start().await;
    mount_bucket(
        &server,
        with(bucket_full("my-bucket"), json!({"cors": existing_cors()})),
    )
    .await;
    Mock::given(method("PATCH"))
        .and(path("/storage/v1/b/my-bucket"))
        .and(body_partial_json(json!({"cors": [{
            "origin": ["http://example.org", "https://example.org"],
            "method": ["*"],
            "responseHeader": ["X-My-Custom-Header", "X-Another"],
            "maxAgeSeconds": 600
        }]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(with(
            bucket_full("my-bucket"),
            json!({"cors": [{
                "origin": ["http://example.org", "https://example.org"],
                "method": ["*"],
                "responseHeader": ["X-My-Custom-Header", "X-Another"],
                "maxAgeSeconds": 600
            }]}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let mut bucket = bucket(&server).await;
    let cors = bucket
        .update_cors(|c| {
            let rule = c.get_mut(0).unwrap();
            rule.max_age_seconds = Some(600);
            rule.response_header.push("X-Another".to_string());
        })
        .await
        .unwrap();
    assert_eq!(cors.len(), 1);
    assert_eq!(cors[0].max_age_seconds, Some(600));
}

#[tokio::test]
async fn test_update_without_changes_sends_nothing() {
    let server = MockServer::start().await;
    mount_bucket(
        &server,
        with(bucket_full("my-bucket"), json!({"cors": existing_cors()})),
    )
    .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut bucket = bucket(&server).await;
    let sent = bucket
        .update(|b| {
            b.cors(|c| assert_eq!(c.len(), 1));
        })
        .await
        .unwrap();
    assert!(!sent);
    let cors = bucket.update_cors(|_| {}).await.unwrap();
    assert_eq!(cors.len(), 1);
}

#[tokio::test]
async fn test_files_listing_with_prefixes() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o"))
        .and(query_param("delimiter", "/"))
        .and(query_param_is_missing("versions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "storage#objects",
            "items": [
                {"kind": "storage#object", "bucket": "my-bucket", "name": "top.txt"}
            ],
            "prefixes": ["logs/", "images/"]
        })))
        .mount(&server)
        .await;

    let bucket = bucket(&server).await;
    let page = bucket
        .files(&FileListOptions {
            delimiter: Some("/".to_string()),
            ..FileListOptions::default()
        })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page.items[0].gs_url(), "gs://my-bucket/top.txt");
    assert_eq!(page.prefixes, vec!["logs/", "images/"]);
}

#[tokio::test]
async fn test_file_loads_lazily_and_encodes_name() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"bucket": "my-bucket", "name": "dir/file.txt"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/dir%2Ffile.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_full("my-bucket", "dir/file.txt")))
        .expect(1)
        .mount(&server)
        .await;

    let bucket = bucket(&server).await;
    let mut file = bucket
        .files(&FileListOptions::default())
        .await
        .unwrap()
        .into_iter()
        .next()
        .unwrap();
    assert_eq!(file.size().await.unwrap(), Some(8));
    assert_eq!(file.content_type().await.unwrap().as_deref(), Some("text/plain"));
    assert_eq!(file.md5().await.unwrap().as_deref(), Some("HXB937GQDFxDFqUGi//weQ=="));
    assert!(file.created_at().await.unwrap().is_some());
}

#[tokio::test]
async fn test_create_file_uses_multipart_upload() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/my-bucket/o"))
        .and(query_param("uploadType", "multipart"))
        .and(query_param("predefinedAcl", "publicRead"))
        .and(body_string_contains("\"name\":\"remote/notes.txt\""))
        .and(body_string_contains("Content-Type: text/plain"))
        .and(body_string_contains("some notes"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(file_full("my-bucket", "remote/notes.txt")),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("notes.txt");
    std::fs::write(&local, "some notes").unwrap();

    let bucket = bucket(&server).await;
    let file = bucket
        .create_file(
            &local,
            Some("remote/notes.txt"),
            &FileOptions {
                content_type: Some("text/plain".to_string()),
                acl: Some(PredefinedAcl::PublicRead),
                ..FileOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(file.name(), "remote/notes.txt");
    assert_eq!(file.bucket(), "my-bucket");
}

#[tokio::test]
async fn test_chunked_upload_resends_uncommitted_chunk() {
    const KIB: usize = 1024;
    let size = 600 * KIB;
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/my-bucket/o"))
        .and(query_param("uploadType", "resumable"))
        .and(header("X-Upload-Content-Length", size.to_string().as_str()))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload-session", server.uri()).as_str()),
        )
        .expect(1)
        .mount(&server)
        .await;

    // The first attempt at the first chunk is lost: 308 without a Range header
    Mock::given(method("PUT"))
        .and(path("/upload-session"))
        .and(header("Content-Range", "bytes 0-262143/614400"))
        .respond_with(ResponseTemplate::new(308))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload-session"))
        .and(header("Content-Range", "bytes 0-262143/614400"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-262143"))
        .with_priority(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload-session"))
        .and(header("Content-Range", "bytes 262144-524287/614400"))
        .respond_with(ResponseTemplate::new(308).insert_header("Range", "bytes=0-524287"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload-session"))
        .and(header("Content-Range", "bytes 524288-614399/614400"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_full("my-bucket", "big.bin")))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("big.bin");
    std::fs::write(&local, vec![7u8; size]).unwrap();

    let config = ClientConfig {
        resumable_threshold: 1024,
        ..common::config(&server)
    };
    let storage = Storage::with_client(common::client_with(config), PROJECT);
    let bucket = storage.bucket("my-bucket").await.unwrap().unwrap();
    let file = bucket
        .create_file(
            &local,
            Some("big.bin"),
            &FileOptions {
                chunk_size: Some(256 * KIB as u64),
                ..FileOptions::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(file.name(), "big.bin");

    let ranges: Vec<String> = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "PUT")
        .filter_map(|r| r.headers.get("content-range"))
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        ranges,
        vec![
            "bytes 0-262143/614400",
            "bytes 0-262143/614400",
            "bytes 262144-524287/614400",
            "bytes 524288-614399/614400",
        ]
    );
}

#[tokio::test]
async fn test_chunked_upload_gives_up_when_nothing_commits() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("POST"))
        .and(path("/upload/storage/v1/b/my-bucket/o"))
        .and(query_param("uploadType", "resumable"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Location", format!("{}/upload-session", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/upload-session"))
        .respond_with(ResponseTemplate::new(308))
        .expect(4)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let local = dir.path().join("big.bin");
    std::fs::write(&local, vec![1u8; 300 * 1024]).unwrap();

    let config = ClientConfig {
        resumable_threshold: 1024,
        ..common::config(&server)
    };
    let storage = Storage::with_client(common::client_with(config), PROJECT);
    let bucket = storage.bucket("my-bucket").await.unwrap().unwrap();
    let result = bucket
        .create_file(
            &local,
            None,
            &FileOptions {
                chunk_size: Some(256 * 1024),
                ..FileOptions::default()
            },
        )
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_create_file_rejects_directories() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    let bucket = bucket(&server).await;
    let dir = tempfile::tempdir().unwrap();
    assert!(bucket
        .create_file(dir.path(), None, &FileOptions::default())
        .await
        .is_err());
}

#[tokio::test]
async fn test_file_download_and_update() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/file.txt"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"contents".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/storage/v1/b/my-bucket/o/file.txt"))
        .and(query_param_is_missing("alt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_full("my-bucket", "file.txt")))
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/storage/v1/b/my-bucket/o/file.txt"))
        .and(body_partial_json(json!({
            "cacheControl": "no-cache",
            "metadata": {"player": "Bob"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(with(
            file_full("my-bucket", "file.txt"),
            json!({"cacheControl": "no-cache", "metadata": {"player": "Bob"}}),
        )))
        .expect(1)
        .mount(&server)
        .await;

    let bucket = bucket(&server).await;
    let mut file = bucket.file("file.txt").await.unwrap().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("file.txt");
    assert_eq!(file.download(&target).await.unwrap(), 8);
    assert_eq!(std::fs::read(&target).unwrap(), b"contents");

    assert!(file
        .update(|f| {
            f.set_cache_control("no-cache");
            f.set_metadata("player", "Bob");
        })
        .await
        .unwrap());
    assert_eq!(file.cache_control().await.unwrap().as_deref(), Some("no-cache"));
    assert_eq!(file.metadata().await.unwrap().get("player").map(String::as_str), Some("Bob"));
}

#[tokio::test]
async fn test_delete_bucket_honours_retry_override() {
    let server = MockServer::start().await;
    mount_bucket(&server, bucket_full("my-bucket")).await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/my-bucket"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/storage/v1/b/my-bucket"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let bucket = bucket(&server).await;
    bucket.delete(Some(1)).await.unwrap();
}

#[tokio::test]
async fn test_malformed_cors_is_not_overwritten() {
    let server = MockServer::start().await;
    mount_bucket(
        &server,
        with(bucket_full("my-bucket"), json!({"cors": {"origin": "*"}})),
    )
    .await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200).set_body_json(bucket_full("my-bucket")))
        .expect(0)
        .mount(&server)
        .await;

    let mut bucket = bucket(&server).await;
    assert!(bucket.cors().await.is_err());
    assert!(bucket
        .update_cors(|c| {
            c.add_rule("*", "GET", CorsRuleOptions::new());
        })
        .await
        .is_err());
    assert!(bucket
        .update(|b| b.cors(|c| {
            c.add_rule("*", "GET", CorsRuleOptions::new());
        }))
        .await
        .is_err());
}
