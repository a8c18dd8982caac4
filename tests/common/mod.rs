//! Shared helpers for the wiremock-backed integration tests

#![allow(dead_code)]

use gcloud_client::bigquery::Bigquery;
use gcloud_client::storage::Storage;
use gcloud_client::{ClientConfig, GcpClient, GcpCredentials};
use serde_json::{json, Value};
use wiremock::MockServer;

pub const PROJECT: &str = "test-project";
pub const TOKEN: &str = "test-token";

/// Config pointing at the mock server, with retries and backoff disabled
pub fn config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        retries: 0,
        backoff_base_ms: 0,
        ..ClientConfig::with_endpoint(&server.uri())
    }
}

pub fn client_with(config: ClientConfig) -> GcpClient {
    GcpClient::with_credentials(config, GcpCredentials::from_token(TOKEN))
        .expect("valid test config")
}

pub fn client(server: &MockServer) -> GcpClient {
    client_with(config(server))
}

pub fn bigquery(server: &MockServer) -> Bigquery {
    Bigquery::with_client(client(server), PROJECT)
}

pub fn storage(server: &MockServer) -> Storage {
    Storage::with_client(client(server), PROJECT)
}

pub fn bq_path(rest: &str) -> String {
    format!("/bigquery/v2/projects/{}/{}", PROJECT, rest)
}

/// Dataset as returned by `datasets.list`
pub fn dataset_summary(dataset_id: &str) -> Value {
    json!({
        "kind": "bigquery#dataset",
        "id": format!("{}:{}", PROJECT, dataset_id),
        "datasetReference": {"projectId": PROJECT, "datasetId": dataset_id},
        "friendlyName": "My Dataset"
    })
}

/// Dataset as returned by `datasets.get`
pub fn dataset_full(dataset_id: &str) -> Value {
    let mut value = dataset_summary(dataset_id);
    let extra = json!({
        "etag": "etag123456789",
        "selfLink": format!("http://googleapi/bigquery/v2/projects/{}/datasets/{}", PROJECT, dataset_id),
        "description": "This is my dataset",
        "defaultTableExpirationMs": "100",
        "creationTime": "1440000000000",
        "lastModifiedTime": "1440000000001",
        "location": "US"
    });
    if let (Some(target), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        target.extend(extra.clone());
    }
    value
}

/// Table or view as returned by `tables.list`
pub fn table_summary(dataset_id: &str, table_id: &str, kind: &str) -> Value {
    json!({
        "kind": "bigquery#table",
        "id": format!("{}:{}.{}", PROJECT, dataset_id, table_id),
        "tableReference": {"projectId": PROJECT, "datasetId": dataset_id, "tableId": table_id},
        "friendlyName": "My Table",
        "type": kind
    })
}

/// Table as returned by `tables.get`
pub fn table_full(dataset_id: &str, table_id: &str) -> Value {
    let mut value = table_summary(dataset_id, table_id, "TABLE");
    let extra = json!({
        "etag": "etag123456789",
        "selfLink": "http://googleapi/bigquery/v2/projects/test-project/datasets/my_dataset/tables/my_table",
        "description": "This is my table",
        "numBytes": "1000",
        "numRows": "100",
        "creationTime": "1440000000000",
        "lastModifiedTime": "1440000000001",
        "location": "US",
        "schema": {
            "fields": [
                {"name": "name", "type": "STRING", "mode": "REQUIRED"},
                {"name": "age", "type": "INTEGER", "mode": "NULLABLE"},
                {"name": "score", "type": "FLOAT", "mode": "NULLABLE"},
                {"name": "active", "type": "BOOLEAN", "mode": "NULLABLE"}
            ]
        }
    });
    if let (Some(target), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
        target.extend(extra.clone());
    }
    value
}

/// Bucket as returned by `buckets.get`
pub fn bucket_full(name: &str) -> Value {
    json!({
        "kind": "storage#bucket",
        "id": name,
        "name": name,
        "selfLink": format!("https://www.googleapis.com/storage/v1/b/{}", name),
        "projectNumber": "1234567890",
        "timeCreated": "2015-08-19T15:20:00.000Z",
        "metageneration": "1",
        "owner": {"entity": "project-owners-1234567890"},
        "location": "US",
        "storageClass": "STANDARD",
        "etag": "CAE="
    })
}

/// Object as returned by `objects.get`
pub fn file_full(bucket: &str, name: &str) -> Value {
    json!({
        "kind": "storage#object",
        "id": format!("{}/{}/1234567890", bucket, name),
        "selfLink": format!("https://www.googleapis.com/storage/v1/b/{}/o/{}", bucket, name),
        "name": name,
        "bucket": bucket,
        "generation": "1234567890",
        "metageneration": "1",
        "contentType": "text/plain",
        "timeCreated": "2015-08-19T15:20:00.000Z",
        "updated": "2015-08-19T15:20:00.000Z",
        "storageClass": "STANDARD",
        "size": "8",
        "md5Hash": "HXB937GQDFxDFqUGi//weQ==",
        "mediaLink": format!("https://www.googleapis.com/download/storage/v1/b/{}/o/{}?alt=media", bucket, name),
        "crc32c": "Lm1F3g==",
        "etag": "CKih16GjycICEAE="
    })
}
