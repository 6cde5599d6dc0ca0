#![cfg(not(test))]

use super::*;

fn create_client() -> GcsClient {
    GcsClient::new(std::env::var("GCS_ACCESS_TOKEN").expect("GCS_ACCESS_TOKEN not set"))
}

#[tokio::test]
async fn can_put_object() {
    let client = create_client();
    let bucket = std::env::var("GCS_TEST_BUCKET").expect("GCS_TEST_BUCKET not set");
    let path = format!("test/{}.txt", rand::random::<u64>());
    client.put(&bucket, &path, b"test data").await.unwrap();
}

#[tokio::test]
async fn bad_token_is_rejected() {
    let client = GcsClient::new("invalid");
    let bucket = std::env::var("GCS_TEST_BUCKET").expect("GCS_TEST_BUCKET not set");
    let err = client.put(&bucket, "test/denied.txt", b"x").await.unwrap_err();
    assert!(matches!(err, ObjectStoreError::Api(_)));
}
