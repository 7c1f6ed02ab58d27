use coordtree::{ErrorKind, store::StoreError};

use crate::helpers::*;

#[tokio::test]
async fn test_numbers_are_stored_as_text() {
    let (_, store) = test_store().await;
    store.create_i32("/count", -42, false, false).await.unwrap();
    store.create_i64("/big", i64::MAX, false, false).await.unwrap();

    assert_eq!(store.get("/count").await.unwrap(), b"-42");
    assert_eq!(store.get_i32("/count").await.unwrap(), -42);
    assert_eq!(store.get_i64("/big").await.unwrap(), i64::MAX);

    store.set_i32("/count", 7).await.unwrap();
    assert_eq!(store.get_i64("/count").await.unwrap(), 7);
}

#[tokio::test]
async fn test_booleans_decode_leniently() {
    let (_, store) = test_store().await;
    store.create_bool("/flag", true, false, false).await.unwrap();
    assert!(store.get_bool("/flag").await.unwrap());

    for (text, expected) in [("TRUE", true), ("false", false), ("1", false), ("", false)] {
        store.set_string("/flag", text).await.unwrap();
        assert_eq!(store.get_bool("/flag").await.unwrap(), expected, "{text:?}");
    }
}

#[tokio::test]
async fn test_undecodable_payload_is_invalid_argument() {
    let (_, store) = test_store().await;
    store.create_string("/name", "not a number", false, false).await.unwrap();

    let err = store.get_i32("/name").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(matches!(
        err,
        coordtree::Error::Store(StoreError::Decode { expected: "i32", .. })
    ));

    store.set_i64("/name", i64::MIN).await.unwrap();
    assert!(store.get_i32("/name").await.unwrap_err().is_invalid_argument());
    assert_eq!(store.get_string("/name").await.unwrap(), i64::MIN.to_string());
}

#[tokio::test]
async fn test_typed_reads_of_missing_nodes() {
    let (_, store) = test_store().await;
    assert!(store.get_string("/missing").await.unwrap_err().is_not_found());
    assert!(store.get_bool("/missing").await.unwrap_err().is_not_found());
}
