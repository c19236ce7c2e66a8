mod common;

use std::fs;

use alloy::primitives::{Address, B256};

use common::{owner_address, temp_path};
use hai_flow_adapters::PendingTxStore;
use hai_flow_core::PendingTxPort;

#[test]
fn remembered_hash_survives_a_new_store_instance() {
    let path = temp_path("pending-survives");
    let hash = B256::repeat_byte(0x42);

    PendingTxStore::new(&path)
        .remember(hash, owner_address())
        .expect("remember");

    let reopened = PendingTxStore::new(&path);
    assert_eq!(reopened.load(owner_address()).expect("load"), Some(hash));
    assert_eq!(reopened.load(Address::repeat_byte(0x09)).expect("load other"), None);

    reopened.clear(owner_address()).expect("clear");
    assert_eq!(reopened.load(owner_address()).expect("load"), None);
    let _ = fs::remove_file(&path);
}

#[test]
fn missing_file_means_nothing_pending() {
    let store = PendingTxStore::new(temp_path("pending-missing"));
    assert_eq!(store.load(owner_address()).expect("load"), None);
    store.clear(owner_address()).expect("clear is a no-op");
    assert!(!store.path().exists());
}

#[test]
fn corrupt_file_is_rejected() {
    let path = temp_path("pending-corrupt");
    fs::write(&path, b"not json").expect("write fixture");

    let err = PendingTxStore::new(&path)
        .load(owner_address())
        .expect_err("corrupt");
    assert!(err.to_string().contains("corrupt pending tx file"));
    let _ = fs::remove_file(&path);
}
