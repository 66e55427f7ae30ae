use std::io::Write;

use tempfile::TempDir;
use vanish_storage::*;

const ID: &str = "3f2b8c1e-7d4a-4f6e-9a0b-1c2d3e4f5a6b";

async fn storage(temp: &TempDir) -> Storage {
    Storage::builder().root(temp.path().join("uploads")).connect().await.unwrap()
}

#[tokio::test]
async fn connect_creates_and_canonicalizes_root() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    assert!(storage.root().is_absolute());
    assert!(storage.root().exists());
}

#[tokio::test]
async fn connect_without_create_fails_on_missing_root() {
    let temp = TempDir::new().unwrap();
    let err = Storage::builder()
        .root(temp.path().join("missing"))
        .create(false)
        .connect()
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
}

#[tokio::test]
async fn traversal_is_blocked() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;

    assert!(storage.resolve("../etc/passwd").is_err());
    assert!(storage.resolve("foo/../../bar").is_err());
    assert!(matches!(storage.entry("../x"), Err(StorageError::InvalidEntryId { .. })));

    let entry = storage.entry(ID).unwrap();
    assert!(entry.write("../outside.txt", b"x").await.is_err());
    assert!(!temp.path().join("outside.txt").exists());
}

#[tokio::test]
async fn members_round_trip_through_open() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let entry = storage.entry(ID).unwrap();

    entry.write("a.txt", b"alpha").await.unwrap();
    entry.write("b.txt", b"beta!").await.unwrap();

    let (mut file, len) = entry.open("b.txt").await.unwrap();
    assert_eq!(len, 5);
    let mut buf = String::new();
    tokio::io::AsyncReadExt::read_to_string(&mut file, &mut buf).await.unwrap();
    assert_eq!(buf, "beta!");

    let mut members = entry.members().await.unwrap();
    members.sort();
    assert_eq!(members, vec!["a.txt".to_owned(), "b.txt".to_owned()]);
}

#[tokio::test]
async fn write_with_streams_into_place() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let entry = storage.entry(ID).unwrap();

    let len = entry
        .write_with("data.bin", |file| {
            file.write_all(&[7u8; 1024])?;
            file.write_all(b"tail")
        })
        .await
        .unwrap();
    assert_eq!(len, 1028);
    assert_eq!(entry.members().await.unwrap(), vec!["data.bin".to_owned()]);
}

#[tokio::test]
async fn failed_fill_leaves_no_member_behind() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let entry = storage.entry(ID).unwrap();

    let err = entry
        .write_with("broken.zip", |_| Err(std::io::Error::other("disk full")))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Io { .. }));
    assert!(!entry.exists("broken.zip").await.unwrap());
    assert!(entry.members().await.unwrap().is_empty());
}

#[tokio::test]
async fn remove_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;
    let entry = storage.entry(ID).unwrap();

    entry.write("f.txt", b"x").await.unwrap();
    assert!(entry.is_present().await);
    assert!(entry.remove().await.unwrap());
    assert!(!entry.remove().await.unwrap());
    assert!(!entry.is_present().await);

    let err = entry.open("f.txt").await.unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(entry.members().await, Err(StorageError::DirectoryNotFound { .. })));
}

#[tokio::test]
async fn entry_dirs_lists_every_entry() {
    let temp = TempDir::new().unwrap();
    let storage = storage(&temp).await;

    for id in ["b-entry", "a-entry"] {
        storage.entry(id).unwrap().create().await.unwrap();
    }

    let ids: Vec<String> = storage.entry_dirs().await.unwrap().into_iter().map(|s| s.id).collect();
    assert_eq!(ids, vec!["a-entry".to_owned(), "b-entry".to_owned()]);
}
