//! Unmount / load round trips through the on-disk image.

use opal_vfs::{Database, EntryKind, FsFlags};
use tempfile::{tempdir, TempDir};

fn serving_db(flags: FsFlags) -> (TempDir, String, Database) {
    let temp = tempdir().unwrap();
    let image = temp.path().join("test_db").to_string_lossy().into_owned();
    let db = Database::new(image.clone(), flags).unwrap();
    db.start_io_controller().unwrap();
    (temp, image, db)
}

fn populate(db: &Database) {
    db.create("/folder0/folder0/file0").unwrap();
    db.write("/folder0/folder0/file0", &[1, 2, 3, 4]).unwrap();
    db.create("/folder1/folder0/file3").unwrap();
    db.write("/folder1/folder0/file3", &[1, 2, 3, 4, 5, 6, 7])
        .unwrap();
    db.create("/folder2/file5/").unwrap();
    db.create("/empty").unwrap();
}

fn assert_recovered(db: &Database) {
    assert_eq!(db.read("/folder0/folder0/file0").unwrap(), vec![1, 2, 3, 4]);
    assert_eq!(
        db.read("/folder1/folder0/file3").unwrap(),
        vec![1, 2, 3, 4, 5, 6, 7]
    );
    assert!(db.check("/folder2/file5/").unwrap().is_directory());
    assert!(db.check("/folder0/").unwrap().is_directory());
    assert_eq!(db.file_size("/empty").unwrap(), 0);
    assert_eq!(db.total_file_sizes(), 11);
}

fn roundtrip(flags: FsFlags) {
    let (_temp, image, db) = serving_db(FsFlags::DB_CREATE);
    populate(&db);
    db.unmount_db(flags).unwrap();

    let loaded = Database::new(image, FsFlags::DB_LOAD | flags).unwrap();
    assert_recovered(&loaded);
    assert_eq!(loaded.file_count(), db.file_count());

    // The reloaded namespace serves a fresh dispatcher.
    loaded.start_io_controller().unwrap();
    loaded.create("/post/load").unwrap();
    loaded.write("/post/load", &[42]).unwrap();
    assert_eq!(loaded.read("/post/load").unwrap(), vec![42]);
}

// ==================== Round trips ====================

#[test]
fn test_roundtrip_plain() {
    roundtrip(FsFlags::empty());
}

#[test]
fn test_roundtrip_compressed() {
    roundtrip(FsFlags::COMPRESS);
}

#[test]
fn test_roundtrip_encrypted() {
    roundtrip(FsFlags::ENCRYPT);
}

#[test]
fn test_roundtrip_all_transforms() {
    roundtrip(FsFlags::ENCRYPT | FsFlags::COMPRESS | FsFlags::COMPRESS_FILES);
}

#[test]
fn test_roundtrip_preserves_path_kind_payload_triples() {
    let (_temp, image, db) = serving_db(FsFlags::DB_CREATE);
    populate(&db);
    db.unmount_db(FsFlags::empty()).unwrap();

    let loaded = Database::new(image, FsFlags::DB_LOAD).unwrap();

    let mut before: Vec<(String, EntryKind, Vec<u8>)> = db
        .file_list()
        .into_iter()
        .map(|(path, kind)| {
            let payload = match kind {
                EntryKind::File => db.read(&path).unwrap(),
                EntryKind::Directory => Vec::new(),
            };
            (path, kind, payload)
        })
        .collect();
    let mut after: Vec<(String, EntryKind, Vec<u8>)> = loaded
        .file_list()
        .into_iter()
        .map(|(path, kind)| {
            let payload = match kind {
                EntryKind::File => loaded.read(&path).unwrap(),
                EntryKind::Directory => Vec::new(),
            };
            (path, kind, payload)
        })
        .collect();
    before.sort();
    after.sort();
    assert_eq!(before, after);
}

// ==================== Commit ====================

#[test]
fn test_commit_persists_and_keeps_serving() {
    let flags = FsFlags::DB_CREATE | FsFlags::COMPRESS | FsFlags::ENCRYPT;
    let (_temp, image, db) = serving_db(flags);
    populate(&db);

    db.commit().unwrap();
    assert_recovered(&db);

    // Still serving after the reload.
    db.create("/after/commit").unwrap();
    db.write("/after/commit", &[5]).unwrap();
    assert_eq!(db.read("/after/commit").unwrap(), vec![5]);

    // And the image on disk matches the committed state.
    let reloaded = Database::new(image, FsFlags::DB_LOAD | FsFlags::COMPRESS | FsFlags::ENCRYPT)
        .unwrap();
    assert_recovered(&reloaded);
    assert!(reloaded.check("/after/commit").is_none());
}

// ==================== Failure modes ====================

#[test]
fn test_load_missing_image_fails() {
    let temp = tempdir().unwrap();
    let image = temp.path().join("absent").to_string_lossy().into_owned();
    assert!(Database::new(image, FsFlags::DB_LOAD).is_err());
}

#[test]
fn test_load_with_wrong_flags_fails() {
    let (_temp, image, db) = serving_db(FsFlags::DB_CREATE);
    populate(&db);
    db.unmount_db(FsFlags::ENCRYPT | FsFlags::COMPRESS).unwrap();

    assert!(Database::new(image, FsFlags::DB_LOAD).is_err());
}

#[test]
fn test_load_corrupted_image_fails() {
    let flags = FsFlags::ENCRYPT | FsFlags::COMPRESS | FsFlags::COMPRESS_FILES;
    let (_temp, image, db) = serving_db(FsFlags::DB_CREATE);
    populate(&db);
    db.unmount_db(flags).unwrap();

    // Flip one bit in the middle of the image.
    let mut raw = std::fs::read(&image).unwrap();
    let mid = raw.len() / 2;
    raw[mid] ^= 0x10;
    std::fs::write(&image, &raw).unwrap();

    assert!(Database::new(image, FsFlags::DB_LOAD | flags).is_err());
}

#[test]
fn test_unmount_overwrites_previous_image() {
    let (_temp, image, db) = serving_db(FsFlags::DB_CREATE);
    populate(&db);
    db.unmount_db(FsFlags::empty()).unwrap();

    db.create("/new_file").unwrap();
    db.write("/new_file", &[1]).unwrap();
    db.unmount_db(FsFlags::empty()).unwrap();

    let loaded = Database::new(image, FsFlags::DB_LOAD).unwrap();
    assert!(loaded.check("/new_file").is_some());
    assert_eq!(loaded.total_file_sizes(), 12);
}
