//! Integration tests for node resolution over real files.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use nestkit::{EntryKind, Error, VirtualNode};
use tempfile::TempDir;

/// 256-byte container: "CONT" at 0, "SUB0" at 100, "DEEP" at 140.
fn write_container(dir: &TempDir) -> String {
    let mut data: Vec<u8> = (0..=255u8).collect();
    data[..4].copy_from_slice(b"CONT");
    data[100..104].copy_from_slice(b"SUB0");
    data[140..144].copy_from_slice(b"DEEP");
    let path = dir.path().join("game.dat");
    fs::write(&path, &data).unwrap();
    path.to_str().unwrap().to_owned()
}

fn overwrite(path: &str, at: usize, bytes: &[u8]) {
    let mut data = fs::read(path).unwrap();
    data[at..at + bytes.len()].copy_from_slice(bytes);
    fs::write(path, data).unwrap();
}

#[test]
fn root_takes_length_and_signature_from_file() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());

    assert_eq!(root.kind(), Some(EntryKind::File));
    assert_eq!(root.length(), 256);
    assert_eq!(root.magic(), *b"CONT");
    assert_eq!(root.name(), "game.dat");
    assert_eq!(root.extension(), Some("dat"));
    assert_eq!(root.primary_path(), Path::new(&path));
    assert!(root.exists());
}

#[test]
fn truncation_breaks_child_but_not_root() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let child = VirtualNode::child(&root, "sub", 100, 16);

    assert_eq!(child.magic(), *b"SUB0");
    assert!(child.exists());

    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(102)
        .unwrap();

    assert!(!child.exists());
    assert!(root.exists());
}

#[test]
fn grandchild_offsets_chain_relative_to_parent() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let sub = VirtualNode::child(&root, "sub", 100, 64);
    let deep = VirtualNode::child(&sub, "deep.bin", 40, 8);

    assert_eq!(deep.magic(), *b"DEEP");
    assert_eq!(deep.full_path(), format!("{path}:sub:deep.bin"));
    assert_eq!(deep.segments().collect::<Vec<_>>(), ["sub", "deep.bin"]);
    assert!(deep.exists());

    let bytes = deep.get_bytes().unwrap();
    assert_eq!(&bytes[..4], b"DEEP");
    assert_eq!(&bytes[4..], &[144, 145, 146, 147]);
}

#[test]
fn changed_ancestor_invalidates_descendants() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let sub = VirtualNode::child(&root, "sub", 100, 64);
    let deep = VirtualNode::child(&sub, "deep", 40, 8);

    overwrite(&path, 100, b"XXXX");

    assert!(root.exists());
    assert!(!sub.exists());
    assert!(!deep.exists());
    // The leaf itself is untouched and still readable.
    assert_eq!(&deep.get_bytes().unwrap()[..4], b"DEEP");
}

#[test]
fn residency_round_trip_is_byte_identical() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let child = VirtualNode::child(&root, "sub", 100, 16);

    let before = child.get_bytes().unwrap();
    assert!(!child.is_active());

    assert!(child.pin());
    assert!(child.is_active());
    let pinned = child.get_bytes().unwrap();

    child.unpin();
    assert!(!child.is_active());
    assert!(child.pin());
    let after = child.get_bytes().unwrap();

    assert_eq!(before, pinned);
    assert_eq!(before, after);
}

#[test]
fn pinned_data_outlives_the_file() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let child = VirtualNode::child(&root, "sub", 100, 16);

    assert!(root.pin());
    fs::remove_file(&path).unwrap();

    assert_eq!(&child.get_bytes().unwrap()[..4], b"SUB0");
    assert!(child.exists());

    root.unpin();
    assert!(child.get_bytes().is_none());
    assert!(!child.is_accessible());
}

#[test]
fn child_built_under_pinned_root_keeps_its_bytes() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());

    assert!(root.pin());
    let child = VirtualNode::child(&root, "sub", 100, 8);
    assert!(child.is_active());

    root.unpin();
    fs::remove_file(&path).unwrap();

    let bytes = child.get_bytes().unwrap();
    assert_eq!(&bytes[..4], b"SUB0");
    assert_eq!(&bytes[4..], &[104, 105, 106, 107]);
    assert!(child.is_accessible());
}

#[test]
fn deleted_file_yields_no_data() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let child = VirtualNode::child(&root, "sub", 100, 16);

    fs::remove_file(&path).unwrap();

    assert!(child.get_bytes().is_none());
    assert!(!child.is_accessible());
    assert!(!child.exists());
    assert!(root.get_bytes().is_none());
    assert!(!root.is_accessible());
}

#[test]
fn inaccessibility_is_sticky() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());

    let bytes = fs::read(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert!(root.get_bytes().is_none());

    fs::write(&path, bytes).unwrap();
    assert!(!root.is_accessible());
    assert!(root.get_bytes().is_none());
    assert!(matches!(root.verify(), Err(Error::Inaccessible)));
}

#[test]
fn missing_path_is_inaccessible_from_the_start() {
    let dir = TempDir::new().unwrap();
    let root = VirtualNode::open(dir.path().join("absent.dat").to_str().unwrap());

    assert!(!root.is_accessible());
    assert_eq!(root.length(), 0);
    assert!(!root.exists());
    assert!(root.get_bytes().is_none());
}

#[test]
fn initialization_is_idempotent_unless_forced() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let child = VirtualNode::child(&root, "sub", 100, 16);

    overwrite(&path, 100, b"NEW!");

    child.initialize(false);
    assert_eq!(child.magic(), *b"SUB0");
    assert!(!child.exists());

    child.initialize(true);
    assert_eq!(child.magic(), *b"NEW!");
    assert!(child.exists());
}

#[test]
fn deferred_root_captures_on_request() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open_deferred(path.as_str());

    assert!(!root.is_initialized());
    assert!(!root.exists());

    root.initialize(false);
    assert_eq!(root.magic(), *b"CONT");
    assert!(root.exists());
}

#[test]
fn directory_root_is_not_a_file() {
    let dir = TempDir::new().unwrap();
    let sub = dir.path().join("folder");
    fs::create_dir(&sub).unwrap();
    let root = VirtualNode::open(sub.to_str().unwrap());

    assert_eq!(root.kind(), Some(EntryKind::Directory));
    assert!(!root.is_initialized());
    assert!(matches!(
        root.verify(),
        Err(Error::NotAFile(_) | Error::Io(_))
    ));
    assert!(!root.is_accessible());
    assert!(!root.exists());
}

#[test]
fn delete_dispatches_on_entry_kind() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let folder = dir.path().join("folder");
    fs::create_dir(&folder).unwrap();

    let file_root = VirtualNode::open(path.as_str());
    let dir_root = VirtualNode::open(folder.to_str().unwrap());

    file_root.delete().unwrap();
    dir_root.delete().unwrap();
    assert!(!Path::new(&path).exists());
    assert!(!folder.exists());
}

#[test]
fn nested_delete_leaves_container_untouched() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let child = VirtualNode::child(&root, "sub", 100, 16);

    assert!(matches!(child.delete(), Err(Error::Unsupported(_))));
    assert_eq!(fs::read(&path).unwrap().len(), 256);
    assert!(child.exists());
}

#[test]
fn file_stays_open_to_other_writers() {
    let dir = TempDir::new().unwrap();
    let path = write_container(&dir);
    let root = VirtualNode::open(path.as_str());
    let child = VirtualNode::child(&root, "sub", 100, 0);

    let mut reader = child.reader().unwrap();
    let mut writer = OpenOptions::new().append(true).open(&path).unwrap();
    writer.write_all(&[0xAA; 4]).unwrap();

    let mut out = Vec::new();
    std::io::Read::read_to_end(&mut reader, &mut out).unwrap();
    assert_eq!(out.len(), 160);
    assert_eq!(&out[156..], &[0xAA; 4]);
}
