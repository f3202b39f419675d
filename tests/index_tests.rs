use blockdupe::{Digest, FileId, HashTree, IndexConfig, IndexError};

const DIGEST_LEN: usize = 16;
const LIMIT: usize = 8;

fn digest(tag: u8) -> [u8; DIGEST_LEN] {
    let mut d = [0u8; DIGEST_LEN];
    d[0] = tag;
    d[DIGEST_LEN - 1] = tag.wrapping_mul(31);
    d
}

fn new_tree() -> HashTree {
    HashTree::new(
        IndexConfig::default()
            .with_digest_len(DIGEST_LEN)
            .with_promote_limit(LIMIT),
    )
    .unwrap()
}

#[test]
fn test_two_files_share_one_digest() {
    let mut tree = new_tree();
    let (f1, f2) = (FileId(1), FileId(2));
    tree.register_file(f1, None).unwrap();
    tree.register_file(f2, None).unwrap();

    let d1 = digest(1);
    tree.insert(&d1, f1, 0, 0).unwrap();
    tree.insert(&d1, f2, 4096, 0).unwrap();

    let group = tree.lookup_group(&d1).unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(tree.num_hashes(), 1);
    assert_eq!(tree.num_blocks(), 2);

    let hits: Vec<u64> = tree
        .iterate_group_for_file(group, f1)
        .map(|(_, block)| block.offset())
        .collect();
    assert_eq!(hits, vec![0]);

    // restartable
    assert_eq!(tree.iterate_group_for_file(group, f1).count(), 1);
    tree.validate().unwrap();
}

#[test]
fn test_lookup_returns_same_group() {
    let mut tree = new_tree();
    tree.register_file(FileId(1), None).unwrap();
    let d = digest(7);

    tree.insert(&d, FileId(1), 0, 0).unwrap();
    let first = tree.lookup_group(&d).unwrap().id();
    tree.insert(&d, FileId(1), 4096, 0).unwrap();
    let second = tree.lookup_group(&d).unwrap().id();

    assert_eq!(first, second);
    assert_eq!(tree.num_hashes(), 1);
}

#[test]
fn test_promotion_past_limit() {
    let mut tree = new_tree();
    let d2 = digest(2);
    for id in 0..=LIMIT as u64 {
        tree.register_file(FileId(id), None).unwrap();
        tree.insert(&d2, FileId(id), id * 4096, 0).unwrap();
    }
    tree.register_file(FileId(1000), None).unwrap();

    let group = tree.lookup_group(&d2).unwrap();
    assert!(group.is_promoted());
    assert_eq!(group.file_count(), Some(LIMIT + 1));
    for id in 0..=LIMIT as u64 {
        assert!(group.contains_file(FileId(id)));
    }
    assert!(!group.contains_file(FileId(1000)));
    tree.validate().unwrap();
}

#[test]
fn test_membership_matches_scan_across_promotion() {
    let mut tree = new_tree();
    let d = digest(3);
    for id in 0..4 {
        tree.register_file(FileId(id), None).unwrap();
    }

    let owners = [0u64, 1, 1, 0, 2, 2, 1, 0, 2, 1];
    for (i, &owner) in owners.iter().enumerate() {
        tree.insert(&d, FileId(owner), i as u64 * 4096, 0).unwrap();
        let group = tree.lookup_group(&d).unwrap();
        for probe in 0..4 {
            let scanned = group.blocks().any(|(_, b)| b.file() == FileId(probe));
            assert_eq!(group.contains_file(FileId(probe)), scanned);
        }
    }
    assert!(tree.lookup_group(&d).unwrap().is_promoted());
}

#[test]
fn test_remove_then_unregister() {
    let mut tree = new_tree();
    let f3 = FileId(3);
    tree.register_file(f3, None).unwrap();
    for (i, tag) in [10u8, 11, 10].into_iter().enumerate() {
        tree.insert(&digest(tag), f3, i as u64 * 4096, 0).unwrap();
    }
    assert_eq!(tree.files().get(f3).unwrap().block_count(), 3);

    let err = tree.unregister_file(f3).unwrap_err();
    assert!(matches!(err, IndexError::InvariantViolation(_)));
    assert!(err.is_fatal());

    assert_eq!(tree.remove_all_for_file(f3).unwrap(), 3);
    assert_eq!(tree.files().get(f3).unwrap().block_count(), 0);
    assert_eq!(tree.num_hashes(), 0);
    assert_eq!(tree.num_blocks(), 0);
    tree.unregister_file(f3).unwrap();
    assert!(!tree.files().contains(f3));
}

#[test]
fn test_remove_decrements_by_file_share() {
    let mut tree = new_tree();
    for id in 1..=3 {
        tree.register_file(FileId(id), None).unwrap();
    }
    let plan = [(1, 1), (1, 2), (2, 1), (2, 3), (3, 3), (1, 4), (2, 4)];
    for (i, (file, tag)) in plan.into_iter().enumerate() {
        tree.insert(&digest(tag), FileId(file), i as u64 * 4096, 0).unwrap();
    }
    assert_eq!(tree.num_hashes(), 4);
    assert_eq!(tree.num_blocks(), 7);

    let removed = tree.remove_all_for_file(FileId(1)).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(tree.num_blocks(), 4);
    // digest 2 was only in file 1
    assert!(tree.lookup_group(&digest(2)).is_none());
    assert_eq!(tree.num_hashes(), 3);
    tree.validate().unwrap();
}

#[test]
fn test_remove_unknown_file() {
    let mut tree = new_tree();
    assert!(matches!(
        tree.remove_all_for_file(FileId(77)),
        Err(IndexError::UnknownFile(FileId(77)))
    ));
}

#[test]
fn test_register_duplicate_identity() {
    let mut tree = new_tree();
    tree.register_file(FileId(5), None).unwrap();
    assert!(matches!(
        tree.register_file(FileId(5), None),
        Err(IndexError::DuplicateIdentity(FileId(5)))
    ));
}

#[test]
fn test_compared_pairs() {
    let mut tree = new_tree();
    let (a, b) = (FileId(10), FileId(20));
    tree.register_file(a, None).unwrap();
    tree.register_file(b, None).unwrap();

    assert!(!tree.were_compared(a, b));
    tree.mark_compared(a, b).unwrap();
    assert!(tree.were_compared(b, a));
}

#[test]
fn test_seen_marks_survive_only_one_pass() {
    let mut tree = new_tree();
    tree.register_file(FileId(1), None).unwrap();
    let block = tree.insert(&digest(1), FileId(1), 0, 0).unwrap();

    assert!(!tree.was_ever_seen(block));
    tree.mark_seen(block);
    assert!(tree.is_seen_this_pass(block));

    tree.advance_pass();
    assert!(!tree.is_seen_this_pass(block));
    assert!(tree.was_ever_seen(block));
}

#[test]
fn test_self_duplicates_within_one_file() {
    let mut tree = new_tree();
    let (f1, f2) = (FileId(1), FileId(2));
    tree.register_file(f1, None).unwrap();
    tree.register_file(f2, None).unwrap();

    let first = tree.insert(&digest(9), f1, 0, 0).unwrap();
    tree.insert(&digest(9), f2, 0, 0).unwrap();
    tree.insert(&digest(9), f1, 65536, 0).unwrap();

    let repeats: Vec<u64> = tree
        .dupes_in_file(first, f1)
        .map(|(_, block)| block.offset())
        .collect();
    assert_eq!(repeats, vec![65536]);
}

#[test]
fn test_stats_json() {
    let mut tree = new_tree();
    tree.register_file(FileId(1), None).unwrap();
    tree.insert(&digest(1), FileId(1), 0, 0).unwrap();

    let json = tree.stats().to_json().unwrap();
    assert!(json.contains("\"distinct_hashes\": 1"));
    assert!(json.contains("\"blocks\": 1"));
}

#[test]
fn test_sha256_digests_from_hex() {
    // SHA-256 of an empty block and of "abc"
    let empty =
        Digest::from_hex("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
            .unwrap();
    let abc = Digest::from_hex("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        .unwrap();

    let mut tree = HashTree::with_defaults();
    for id in 1..=3 {
        tree.register_file(FileId(id), None).unwrap();
    }
    tree.insert(empty.as_bytes(), FileId(1), 0, 0).unwrap();
    tree.insert(abc.as_bytes(), FileId(1), 4096, 0).unwrap();
    tree.insert(empty.as_bytes(), FileId(2), 0, 0).unwrap();
    tree.insert(empty.as_bytes(), FileId(3), 8192, 0).unwrap();

    let dupes = tree.duplicate_groups();
    assert_eq!(dupes.len(), 1);
    assert_eq!(dupes[0].digest(), &empty);
    assert_eq!(dupes[0].len(), 3);
    assert_eq!(
        dupes[0].digest().to_string(),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
    assert_eq!(tree.lookup_group(abc.as_bytes()).unwrap().len(), 1);
}
