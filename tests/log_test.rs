use borsh::{BorshDeserialize, BorshSerialize};
use serde_json::json;
use viewstamped_rs::types::{
    data_types::{CryptoHash, LogNumber, ViewNumber},
    log::{Log, LogEntry, LogEntryBytes, LogError},
};

fn entry(key: &str, viewno: u64) -> LogEntry {
    LogEntry::new(json!(["write", key, "v"]), ViewNumber::new(viewno))
}

fn log_of(first: u64, entries: &[LogEntry]) -> Log {
    let mut log = Log::new(LogNumber::new(first), true);
    for entry in entries {
        log.append(entry.clone());
    }
    log
}

#[test]
fn log_entry_test() {
    let empty = LogEntry::empty();
    assert!(empty.is_empty());
    assert_eq!(empty, LogEntry::default());
    assert_eq!(empty.to_string(), "~empty~");

    let write = entry("x", 3);
    assert!(!write.is_empty());
    assert_eq!(write.viewno(), ViewNumber::new(3));
    assert_eq!(write.to_string(), r#"["write","x","v"]@3"#);

    // Entries hash by content and view.
    assert_eq!(write.hash(), entry("x", 3).hash());
    assert_ne!(write.hash(), entry("x", 4).hash());
    assert_ne!(write.hash(), entry("y", 3).hash());
}

#[test]
fn log_entry_bytes_test() {
    let original = entry("x", 3);
    let bytes = LogEntryBytes::from(&original).try_to_vec().unwrap();
    let decoded = LogEntry::try_from(LogEntryBytes::try_from_slice(&bytes).unwrap()).unwrap();
    assert_eq!(decoded, original);
}

#[test]
fn append_and_get_test() {
    let mut log = Log::new(LogNumber::new(10), true);
    assert!(log.is_empty());
    assert_eq!(log.first(), log.last());

    assert_eq!(log.append(entry("a", 1)), LogNumber::new(10));
    assert_eq!(log.append(entry("b", 1)), LogNumber::new(11));
    assert_eq!(log.len(), 2);
    assert_eq!(log.last(), LogNumber::new(12));

    assert_eq!(log.get(LogNumber::new(11)), Some(&entry("b", 1)));
    assert_eq!(log.get(LogNumber::new(9)), None);
    assert_eq!(log.get(LogNumber::new(12)), None);
    assert!(log.contains(LogNumber::new(10)));
    assert!(!log.contains(LogNumber::new(12)));

    let positions: Vec<LogNumber> = log.iter().map(|(logno, _)| logno).collect();
    assert_eq!(positions, vec![LogNumber::new(10), LogNumber::new(11)]);
}

#[test]
fn set_fills_holes_test() {
    let mut log = log_of(0, &[entry("a", 1)]);

    log.set(LogNumber::new(3), entry("d", 2)).unwrap();
    assert_eq!(log.last(), LogNumber::new(4));
    assert!(log.get(LogNumber::new(1)).unwrap().is_empty());
    assert!(log.get(LogNumber::new(2)).unwrap().is_empty());
    assert_eq!(log.get(LogNumber::new(3)), Some(&entry("d", 2)));

    log.set(LogNumber::new(1), entry("b", 2)).unwrap();
    assert_eq!(log.get(LogNumber::new(1)), Some(&entry("b", 2)));
    assert_eq!(log.len(), 4);

    log.set(LogNumber::new(4), entry("e", 2)).unwrap();
    assert_eq!(log.last(), LogNumber::new(5));
}

#[test]
fn truncate_and_trim_test() {
    let entries: Vec<LogEntry> = ["a", "b", "c", "d", "e"]
        .iter()
        .map(|key| entry(key, 1))
        .collect();
    let mut log = log_of(0, &entries);

    log.truncate(LogNumber::new(4));
    assert_eq!(log.last(), LogNumber::new(4));

    log.trim_before(LogNumber::new(2));
    assert_eq!(log.first(), LogNumber::new(2));
    assert_eq!(log.get(LogNumber::new(2)), Some(&entry("c", 1)));
    assert_eq!(
        log.set(LogNumber::new(1), entry("x", 1)),
        Err(LogError::Trimmed {
            logno: LogNumber::new(1),
            first: LogNumber::new(2),
        })
    );

    // Truncating below the first position empties the log.
    let mut emptied = log.clone();
    emptied.truncate(LogNumber::new(0));
    assert!(emptied.is_empty());
    assert_eq!(emptied.first(), LogNumber::new(2));

    // Trimming past the end leaves an empty log starting at the trim point.
    log.trim_before(LogNumber::new(9));
    assert!(log.is_empty());
    assert_eq!(log.first(), LogNumber::new(9));
    assert_eq!(log.append(entry("z", 2)), LogNumber::new(9));

    // Logs that keep everything ignore trimming.
    let mut kept = Log::new(LogNumber::new(0), false);
    kept.append(entry("a", 1));
    kept.trim_before(LogNumber::new(1));
    assert_eq!(kept.first(), LogNumber::new(0));
    assert_eq!(kept.len(), 1);
}

#[test]
fn digest_test() {
    let entries: Vec<LogEntry> = ["a", "b", "c"].iter().map(|key| entry(key, 1)).collect();
    let ours = log_of(0, &entries);
    let theirs = log_of(0, &entries);

    assert_eq!(
        ours.digest(LogNumber::new(0), LogNumber::new(3)),
        theirs.digest(LogNumber::new(0), LogNumber::new(3))
    );
    assert_eq!(
        ours.digest(LogNumber::new(1), LogNumber::new(1)),
        Ok(CryptoHash::new([0u8; 32]))
    );

    let mut diverged = theirs.clone();
    diverged.set(LogNumber::new(2), entry("c", 2)).unwrap();
    assert_eq!(
        ours.digest(LogNumber::new(0), LogNumber::new(2)),
        diverged.digest(LogNumber::new(0), LogNumber::new(2))
    );
    assert_ne!(
        ours.digest(LogNumber::new(0), LogNumber::new(3)),
        diverged.digest(LogNumber::new(0), LogNumber::new(3))
    );

    assert_eq!(
        ours.digest(LogNumber::new(0), LogNumber::new(4)),
        Err(LogError::OutOfRange {
            from: LogNumber::new(0),
            to: LogNumber::new(4),
            first: LogNumber::new(0),
            last: LogNumber::new(3),
        })
    );
}

#[test]
fn matching_logno_test() {
    let ours = log_of(
        0,
        &[entry("a", 1), entry("b", 1), entry("c", 1), entry("d", 1)],
    );

    // Identical suffix: everything matches up to the end of the shorter log.
    assert_eq!(
        ours.matching_logno(LogNumber::new(1), &[entry("b", 1), entry("c", 1)]),
        LogNumber::new(3)
    );

    // Divergence at position 2.
    assert_eq!(
        ours.matching_logno(
            LogNumber::new(0),
            &[entry("a", 1), entry("b", 1), entry("c", 2), entry("d", 1)]
        ),
        LogNumber::new(2)
    );

    // Their entries run past ours.
    assert_eq!(
        ours.matching_logno(
            LogNumber::new(3),
            &[entry("d", 1), entry("e", 1)]
        ),
        LogNumber::new(4)
    );

    // Comparison never starts below what we still hold.
    let mut trimmed = ours.clone();
    trimmed.trim_before(LogNumber::new(2));
    assert_eq!(
        trimmed.matching_logno(
            LogNumber::new(0),
            &[entry("x", 1), entry("y", 1), entry("c", 1)]
        ),
        LogNumber::new(3)
    );
}

#[test]
fn matching_logno_disjoint_test() {
    let ours = log_of(0, &[entry("a", 1)]);

    // A gap between our end and their first entry was never compared.
    assert_eq!(
        ours.matching_logno(LogNumber::new(10), &[entry("k", 2), entry("l", 2)]),
        LogNumber::new(1)
    );

    // Starting exactly at our end compares nothing and claims nothing past it.
    assert_eq!(
        ours.matching_logno(LogNumber::new(1), &[entry("b", 1)]),
        LogNumber::new(1)
    );
}
