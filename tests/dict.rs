// Dictionary integration tests.
//
// Each test documents what behavior is being verified and which
// invariants are assumed or asserted. The core invariants exercised:
// - Identity: equal content interned twice yields handles to one entry.
// - Liveness: an entry is present iff ≥1 reference is outstanding.
// - Bounds: length and refcount limits are errors, not truncation.
// - Concurrency: interleaved intern/release from many threads keeps
//   refcounts exact.
use intern_table::{DictError, Dictionary, Interned, Released, DICT_MAX_LEN, DICT_MAX_REFCOUNT};
use std::sync::Arc;

// Test: intern idempotence and release ordering.
// Assumes: each intern owns exactly one release.
// Verifies: two interns share one entry with refcount 2; the second
// release frees it; interning again creates a fresh entry.
#[test]
fn intern_twice_release_twice() {
    let d = Dictionary::new();
    let a = d.intern("eth0").unwrap();
    let b = d.intern("eth0").unwrap();
    assert_eq!(a, b);
    assert_eq!(d.refcount(&a), 2);
    assert_eq!(d.len(), 1);

    assert_eq!(d.release(a), Released::Live);
    assert_eq!(d.refcount(&b), 1);
    assert!(d.contains("eth0"));

    assert_eq!(d.release(b), Released::Freed);
    assert!(!d.contains("eth0"));
    assert!(d.is_empty());

    let c = d.intern("eth0").unwrap();
    assert_eq!(d.refcount(&c), 1);
    assert_eq!(d.len(), 1);
    d.release(c);
}

// Test: handle read access.
// Assumes: content is readable without holding the dictionary lock.
// Verifies: accessors, Deref and Display expose the interned bytes.
#[test]
fn handle_exposes_content() {
    let d = Dictionary::new();
    let h = d.intern("ietf-interfaces").unwrap();
    assert_eq!(h.as_str(), "ietf-interfaces");
    assert_eq!(h.as_bytes(), b"ietf-interfaces");
    assert_eq!(h.len(), 15);
    assert!(!h.is_empty());
    assert!(h.starts_with("ietf"));
    assert_eq!(h.to_string(), "ietf-interfaces");
    assert_eq!(format!("{:?}", h), "Interned(\"ietf-interfaces\")");

    let empty = d.intern("").unwrap();
    assert!(empty.is_empty());
    assert_ne!(empty, h);
    d.release(h);
    d.release(empty);
}

// Test: length bound.
// Assumes: the limit is 1023 bytes.
// Verifies: 1023 bytes is accepted, 1024 is refused without side effects.
#[test]
fn length_bound_is_enforced() {
    let d = Dictionary::new();
    let ok = "x".repeat(DICT_MAX_LEN);
    let h = d.intern(&ok).unwrap();
    assert_eq!(h.len(), 1023);

    let long = "x".repeat(DICT_MAX_LEN + 1);
    assert_eq!(
        d.intern(&long),
        Err(DictError::TooLong { len: 1024, max: 1023 })
    );
    assert_eq!(
        d.intern_owned(long.clone()),
        Err(DictError::TooLong { len: 1024, max: 1023 })
    );
    assert!(!d.contains(&long));
    assert_eq!(d.len(), 1);
    d.release(h);
}

// Test: UTF-8 content.
// Assumes: the length bound counts bytes, not characters.
// Verifies: 511 two-byte characters fit, 512 do not.
#[test]
fn length_bound_counts_utf8_bytes() {
    let d = Dictionary::new();
    let fits = "é".repeat(511);
    let h = d.intern(&fits).unwrap();
    assert_eq!(h.len(), 1022);
    assert_eq!(h.chars().count(), 511);

    let over = "é".repeat(512);
    assert_eq!(
        d.intern(&over),
        Err(DictError::TooLong { len: 1024, max: 1023 })
    );
    d.release(h);
    assert!(d.is_empty());
}

// Test: NUL-free content.
// Verifies: strings with NUL bytes are refused.
#[test]
fn nul_bytes_are_refused() {
    let d = Dictionary::new();
    assert_eq!(d.intern("a\0b"), Err(DictError::InteriorNul));
    assert!(d.is_empty());
}

// Test: refcount bound.
// Assumes: the limit is 2^22 - 1 references per entry.
// Verifies: the 4,194,304th intern of the same content fails and the
// count stays at the bound.
#[test]
fn refcount_bound_is_enforced() {
    let d = Dictionary::new();
    let first = d.intern("loopback").unwrap();
    for _ in 1..DICT_MAX_REFCOUNT {
        // Forgetting keeps the reference counted without holding millions
        // of handles; the dictionary is cleaned below.
        std::mem::forget(d.intern("loopback").unwrap());
    }
    assert_eq!(d.refcount(&first), DICT_MAX_REFCOUNT);
    assert_eq!(
        d.intern("loopback"),
        Err(DictError::RefcountOverflow(DICT_MAX_REFCOUNT))
    );
    assert_eq!(d.refcount(&first), DICT_MAX_REFCOUNT);
    assert_eq!(d.release(first), Released::Live);
    assert_eq!(d.clean(), 1);
}

// Test: share and intern_owned.
// Assumes: both add one reference to the existing entry.
// Verifies: all handles compare equal and refcounts add up.
#[test]
fn share_and_owned_intern_join_existing_entry() {
    let d = Dictionary::new();
    let a = d.intern("urn:ietf:params:xml:ns:yang:1").unwrap();
    let b = d.share(&a).unwrap();
    let c = d
        .intern_owned("urn:ietf:params:xml:ns:yang:1".to_string())
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(d.refcount(&a), 3);
    assert_eq!(d.len(), 1);

    let fresh = d.intern_owned("yang".to_string()).unwrap();
    assert_eq!(d.len(), 2);
    for h in [a, b, c, fresh] {
        d.release(h);
    }
    assert!(d.is_empty());
}

// Test: teardown.
// Assumes: clean frees entries whatever their refcount.
// Verifies: clean reports the surviving entries.
#[test]
fn clean_reports_survivors() {
    let _ = env_logger::builder().is_test(true).try_init();
    let d = Dictionary::new();
    let kept: Vec<Interned> = ["a", "b", "c", "a"]
        .iter()
        .map(|s| d.intern(s).unwrap())
        .collect();
    assert_eq!(d.len(), 3);
    // Context teardown: outstanding handles are abandoned with their entries.
    kept.into_iter().for_each(std::mem::forget);
    assert_eq!(d.clean(), 3);

    assert_eq!(Dictionary::default().clean(), 0);
}

// Test: misuse detection.
// Assumes: a handle may only be released to the dictionary that issued it.
// Verifies: releasing into another dictionary panics and leaves both
// dictionaries untouched.
#[test]
fn foreign_handle_release_panics() {
    let d1 = Dictionary::new();
    let d2 = Dictionary::new();
    let h = d1.intern("eth0").unwrap();
    let keep = d2.intern("eth0").unwrap();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        d2.release(h);
    }));
    assert!(res.is_err(), "expected a panic for a foreign handle");
    assert_eq!(d2.refcount(&keep), 1);
    assert_eq!(d2.release(keep), Released::Freed);
    // The reference `h` owned was lost in the panic, so d1 keeps its entry.
    assert!(d1.contains("eth0"));
    assert_eq!(d1.clean(), 1);
}

// Test: dropping a handle without release.
// Assumes: debug builds enforce the linear handle discipline.
// Verifies: the drop panics.
#[cfg(debug_assertions)]
#[test]
fn dropping_handle_without_release_panics() {
    let d = Dictionary::new();
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let h = d.intern("leak").unwrap();
        drop(h);
    }));
    assert!(res.is_err());
}

// Test: concurrent interning.
// Assumes: the dictionary serializes every operation under its lock.
// Verifies: refcounts equal the number of outstanding handles across
// threads, and all entries are freed once every thread releases.
#[test]
fn concurrent_intern_and_release() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;
    let d = Arc::new(Dictionary::new());
    let names: Vec<String> = (0..32).map(|i| format!("if-{}", i)).collect();

    let held: Vec<Vec<Interned>> = std::thread::scope(|s| {
        let workers: Vec<_> = (0..THREADS)
            .map(|t| {
                let d = Arc::clone(&d);
                let names = &names;
                s.spawn(move || {
                    let mut mine = Vec::new();
                    for r in 0..ROUNDS {
                        let h = d.intern(&names[(t + r) % names.len()]).unwrap();
                        if r % 3 == 0 {
                            d.release(h);
                        } else {
                            mine.push(h);
                        }
                    }
                    mine
                })
            })
            .collect();
        workers.into_iter().map(|w| w.join().unwrap()).collect()
    });

    let outstanding: usize = held.iter().map(Vec::len).sum();
    let mut total = 0;
    for name in &names {
        if d.contains(name) {
            let probe = d.intern(name).unwrap();
            total += d.refcount(&probe) as usize - 1;
            d.release(probe);
        }
    }
    assert_eq!(total, outstanding);

    std::thread::scope(|s| {
        for mine in held {
            let d = Arc::clone(&d);
            s.spawn(move || {
                for h in mine {
                    d.release(h);
                }
            });
        }
    });
    assert!(d.is_empty());
}
