// Dictionary property tests.
//
// Property: liveness and refcounts match outstanding handles per string.
//  - Model: per-string Vec of outstanding handles.
//  - Invariant: contains(s) == !live[s].is_empty();
//               refcount == live[s].len() while present;
//               len() == number of strings with outstanding handles.
//  - Operations: intern, intern_owned, share, release-one, release-all.
use intern_table::{Dictionary, Interned, Released};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_dictionary_liveness(
        pool in proptest::collection::vec("[a-z]{0,6}", 1..=6),
        ops in proptest::collection::vec((0u8..=4u8, 0usize..100usize), 1..120),
    ) {
        let d = Dictionary::new();
        let mut live: Vec<Vec<Interned>> = std::iter::repeat_with(Vec::new).take(pool.len()).collect();

        for (op, raw) in ops {
            let i = raw % pool.len();
            let s = &pool[i];
            // The pool may repeat a string; handles for it are tracked under
            // its first index.
            let i = pool.iter().position(|p| p == s).unwrap();
            match op {
                0 => live[i].push(d.intern(s).unwrap()),
                1 => live[i].push(d.intern_owned(s.clone()).unwrap()),
                2 => {
                    if let Some(h) = live[i].last() {
                        let h2 = d.share(h).unwrap();
                        live[i].push(h2);
                    }
                }
                3 => {
                    if let Some(h) = live[i].pop() {
                        let freed = d.release(h) == Released::Freed;
                        prop_assert_eq!(freed, live[i].is_empty());
                    }
                }
                4 => {
                    while let Some(h) = live[i].pop() {
                        d.release(h);
                    }
                }
                _ => unreachable!(),
            }

            prop_assert_eq!(d.contains(s), !live[i].is_empty());
            if let Some(h) = live[i].first() {
                prop_assert_eq!(d.refcount(h) as usize, live[i].len());
                prop_assert_eq!(h.as_str(), s.as_str());
            }
            let present = live.iter().filter(|v| !v.is_empty()).count();
            prop_assert_eq!(d.len(), present);
        }

        for handles in live.iter_mut() {
            while let Some(h) = handles.pop() {
                d.release(h);
            }
        }
        prop_assert!(d.is_empty());
    }
}
