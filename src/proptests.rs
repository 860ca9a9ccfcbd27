use super::*;

use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

fn validate_tree<R>(t: &RbTree<R>) {
    assert_eq!(
        t.nodes.len(),
        t.entries.len() + 1,
        "every slot but the sentinel must carry an entry"
    );
    assert!(t.nodes[0].left.is_nil() && t.nodes[0].right.is_nil());

    if let Err(violation) = t.check_invariants() {
        panic!("invariant violated: {violation}");
    }

    // Red-black height bound: h <= 2 * log2(n + 1).
    let bound = 2.0 * ((t.len() + 1) as f64).log2();
    assert!(
        t.height() as f64 <= bound,
        "height {} exceeds bound {bound:.2} for {} keys",
        t.height(),
        t.len()
    );
}

/// Narrow alphabet so duplicates are frequent.
fn key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-f]{0,4}").unwrap()
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 3)]
    Insert(#[proptest(strategy = "key_strategy()")] String, u32),
    Find(#[proptest(strategy = "key_strategy()")] String),
    Get(#[proptest(strategy = "key_strategy()")] String),
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 10_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=1000)) {
        let mut t: RbTree<(String, u32)> = RbTree::new();
        let mut m: BTreeMap<String, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let fresh = !m.contains_key(&key);
                    m.entry(key.clone()).or_insert(value);
                    prop_assert_eq!(t.insert((key, value)), fresh);
                }
                Op::Find(key) => {
                    prop_assert_eq!(t.find(&key), m.contains_key(&key));
                }
                Op::Get(key) => {
                    let got_t = t.get(&key).map(|r| r.1);
                    let got_m = m.get(&key).copied();
                    prop_assert_eq!(got_t, got_m);
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<(String, u32)> = t.iter().map(|(k, r)| (k.to_string(), r.1)).collect();
        let expected: Vec<(String, u32)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_invariants_after_every_insert(keys in prop::collection::vec(any::<u16>(), 0..=300)) {
        let mut t: RbTree<String> = RbTree::new();
        for k in keys {
            t.insert(format!("{k:05}"));
            validate_tree(&t);
        }
    }

    #[test]
    fn prop_duplicate_insert_keeps_shape(
        keys in prop::collection::vec(key_strategy(), 1..=200),
        pick in any::<prop::sample::Index>(),
    ) {
        let mut t: RbTree<String> = keys.iter().cloned().collect();
        let nodes = t.nodes.clone();
        let root = t.root;

        prop_assert!(!t.insert(pick.get(&keys).clone()));
        prop_assert_eq!(&t.nodes, &nodes);
        prop_assert_eq!(t.root, root);
    }

    #[test]
    fn prop_absent_keys_not_found(
        keys in prop::collection::btree_set("[a-m]{1,6}", 0..=200),
        probes in prop::collection::vec("[n-z]{1,6}", 0..=50),
    ) {
        let t: RbTree<String> = keys.iter().cloned().collect();
        for k in &keys {
            prop_assert!(t.find(k));
        }
        for p in &probes {
            prop_assert!(!t.find(p));
        }
    }
}

/// Visits every ordering of `items` (Heap's algorithm, iterative).
fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    let mut perm = items.to_vec();
    let mut counters = vec![0usize; perm.len()];
    f(perm.clone());

    let mut i = 1;
    while i < perm.len() {
        if counters[i] < i {
            let j = if i % 2 == 0 { 0 } else { counters[i] };
            perm.swap(j, i);
            f(perm.clone());
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = ["a", "b", "c", "d", "e", "f", "g"];

    let mut seen = std::collections::BTreeSet::new();
    for_each_permutation(&keys, |perm| {
        assert!(seen.insert(perm.clone()), "ordering {perm:?} visited twice");
        let mut t: RbTree<&str> = RbTree::new();
        for &k in &perm {
            assert!(t.insert(k));
            validate_tree(&t);
        }
        for &k in &perm {
            assert!(!t.insert(k));
        }
        validate_tree(&t);
        let got: Vec<&str> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(got, keys);
    });
    assert_eq!(seen.len(), 5040);
}
