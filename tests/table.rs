// HashTable scenario suite.
//
// Each test documents the behavior being verified. The core invariants
// exercised:
// - Capacity: `len + remaining == capacity`, `is_full` iff nothing remains.
// - Uniqueness: `insert_unique` on a present key leaves the table unchanged.
// - Duplicates: runs of equal keys are contiguous and in insertion order.
// - Copy: a clone compares equal and yields the same equal ranges.
use shm_hashtable::{HashTable, InsertError, KeyPolicy, ShmHashMap, ShmHashSet};

// Test: unique-key table of capacity 4 fills, frees a slot and refills.
// Verifies: Full error leaves the size alone; erase makes room again.
#[test]
fn unique_table_fills_and_recovers() {
    let mut t: ShmHashMap<u32, &'static str, 4> = HashTable::new();
    for (k, v) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        t.insert_unique((k, v)).expect("room left");
    }
    assert!(t.is_full());
    assert_eq!(t.insert_unique((5, "e")), Err(InsertError::Full));
    assert_eq!(t.len(), 4);

    assert_eq!(t.erase(&2), 1);
    assert_eq!(t.len(), 3);
    assert!(!t.is_full());
    t.insert_unique((5, "e")).expect("slot was freed");
    assert_eq!(t.get_by_key(&5), Some(&(5, "e")));
}

// Test: duplicate keys in a table of capacity 10.
// Verifies: counts, insertion-ordered equal range, erase removes the run.
#[test]
fn duplicate_keys_keep_insertion_order() {
    let mut t: ShmHashMap<u32, char, 10> = HashTable::new();
    t.insert_equal((7, 'x')).unwrap();
    t.insert_equal((7, 'y')).unwrap();
    t.insert_equal((7, 'z')).unwrap();
    t.insert_equal((9, 'n')).unwrap();

    assert_eq!(t.count(&7), 3);
    assert_eq!(t.count(&9), 1);
    let run: Vec<char> = t.equal_range(&7).map(|e| e.1).collect();
    assert_eq!(run, vec!['x', 'y', 'z']);

    assert_eq!(t.erase(&7), 3);
    assert_eq!(t.len(), 1);
    assert_eq!(t.equal_range(&7).count(), 0);
}

// Test: capacity law holds through a mixed sequence.
#[test]
fn capacity_law_holds() {
    let mut t: ShmHashSet<u16, 6> = HashTable::new();
    let check = |t: &ShmHashSet<u16, 6>| {
        assert_eq!(t.remaining() + t.len(), t.capacity());
        assert_eq!(t.is_full(), t.remaining() == 0);
    };
    check(&t);
    for k in 0..10 {
        let _ = t.insert_equal(k % 4);
        check(&t);
    }
    t.erase(&1);
    check(&t);
    t.clear();
    check(&t);
    assert!(t.is_empty());
}

// Test: erase through positions, including a range spanning buckets.
#[test]
fn erase_by_position_and_range() {
    let mut t: ShmHashSet<u32, 16> = HashTable::new();
    t.extend_unique(0..10);
    let order: Vec<u32> = t.iter().copied().collect();

    let mut it = t.iter();
    for _ in 0..3 {
        it.next();
    }
    let from = it.position();
    for _ in 0..4 {
        it.next();
    }
    let to = it.position();
    assert_eq!(t.erase_range(from, to), 4);

    let left: Vec<u32> = t.iter().copied().collect();
    let mut expected = order[..3].to_vec();
    expected.extend_from_slice(&order[7..]);
    assert_eq!(left, expected);

    let first = t.first_position().unwrap();
    let v = *t.get(first).unwrap();
    assert_eq!(t.erase_at(first), Some(v));
    assert_eq!(t.len(), 5);
    assert_eq!(t.erase_range(t.first_position(), None), 5);
    assert!(t.is_empty());
}

// Test: copy law.
// Verifies: `clone` compares equal and preserves every equal range.
#[test]
fn clone_round_trip() {
    let mut a: ShmHashMap<u32, u32, 32> = HashTable::new();
    for i in 0..20 {
        a.insert_equal((i % 7, i)).unwrap();
    }
    let b = a.clone();
    assert!(a == b);
    for k in 0..7 {
        let ra: Vec<_> = a.equal_range(&k).collect();
        let rb: Vec<_> = b.equal_range(&k).collect();
        assert_eq!(ra, rb);
    }
    let mut c: ShmHashMap<u32, u32, 32> = HashTable::new();
    c.insert_unique((100, 0)).unwrap();
    c.clone_from(&a);
    assert!(c == a);
    assert!(!c.contains(&100));
}

// Test: equality is structural.
#[test]
fn equality_compares_chains() {
    let mut a: ShmHashSet<u32, 8> = HashTable::new();
    let mut b: ShmHashSet<u32, 8> = HashTable::new();
    a.extend_unique([1, 2, 3]);
    b.extend_unique([1, 2, 3]);
    assert!(a == b);
    b.erase(&2);
    assert!(a != b);
    b.insert_unique(4).unwrap();
    assert!(a != b);
}

// Test: swap exchanges whole contents, tables stay consistent.
#[test]
fn swap_exchanges_tables() {
    let mut a: ShmHashSet<u32, 8> = HashTable::new();
    let mut b: ShmHashSet<u32, 8> = HashTable::new();
    a.extend_unique([1, 2]);
    b.extend_unique([3, 4, 5]);
    a.swap(&mut b);
    assert_eq!(a.len(), 3);
    assert!(a.contains(&5) && !a.contains(&1));
    assert_eq!(b.len(), 2);
    assert!(a.verify().is_ok());
    assert!(b.verify().is_ok());
}

// Test: a custom policy keying records by a field.
#[test]
fn custom_policy_keys_by_field() {
    #[derive(Debug, Clone, PartialEq)]
    struct Order {
        id: u64,
        qty: u32,
    }
    struct ById;
    impl KeyPolicy<Order> for ById {
        type Key = u64;
        fn extract_key(o: &Order) -> &u64 {
            &o.id
        }
        fn hash(id: &u64) -> u64 {
            id.wrapping_mul(0x9e37_79b9_7f4a_7c15)
        }
        fn equal(a: &u64, b: &u64) -> bool {
            a == b
        }
    }

    let mut t: HashTable<Order, ById, 8> = HashTable::new();
    t.insert_unique(Order { id: 42, qty: 1 }).unwrap();
    let dup = t.insert_unique(Order { id: 42, qty: 9 });
    assert!(matches!(dup, Err(InsertError::Duplicate(_))));
    let pos = t.find(&42).unwrap();
    t.get_mut(pos).unwrap().qty += 1;
    assert_eq!(t.get_by_key(&42).map(|o| o.qty), Some(2));
}

// Test: per-bucket queries agree with traversal.
#[test]
fn bucket_queries_cover_every_value() {
    let mut t: ShmHashSet<u32, 16> = HashTable::new();
    t.extend_equal([5, 5, 6, 7, 8, 5]);
    assert_eq!(t.bucket_count(), 16);
    let total: usize = (0..t.bucket_count()).map(|b| t.elems_in_bucket(b)).sum();
    assert_eq!(total, t.len());
    assert_eq!(t.elems_in_bucket(99), 0);
    assert!(t.elems_in_bucket(t.bucket_of(&5)) >= 3);
}
