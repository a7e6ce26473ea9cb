#![cfg(test)]

use shm_hashtable::reentrancy::DebugReentrancy;
use shm_hashtable::{HashTable, KeyPolicy};
use std::cell::Cell;

#[test]
fn enter_and_exit_is_ok() {
    let r = DebugReentrancy::new();
    let _g = r.enter();
    // drop guard at end of scope
}

#[cfg(not(debug_assertions))]
#[test]
fn reentrancy_noop_in_release() {
    let r = DebugReentrancy::new();
    let _g1 = r.enter();
    let _g2 = r.enter();
    let (_g1, _g2) = (_g1, _g2);
}

type Table = HashTable<u32, Nosy, 8>;

thread_local! {
    static TABLE: Cell<*const Table> = Cell::new(std::ptr::null());
}

/// Policy whose hash looks the key up again in the table it serves.
struct Nosy;
impl KeyPolicy<u32> for Nosy {
    type Key = u32;
    fn extract_key(v: &u32) -> &u32 {
        v
    }
    fn hash(k: &u32) -> u64 {
        let table = TABLE.with(|t| t.get());
        if !table.is_null() {
            // SAFETY: only set while the table is borrowed shared below.
            let _ = unsafe { &*table }.contains(k);
        }
        *k as u64
    }
    fn equal(a: &u32, b: &u32) -> bool {
        a == b
    }
}

#[cfg(debug_assertions)]
#[test]
fn policy_reentering_its_table_panics_in_debug() {
    let mut t = Table::new();
    t.insert_unique(1).unwrap();
    let t = &t;
    TABLE.with(|c| c.set(t as *const Table));
    let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| t.find(&1)));
    TABLE.with(|c| c.set(std::ptr::null()));
    assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    // The guard was released while unwinding.
    assert!(t.find(&1).is_some());
}
