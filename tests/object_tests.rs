//! Integration tests for the reference-counted object model.
//!
//! These tests verify that:
//! - Writability follows the refcount and copy-on-write consumes one ref
//! - Weak-reference callbacks fire once, before the payload is freed
//! - A dispose hook can recycle objects into a pool
//! - Slots and qdata behave across threads

use sluice::buffer::Buffer;
use sluice::metadata::Metadata;
use sluice::object::{
    Disposing, Disposition, MiniObject, MiniObjectImpl, ObjectFlags, ObjectSlot, Quark,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::thread;

/// Payload that logs its own destruction.
struct Tracked {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.log.lock().unwrap().push("freed");
    }
}

impl MiniObjectImpl for Tracked {
    const TYPE_NAME: &'static str = "Tracked";
}

#[test]
fn test_writability_law() {
    let buffer = Buffer::from_slice(b"payload", Metadata::new());
    assert!(buffer.is_writable());

    // unique: same instance comes back
    let id = buffer.id();
    let buffer = buffer.make_writable().unwrap();
    assert_eq!(buffer.id(), id);

    // shared: a distinct copy, the original loses exactly one ref
    let holder_a = buffer.clone();
    let holder_b = buffer.clone();
    assert_eq!(holder_a.refcount(), 3);
    assert!(!buffer.is_writable());

    let copy = buffer.make_writable().unwrap();
    assert_ne!(copy.id(), holder_a.id());
    assert_eq!(copy.refcount(), 1);
    assert_eq!(holder_a.refcount(), 2);
    assert_eq!(copy.as_bytes(), holder_b.as_bytes());
}

#[test]
fn test_weak_ref_fires_before_free() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let object = MiniObject::new(Tracked { log: log.clone() });

    let fired = Arc::new(AtomicUsize::new(0));
    for _ in 0..3 {
        let fired = fired.clone();
        let log = log.clone();
        object.weak_ref(move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
            log.lock().unwrap().push("weak");
        });
    }

    let other = object.clone();
    drop(object);
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    drop(other);
    assert_eq!(fired.load(Ordering::SeqCst), 3);
    assert_eq!(*log.lock().unwrap(), vec!["weak", "weak", "weak", "freed"]);
}

#[test]
fn test_weak_ref_receives_object_id() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let object = MiniObject::new(Tracked { log });
    let expected = object.id();

    let seen = Arc::new(Mutex::new(None));
    {
        let seen = seen.clone();
        object.weak_ref(move |id| *seen.lock().unwrap() = Some(id));
    }
    drop(object);
    assert_eq!(*seen.lock().unwrap(), Some(expected));
}

// ============================================================================
// Recycling
// ============================================================================

#[derive(Default)]
struct Pool {
    free: Mutex<Vec<MiniObject<Pooled>>>,
    recycled: AtomicUsize,
}

struct Pooled {
    pool: Weak<Pool>,
    data: Vec<u8>,
}

impl MiniObjectImpl for Pooled {
    const TYPE_NAME: &'static str = "Pooled";

    fn dispose(object: &Disposing<'_, Self>) -> Disposition {
        let Some(pool) = object.value().pool.upgrade() else {
            return Disposition::Destroy;
        };
        pool.recycled.fetch_add(1, Ordering::SeqCst);
        pool.free.lock().unwrap().push(object.resurrect());
        Disposition::KeepAlive
    }
}

impl Pool {
    fn acquire(self: &Arc<Self>) -> MiniObject<Pooled> {
        let recycled = self.free.lock().unwrap().pop();
        recycled.unwrap_or_else(|| {
            MiniObject::new(Pooled {
                pool: Arc::downgrade(self),
                data: vec![0; 64],
            })
        })
    }
}

#[test]
fn test_dispose_recycles_into_pool() {
    let pool = Arc::new(Pool::default());

    let first = pool.acquire();
    let first_id = first.id();
    drop(first);
    assert_eq!(pool.recycled.load(Ordering::SeqCst), 1);
    assert_eq!(pool.free.lock().unwrap().len(), 1);

    let again = pool.acquire();
    assert_eq!(again.id(), first_id);
    assert_eq!(again.refcount(), 1);
    assert_eq!(again.data.len(), 64);

    // weak refs do not fire while the object is recycled
    let fired = Arc::new(AtomicUsize::new(0));
    {
        let fired = fired.clone();
        again.weak_ref(move |_| {
            fired.fetch_add(1, Ordering::SeqCst);
        });
    }
    drop(again);
    assert_eq!(fired.load(Ordering::SeqCst), 0);

    // once the pool is gone, the object is destroyed for real
    let free = std::mem::take(&mut *pool.free.lock().unwrap());
    drop(pool);
    drop(free);
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Slots, flags and qdata
// ============================================================================

#[test]
fn test_slot_shared_between_threads() {
    let slot = Arc::new(ObjectSlot::empty());
    let buffers: Vec<_> = (0..8)
        .map(|i| Buffer::with_size(1, Metadata::with_sequence(i)))
        .collect();

    let handles: Vec<_> = buffers
        .iter()
        .cloned()
        .map(|buffer| {
            let slot = slot.clone();
            thread::spawn(move || {
                for _ in 0..200 {
                    slot.replace(Some(&buffer));
                    if let Some(stolen) = slot.steal() {
                        slot.take(Some(stolen));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let occupant = slot.steal().unwrap();
    assert!(buffers.iter().any(|b| Buffer::ptr_eq(b, &occupant)));
    drop(occupant);
    assert!(buffers.iter().all(|b| b.refcount() == 1));
}

#[test]
fn test_flags_and_copy() {
    let buffer = Buffer::with_size(4, Metadata::new());
    let user_flag = ObjectFlags::LAST;
    buffer.set_flags(ObjectFlags::MAY_BE_LEAKED.union(user_flag));

    let copy = buffer.copy().unwrap();
    assert!(copy.flags().contains(user_flag));
    assert!(copy.flags().contains(ObjectFlags::MAY_BE_LEAKED));

    buffer.unset_flags(user_flag);
    assert!(!buffer.flags().contains(user_flag));
    assert!(copy.flags().contains(user_flag));
}

#[test]
fn test_qdata_is_not_copied() {
    let key = Quark::intern("object-tests-origin");
    let buffer = Buffer::with_size(4, Metadata::new());
    buffer.set_qdata(key, String::from("camera0"));

    let copy = buffer.copy().unwrap();
    assert_eq!(
        buffer.get_qdata::<String>(key).as_deref().map(String::as_str),
        Some("camera0")
    );
    assert!(copy.get_qdata::<String>(key).is_none());

    let stolen = buffer.steal_qdata(key).unwrap();
    assert_eq!(stolen.downcast_ref::<String>().map(String::as_str), Some("camera0"));
    assert!(buffer.get_qdata::<String>(key).is_none());
}
