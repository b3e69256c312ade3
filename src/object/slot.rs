//! Atomically replaceable object slot.

use super::{MiniObject, MiniObjectImpl, ObjectInner};
use std::marker::PhantomData;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A shared location holding at most one object reference.
///
/// All updates are lock-free compare-and-swap loops, so a slot can be shared
/// between threads without a mutex. The slot owns one reference to its
/// occupant.
pub struct ObjectSlot<T: MiniObjectImpl> {
    ptr: AtomicPtr<ObjectInner<T>>,
    _marker: PhantomData<MiniObject<T>>,
}

// SAFETY: the slot only moves owned references between threads.
unsafe impl<T: MiniObjectImpl> Send for ObjectSlot<T> {}
// SAFETY: see above.
unsafe impl<T: MiniObjectImpl> Sync for ObjectSlot<T> {}

fn raw_of<T: MiniObjectImpl>(object: Option<&MiniObject<T>>) -> *mut ObjectInner<T> {
    object.map_or(ptr::null_mut(), MiniObject::as_ptr)
}

impl<T: MiniObjectImpl> ObjectSlot<T> {
    /// Create an empty slot.
    pub const fn empty() -> Self {
        Self {
            ptr: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    /// Create a slot owning `object`.
    pub fn new(object: Option<MiniObject<T>>) -> Self {
        let raw = object.map_or(ptr::null_mut(), MiniObject::into_raw);
        Self {
            ptr: AtomicPtr::new(raw),
            _marker: PhantomData,
        }
    }

    /// Whether the slot is empty.
    pub fn is_empty(&self) -> bool {
        self.ptr.load(Ordering::Acquire).is_null()
    }

    /// Whether the slot currently holds `object`.
    pub fn holds(&self, object: &MiniObject<T>) -> bool {
        self.ptr.load(Ordering::Acquire) == object.as_ptr()
    }

    /// Store a new reference to `new`, releasing the previous occupant.
    ///
    /// Returns `false` if the slot already held `new`.
    pub fn replace(&self, new: Option<&MiniObject<T>>) -> bool {
        let new_raw = raw_of(new);
        let mut old = self.ptr.load(Ordering::Acquire);
        if old == new_raw {
            return false;
        }

        // The slot's reference to `new` is taken before publishing it.
        if let Some(object) = new {
            MiniObject::into_raw(object.clone());
        }

        loop {
            match self
                .ptr
                .compare_exchange_weak(old, new_raw, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) if current == new_raw => {
                    // Someone else installed the same object: undo our ref.
                    if !new_raw.is_null() {
                        // SAFETY: reclaims the reference taken above.
                        drop(unsafe { MiniObject::from_raw(new_raw) });
                    }
                    return false;
                }
                Err(current) => old = current,
            }
        }

        if !old.is_null() {
            // SAFETY: the slot owned one reference to its previous occupant.
            drop(unsafe { MiniObject::from_raw(old) });
        }
        true
    }

    /// Move `new` into the slot without adding a reference, releasing the
    /// previous occupant.
    ///
    /// Returns `false` if the slot already held `new`, in which case the
    /// passed reference is released.
    pub fn take(&self, new: Option<MiniObject<T>>) -> bool {
        let new_raw = new.map_or(ptr::null_mut(), MiniObject::into_raw);
        let mut old = self.ptr.load(Ordering::Acquire);

        loop {
            if old == new_raw {
                if !new_raw.is_null() {
                    // SAFETY: reclaims the reference transferred in by the caller.
                    drop(unsafe { MiniObject::from_raw(new_raw) });
                }
                return false;
            }
            match self
                .ptr
                .compare_exchange_weak(old, new_raw, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(current) => old = current,
            }
        }

        if !old.is_null() {
            // SAFETY: the slot owned one reference to its previous occupant.
            drop(unsafe { MiniObject::from_raw(old) });
        }
        true
    }

    /// Empty the slot and hand its reference to the caller.
    pub fn steal(&self) -> Option<MiniObject<T>> {
        let old = self.ptr.swap(ptr::null_mut(), Ordering::AcqRel);
        if old.is_null() {
            None
        } else {
            // SAFETY: the slot owned this reference and nobody else can see it now.
            Some(unsafe { MiniObject::from_raw(old) })
        }
    }
}

impl<T: MiniObjectImpl> Default for ObjectSlot<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: MiniObjectImpl> Drop for ObjectSlot<T> {
    fn drop(&mut self) {
        drop(self.steal());
    }
}

impl<T: MiniObjectImpl> std::fmt::Debug for ObjectSlot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectSlot")
            .field("type", &T::TYPE_NAME)
            .field("empty", &self.is_empty())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    struct Item(u32);

    impl MiniObjectImpl for Item {
        const TYPE_NAME: &'static str = "Item";
    }

    #[test]
    fn test_replace_refs_new_and_unrefs_old() {
        let a = MiniObject::new(Item(1));
        let b = MiniObject::new(Item(2));
        let slot = ObjectSlot::empty();

        assert!(slot.replace(Some(&a)));
        assert_eq!(a.refcount(), 2);
        assert!(!slot.replace(Some(&a)));
        assert_eq!(a.refcount(), 2);

        assert!(slot.replace(Some(&b)));
        assert_eq!(a.refcount(), 1);
        assert_eq!(b.refcount(), 2);

        assert!(slot.replace(None));
        assert_eq!(b.refcount(), 1);
        assert!(slot.is_empty());
    }

    #[test]
    fn test_take_transfers_ownership() {
        let a = MiniObject::new(Item(1));
        let slot = ObjectSlot::empty();

        assert!(slot.take(Some(a.clone())));
        assert_eq!(a.refcount(), 2);
        assert!(slot.holds(&a));

        // taking the same object again releases the passed reference
        assert!(!slot.take(Some(a.clone())));
        assert_eq!(a.refcount(), 2);

        assert!(slot.take(None));
        assert_eq!(a.refcount(), 1);
    }

    #[test]
    fn test_steal_keeps_refcount() {
        let a = MiniObject::new(Item(7));
        let slot = ObjectSlot::new(Some(a.clone()));
        assert_eq!(a.refcount(), 2);

        let stolen = slot.steal().unwrap();
        assert!(MiniObject::ptr_eq(&stolen, &a));
        assert_eq!(a.refcount(), 2);
        assert_eq!(stolen.0, 7);
        assert!(slot.steal().is_none());
    }

    #[test]
    fn test_drop_releases_occupant() {
        let a = MiniObject::new(Item(1));
        {
            let slot = ObjectSlot::empty();
            slot.replace(Some(&a));
            assert_eq!(a.refcount(), 2);
        }
        assert_eq!(a.refcount(), 1);
    }

    #[test]
    fn test_concurrent_replace() {
        let objects: Vec<_> = (0..4).map(|i| MiniObject::new(Item(i))).collect();
        let slot = Arc::new(ObjectSlot::empty());
        let swaps = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = objects
            .iter()
            .cloned()
            .map(|object| {
                let slot = slot.clone();
                let swaps = swaps.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        if slot.replace(Some(&object)) {
                            swaps.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(swaps.load(Ordering::Relaxed) >= 1);
        let occupant = slot.steal().unwrap();
        let holders: usize = objects.iter().map(|o| o.refcount() - 1).sum();
        // only the stolen handle holds an extra reference
        assert_eq!(holders, 1);
        drop(occupant);
        assert!(objects.iter().all(|o| o.refcount() == 1));
    }
}
