//! Reference-counted, copy-on-write objects.
//!
//! Every unit of data that flows through a pipeline (buffers and control
//! messages alike) is a [`MiniObject`]: a heap allocation holding an atomic
//! reference count, a flag set, a small keyed data store, and the payload.
//!
//! # Reference counting
//!
//! Cloning a handle increments the count, dropping it decrements. When the
//! last handle is dropped the payload type's [`MiniObjectImpl::dispose`] hook
//! runs first. Dispose may *resurrect* the object (for example to return it to
//! a pool) and answer [`Disposition::KeepAlive`]; otherwise weak-reference
//! callbacks fire, qdata values are released and the allocation is freed.
//!
//! # Copy-on-write
//!
//! A handle is *writable* when it is the only reference. Shared objects are
//! mutated by first obtaining a private copy:
//!
//! ```rust
//! use sluice::object::{MiniObject, MiniObjectImpl};
//!
//! #[derive(Clone)]
//! struct Counter(u32);
//!
//! impl MiniObjectImpl for Counter {
//!     const TYPE_NAME: &'static str = "Counter";
//!
//!     fn copy(&self) -> Option<Self> {
//!         Some(self.clone())
//!     }
//! }
//!
//! let a = MiniObject::new(Counter(1));
//! let shared = a.clone();
//! assert!(!a.is_writable());
//!
//! let mut b = a.make_writable().expect("Counter is copyable");
//! b.get_mut().unwrap().0 = 2;
//!
//! assert_eq!(shared.0, 1);
//! assert_eq!(b.0, 2);
//! ```

mod qdata;
mod slot;

pub use qdata::{Quark, WeakRefHandle};
pub use slot::ObjectSlot;

use qdata::QDataStore;
use std::any::Any;
use std::marker::PhantomData;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

// ============================================================================
// Type hooks
// ============================================================================

/// Answer of a dispose hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Proceed to weak notification and free.
    Destroy,
    /// The object was resurrected (recycled) and must not be freed.
    KeepAlive,
}

/// Per-type behaviour of a [`MiniObject`] payload.
///
/// Freeing is the payload's `Drop`.
pub trait MiniObjectImpl: Sized + Send + Sync + 'static {
    /// Human-readable type tag.
    const TYPE_NAME: &'static str;

    /// Produce an independent copy of the payload.
    ///
    /// Types that cannot be copied keep the default, which makes
    /// [`MiniObject::copy`] and [`MiniObject::make_writable`] return `None`.
    fn copy(&self) -> Option<Self> {
        None
    }

    /// Called when the reference count reaches zero.
    ///
    /// Returning [`Disposition::KeepAlive`] is only valid after calling
    /// [`Disposing::resurrect`] and storing the returned handle somewhere.
    fn dispose(_object: &Disposing<'_, Self>) -> Disposition {
        Disposition::Destroy
    }
}

// ============================================================================
// Flags
// ============================================================================

/// Flags of a [`MiniObject`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ObjectFlags(u32);

impl ObjectFlags {
    /// No flags.
    pub const NONE: Self = Self(0);
    /// The object is expected to outlive its owner (excluded from leak checks).
    pub const MAY_BE_LEAKED: Self = Self(1 << 0);
    /// First bit available to payload types.
    pub const LAST: Self = Self(1 << 4);

    /// Create empty flags.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Create from raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Check if empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Check if all bits of `other` are set.
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags.
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Identity of an object, stable for its lifetime.
///
/// Weak-reference callbacks receive the id of the object being destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

// ============================================================================
// MiniObject
// ============================================================================

pub(crate) struct ObjectInner<T> {
    refcount: AtomicUsize,
    flags: AtomicU32,
    /// qdata and weak refs; never held together with a queue lock.
    data: Mutex<QDataStore>,
    value: T,
}

/// Shared handle to a reference-counted object.
///
/// `Clone` is *ref*, `Drop` is *unref*. Shared access to the payload goes
/// through `Deref`; exclusive access requires writability.
pub struct MiniObject<T: MiniObjectImpl> {
    ptr: NonNull<ObjectInner<T>>,
    _marker: PhantomData<ObjectInner<T>>,
}

// SAFETY: the payload is Send + Sync (trait bound) and all shared counters
// are atomics or behind a mutex.
unsafe impl<T: MiniObjectImpl> Send for MiniObject<T> {}
// SAFETY: see above.
unsafe impl<T: MiniObjectImpl> Sync for MiniObject<T> {}

impl<T: MiniObjectImpl> MiniObject<T> {
    /// Create an object with refcount 1 and no flags.
    pub fn new(value: T) -> Self {
        Self::with_flags(value, ObjectFlags::empty())
    }

    /// Create an object with refcount 1 and the given flags.
    pub fn with_flags(value: T, flags: ObjectFlags) -> Self {
        let inner = Box::new(ObjectInner {
            refcount: AtomicUsize::new(1),
            flags: AtomicU32::new(flags.bits()),
            data: Mutex::new(QDataStore::default()),
            value,
        });
        Self::from_inner(NonNull::from(Box::leak(inner)))
    }

    fn from_inner(ptr: NonNull<ObjectInner<T>>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    fn inner(&self) -> &ObjectInner<T> {
        // SAFETY: a live handle keeps the allocation alive.
        unsafe { self.ptr.as_ref() }
    }

    /// Consume the handle without releasing its reference.
    pub(crate) fn into_raw(this: Self) -> *mut ObjectInner<T> {
        let ptr = this.ptr.as_ptr();
        std::mem::forget(this);
        ptr
    }

    /// Rebuild a handle from [`MiniObject::into_raw`].
    ///
    /// # Safety
    ///
    /// `ptr` must come from `into_raw` and its reference must not have been
    /// reclaimed already.
    pub(crate) unsafe fn from_raw(ptr: *mut ObjectInner<T>) -> Self {
        // SAFETY: guaranteed non-null by the caller contract.
        Self::from_inner(unsafe { NonNull::new_unchecked(ptr) })
    }

    pub(crate) fn as_ptr(&self) -> *mut ObjectInner<T> {
        self.ptr.as_ptr()
    }

    /// Type tag of the payload.
    pub fn object_type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    /// Identity of this object.
    pub fn id(&self) -> ObjectId {
        ObjectId(self.ptr.as_ptr() as usize)
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    /// Current reference count.
    pub fn refcount(&self) -> usize {
        self.inner().refcount.load(Ordering::Acquire)
    }

    /// An object is writable iff this handle is its only reference.
    pub fn is_writable(&self) -> bool {
        self.refcount() == 1
    }

    /// Current flags.
    pub fn flags(&self) -> ObjectFlags {
        ObjectFlags(self.inner().flags.load(Ordering::Acquire))
    }

    /// Set the given flags.
    pub fn set_flags(&self, flags: ObjectFlags) {
        self.inner().flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Clear the given flags.
    pub fn unset_flags(&self, flags: ObjectFlags) {
        self.inner().flags.fetch_and(!flags.bits(), Ordering::AcqRel);
    }

    /// Copy the object into a new one with refcount 1.
    ///
    /// Flags are copied; qdata and weak references are not. Returns `None`
    /// if the payload type does not support copying.
    pub fn copy(&self) -> Option<Self> {
        let value = MiniObjectImpl::copy(&self.inner().value)?;
        Some(Self::with_flags(value, self.flags()))
    }

    /// Return a writable handle, copying if the object is shared.
    ///
    /// The caller's reference is consumed in every case: when the object is
    /// shared and cannot be copied the reference is released and `None` is
    /// returned.
    pub fn make_writable(self) -> Option<Self> {
        if self.is_writable() {
            return Some(self);
        }
        let copy = self.copy();
        if copy.is_none() {
            tracing::debug!(type_name = T::TYPE_NAME, "make_writable on non-copyable object");
        }
        copy
    }

    /// Exclusive access to the payload if this is the only reference.
    pub fn get_mut(&mut self) -> Option<&mut T> {
        if self.is_writable() {
            // SAFETY: refcount == 1 and we hold `&mut self`, so no other
            // handle can observe the payload.
            Some(unsafe { &mut (*self.ptr.as_ptr()).value })
        } else {
            None
        }
    }

    /// Clone-on-write access: copy into this handle first if shared.
    ///
    /// Returns `None` (leaving the handle untouched) if a copy is needed but
    /// unsupported.
    pub fn make_mut(&mut self) -> Option<&mut T> {
        if !self.is_writable() {
            *self = self.copy()?;
        }
        self.get_mut()
    }

    // ------------------------------------------------------------------------
    // qdata
    // ------------------------------------------------------------------------

    fn data(&self) -> std::sync::MutexGuard<'_, QDataStore> {
        self.inner().data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach `value` under `quark`, replacing any previous value.
    ///
    /// The previous value is dropped after the object's data lock has been
    /// released, so its `Drop` may touch this object again.
    pub fn set_qdata<V: Any + Send + Sync>(&self, quark: Quark, value: V) {
        let old = self.data().set(quark, Arc::new(value));
        drop(old);
    }

    /// Fetch the value stored under `quark`, if it has type `V`.
    pub fn get_qdata<V: Any + Send + Sync>(&self, quark: Quark) -> Option<Arc<V>> {
        let value = self.data().get(quark)?;
        value.downcast::<V>().ok()
    }

    /// Detach and return the value stored under `quark`.
    pub fn steal_qdata(&self, quark: Quark) -> Option<Arc<dyn Any + Send + Sync>> {
        self.data().remove(quark)
    }

    // ------------------------------------------------------------------------
    // Weak references
    // ------------------------------------------------------------------------

    /// Register a callback fired exactly once when the object is destroyed.
    ///
    /// The callback runs before the object's memory is released and is not
    /// run if the object is recycled by its dispose hook.
    pub fn weak_ref<F>(&self, notify: F) -> WeakRefHandle
    where
        F: FnOnce(ObjectId) + Send + 'static,
    {
        self.data().add_weak(Box::new(notify))
    }

    /// Remove a callback registered with [`MiniObject::weak_ref`].
    ///
    /// Removing an unknown handle is a usage error; it is logged and ignored.
    pub fn weak_unref(&self, handle: WeakRefHandle) {
        let removed = self.data().remove_weak(handle);
        match removed {
            Some(notify) => drop(notify),
            None => tracing::error!(
                type_name = T::TYPE_NAME,
                handle = ?handle,
                "weak_unref: no matching weak reference"
            ),
        }
    }
}

impl<T: MiniObjectImpl> Clone for MiniObject<T> {
    fn clone(&self) -> Self {
        self.inner().refcount.fetch_add(1, Ordering::Relaxed);
        Self::from_inner(self.ptr)
    }
}

impl<T: MiniObjectImpl> Drop for MiniObject<T> {
    fn drop(&mut self) {
        let previous = self.inner().refcount.fetch_sub(1, Ordering::Release);
        match previous {
            0 => {
                tracing::error!(type_name = T::TYPE_NAME, "unref on object with zero refcount");
                std::process::abort();
            }
            1 => {
                atomic::fence(Ordering::Acquire);
                // SAFETY: this was the last reference.
                unsafe { last_unref(self.ptr) }
            }
            _ => {}
        }
    }
}

/// Dispose, weak-notify and free an object whose refcount just reached zero.
///
/// # Safety
///
/// `ptr` must be live with a refcount of zero and no outstanding handles.
unsafe fn last_unref<T: MiniObjectImpl>(ptr: NonNull<ObjectInner<T>>) {
    let disposing = Disposing {
        ptr,
        _marker: PhantomData,
    };
    let refcount = || {
        // SAFETY: the allocation is alive until we free it below.
        unsafe { ptr.as_ref() }.refcount.load(Ordering::Acquire)
    };

    match T::dispose(&disposing) {
        Disposition::KeepAlive => {
            if refcount() == 0 {
                tracing::warn!(
                    type_name = T::TYPE_NAME,
                    "dispose kept an object alive without resurrecting it; leaking"
                );
            }
            return;
        }
        Disposition::Destroy => {
            if refcount() != 0 {
                tracing::error!(
                    type_name = T::TYPE_NAME,
                    "dispose resurrected the object but asked for destruction; not freeing"
                );
                return;
            }
        }
    }

    let id = ObjectId(ptr.as_ptr() as usize);
    // SAFETY: refcount is zero and dispose agreed, nothing can reach the
    // allocation any more.
    let mut inner = unsafe { Box::from_raw(ptr.as_ptr()) };
    let store = std::mem::take(
        inner
            .data
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner),
    );
    store.finalize(id);
    drop(inner);
}

impl<T: MiniObjectImpl> std::ops::Deref for MiniObject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner().value
    }
}

impl<T: MiniObjectImpl + std::fmt::Debug> std::fmt::Debug for MiniObject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiniObject")
            .field("type", &T::TYPE_NAME)
            .field("refcount", &self.refcount())
            .field("value", &self.inner().value)
            .finish()
    }
}

// ============================================================================
// Dispose context
// ============================================================================

/// View of an object whose refcount has reached zero, handed to
/// [`MiniObjectImpl::dispose`].
pub struct Disposing<'a, T: MiniObjectImpl> {
    ptr: NonNull<ObjectInner<T>>,
    _marker: PhantomData<&'a T>,
}

impl<T: MiniObjectImpl> Disposing<'_, T> {
    /// The payload being disposed.
    pub fn value(&self) -> &T {
        // SAFETY: the allocation is alive for the duration of dispose.
        &unsafe { self.ptr.as_ref() }.value
    }

    /// Identity of the object being disposed.
    pub fn id(&self) -> ObjectId {
        ObjectId(self.ptr.as_ptr() as usize)
    }

    /// Bring the object back to life with a fresh reference.
    ///
    /// The dispose hook must then answer [`Disposition::KeepAlive`]. When the
    /// returned handle is eventually dropped, dispose runs again.
    pub fn resurrect(&self) -> MiniObject<T> {
        // SAFETY: the allocation is alive for the duration of dispose.
        unsafe { self.ptr.as_ref() }
            .refcount
            .fetch_add(1, Ordering::AcqRel);
        MiniObject::from_inner(self.ptr)
    }
}
