//! Per-object keyed data and weak references.
//!
//! Keys are [`Quark`]s: interned strings resolved to small integers through a
//! process-wide table. Weak-reference callbacks live in the same ordered
//! store under the reserved [`Quark::WEAK_REFS`] key.

use super::ObjectId;
use smallvec::SmallVec;
use std::any::Any;
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

const WEAK_REFS_NAME: &str = "sluice-weak-refs";

/// Interned string identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Quark(NonZeroU32);

struct Interner {
    ids: HashMap<&'static str, Quark>,
    names: Vec<&'static str>,
}

fn interner() -> &'static Mutex<Interner> {
    static INTERNER: OnceLock<Mutex<Interner>> = OnceLock::new();
    INTERNER.get_or_init(|| {
        let mut ids = HashMap::new();
        ids.insert(WEAK_REFS_NAME, Quark::WEAK_REFS);
        Mutex::new(Interner {
            ids,
            names: vec![WEAK_REFS_NAME],
        })
    })
}

impl Quark {
    /// Reserved key holding weak-reference callbacks.
    pub const WEAK_REFS: Quark = Quark(NonZeroU32::MIN);

    /// Intern `name`, returning its quark.
    pub fn intern(name: &str) -> Quark {
        let mut table = interner().lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(quark) = table.ids.get(name) {
            return *quark;
        }
        let name: &'static str = Box::leak(name.to_owned().into_boxed_str());
        let next = u32::try_from(table.names.len() + 1).unwrap_or(u32::MAX);
        let quark = Quark(NonZeroU32::new(next).unwrap_or(NonZeroU32::MAX));
        table.names.push(name);
        table.ids.insert(name, quark);
        quark
    }

    /// Look up `name` without interning it.
    pub fn lookup(name: &str) -> Option<Quark> {
        let table = interner().lock().unwrap_or_else(PoisonError::into_inner);
        table.ids.get(name).copied()
    }

    /// The interned string.
    pub fn as_str(self) -> &'static str {
        let table = interner().lock().unwrap_or_else(PoisonError::into_inner);
        table.names[(self.0.get() - 1) as usize]
    }
}

impl std::fmt::Display for Quark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token returned by `weak_ref`, used to unregister the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeakRefHandle(u64);

impl WeakRefHandle {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

pub(super) type WeakNotify = Box<dyn FnOnce(ObjectId) + Send>;

enum Entry {
    Data {
        quark: Quark,
        value: Arc<dyn Any + Send + Sync>,
    },
    Weak {
        handle: WeakRefHandle,
        notify: WeakNotify,
    },
}

impl Entry {
    fn quark(&self) -> Quark {
        match self {
            Entry::Data { quark, .. } => *quark,
            Entry::Weak { .. } => Quark::WEAK_REFS,
        }
    }
}

/// Ordered (key, value) list. At most one data entry per key.
#[derive(Default)]
pub(super) struct QDataStore {
    entries: SmallVec<[Entry; 2]>,
}

impl QDataStore {
    /// Insert or overwrite; returns the displaced value for the caller to
    /// drop once unlocked.
    pub(super) fn set(
        &mut self,
        quark: Quark,
        value: Arc<dyn Any + Send + Sync>,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        if quark == Quark::WEAK_REFS {
            tracing::error!("qdata key {} is reserved", WEAK_REFS_NAME);
            return Some(value);
        }
        for entry in self.entries.iter_mut() {
            if let Entry::Data { quark: q, value: v } = entry {
                if *q == quark {
                    return Some(std::mem::replace(v, value));
                }
            }
        }
        self.entries.push(Entry::Data { quark, value });
        None
    }

    pub(super) fn get(&self, quark: Quark) -> Option<Arc<dyn Any + Send + Sync>> {
        self.entries.iter().find_map(|entry| match entry {
            Entry::Data { quark: q, value } if *q == quark => Some(Arc::clone(value)),
            _ => None,
        })
    }

    pub(super) fn remove(&mut self, quark: Quark) -> Option<Arc<dyn Any + Send + Sync>> {
        let index = self
            .entries
            .iter()
            .position(|e| matches!(e, Entry::Data { .. }) && e.quark() == quark)?;
        match self.entries.remove(index) {
            Entry::Data { value, .. } => Some(value),
            Entry::Weak { .. } => None,
        }
    }

    pub(super) fn add_weak(&mut self, notify: WeakNotify) -> WeakRefHandle {
        let handle = WeakRefHandle::next();
        self.entries.push(Entry::Weak { handle, notify });
        handle
    }

    pub(super) fn remove_weak(&mut self, handle: WeakRefHandle) -> Option<WeakNotify> {
        let index = self
            .entries
            .iter()
            .position(|e| matches!(e, Entry::Weak { handle: h, .. } if *h == handle))?;
        match self.entries.remove(index) {
            Entry::Weak { notify, .. } => Some(notify),
            Entry::Data { .. } => None,
        }
    }

    /// Fire weak callbacks in registration order, then release data values.
    pub(super) fn finalize(self, id: ObjectId) {
        let mut data = Vec::new();
        for entry in self.entries {
            match entry {
                Entry::Weak { notify, .. } => notify(id),
                Entry::Data { value, .. } => data.push(value),
            }
        }
        drop(data);
    }
}
