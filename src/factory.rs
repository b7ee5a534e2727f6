//! Deferred instance sources and per-key memoization
//!
//! Every cache entry is a [`Memo`]: a one-shot cell around an
//! [`InstanceSource`], the deferred computation chosen by the resolution
//! strategy. Using an enum instead of boxed provider objects keeps every
//! realization path visible in one match and avoids a vtable hop on the
//! hot path.

use crate::error::{Error, Result};
use crate::key::Key;
use crate::registry::{FactoryFn, Impl, Injectable};
use crate::resolver::Resolver;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::sync::Arc;

/// A resolved value, type-erased for storage
pub(crate) type AnyInstance = Arc<dyn Any + Send + Sync>;

/// Assembles constructed elements into a typed aggregate; monomorphized per
/// element type when the key is created
pub(crate) type AssembleFn = fn(Vec<AnyInstance>) -> Result<AnyInstance>;

/// The deferred computation behind a cache entry
pub(crate) enum InstanceSource {
    /// An instance binding; nothing to compute
    Ready(AnyInstance),
    /// Construct the chosen implementation via its registered constructor
    Construct(Impl),
    /// Construct every discovered implementation of the key's element type
    /// and assemble them in discovery order
    Collect(Key),
    /// Produce the auto-factory handle for the contract type
    Factory(FactoryFn),
    /// Delegate the whole resolution of the key to the parent resolver
    Delegate(Key),
}

/// A one-shot cache around an instance source.
///
/// `get` computes at most once and caches the resulting `Arc`; a failed
/// realization is not cached, so the next call retries from scratch.
/// Concurrent callers on the same memo block until the first realization
/// completes, then observe the same cached value.
pub(crate) struct Memo {
    source: InstanceSource,
    cell: OnceCell<AnyInstance>,
}

impl Memo {
    pub(crate) fn new(source: InstanceSource) -> Self {
        Self {
            source,
            cell: OnceCell::new(),
        }
    }

    /// A memo that is already resolved, for instance bindings
    pub(crate) fn ready(value: AnyInstance) -> Self {
        Self {
            source: InstanceSource::Ready(value.clone()),
            cell: OnceCell::with_value(value),
        }
    }

    pub(crate) fn get(&self, resolver: &Resolver) -> Result<AnyInstance> {
        self.cell
            .get_or_try_init(|| resolver.realize(&self.source))
            .cloned()
    }

    #[cfg(test)]
    pub(crate) fn is_resolved(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Downcast an erased instance to the requested type.
///
/// Registration closures are the type authority here, not `TypeId` keying,
/// so the downcast is checked: a mismatched registration surfaces as
/// [`Error::WrongType`] instead of undefined behavior.
pub(crate) fn downcast_instance<T: Injectable>(key: &Key, value: AnyInstance) -> Result<Arc<T>> {
    value.downcast::<T>().map_err(|_| Error::WrongType {
        key: key.clone(),
        expected: std::any::type_name::<T>(),
    })
}

pub(crate) fn assemble_collection<T: Injectable>(items: Vec<AnyInstance>) -> Result<AnyInstance> {
    let key = Key::collection::<T>();
    let mut out: Vec<Arc<T>> = Vec::with_capacity(items.len());
    for item in items {
        out.push(downcast_instance::<T>(&key, item)?);
    }
    Ok(Arc::new(out))
}

pub(crate) fn assemble_array<T: Injectable>(items: Vec<AnyInstance>) -> Result<AnyInstance> {
    let key = Key::array::<T>();
    let mut out: Vec<Arc<T>> = Vec::with_capacity(items.len());
    for item in items {
        out.push(downcast_instance::<T>(&key, item)?);
    }
    Ok(Arc::new(out.into_boxed_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::registry::{Constructor, Impl};
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter(u32);

    #[test]
    fn ready_memo_is_already_resolved() {
        let memo = Memo::ready(Arc::new(Counter(7)));
        assert!(memo.is_resolved());

        let resolver = Builder::new().build();
        let value = memo.get(&resolver).unwrap();
        assert_eq!(value.downcast::<Counter>().unwrap().0, 7);
    }

    #[test]
    fn memo_computes_once_and_returns_identical_value() {
        static CALLS: AtomicU32 = AtomicU32::new(0);

        let implementation = Impl::of::<Counter>().with(Constructor::new(|_| {
            Ok(Counter(CALLS.fetch_add(1, Ordering::SeqCst)))
        }));
        let memo = Memo::new(InstanceSource::Construct(implementation));
        let resolver = Builder::new().build();

        let first = memo.get(&resolver).unwrap();
        let second = memo.get(&resolver).unwrap();

        assert_eq!(CALLS.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn failed_realization_is_not_cached() {
        static ATTEMPTS: AtomicU32 = AtomicU32::new(0);

        let implementation = Impl::of::<Counter>().with(Constructor::new(|_| {
            if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(Error::construction::<Counter>("first attempt fails"))
            } else {
                Ok(Counter(42))
            }
        }));
        let memo = Memo::new(InstanceSource::Construct(implementation));
        let resolver = Builder::new().build();

        assert!(memo.get(&resolver).is_err());
        assert!(!memo.is_resolved());

        let value = memo.get(&resolver).unwrap();
        assert_eq!(value.downcast::<Counter>().unwrap().0, 42);
        assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn assemble_collection_preserves_order() {
        let items: Vec<AnyInstance> = vec![Arc::new(Counter(1)), Arc::new(Counter(2))];
        let assembled = assemble_collection::<Counter>(items).unwrap();
        let list = assembled.downcast::<Vec<Arc<Counter>>>().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].0, 1);
        assert_eq!(list[1].0, 2);
    }

    #[test]
    fn assemble_rejects_foreign_elements() {
        let items: Vec<AnyInstance> = vec![Arc::new("not a counter")];
        let err = assemble_collection::<Counter>(items).unwrap_err();
        assert!(matches!(err, Error::WrongType { .. }));
    }
}
