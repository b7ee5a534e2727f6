//! Per-call scoped resolution for auto-factory contracts
//!
//! An auto-factory contract is implemented by an ordinary handle type
//! holding the enclosing [`Resolver`]. Each method on the handle starts a
//! [`FactoryScope`], binds the call's arguments as instance bindings on a
//! fresh child resolver, and resolves the method's return type against that
//! child. Nothing from one call's child resolver persists into the next
//! call.
//!
//! # Examples
//!
//! ```
//! use plugin_injector::{Builder, Constructor, Deps, Impl, Registry, Resolver, Result};
//! use std::sync::Arc;
//!
//! struct Session {
//!     user: Arc<String>,
//! }
//!
//! // the handle type implementing the contract
//! struct SessionFactory {
//!     resolver: Resolver,
//! }
//!
//! impl SessionFactory {
//!     fn create(&self, user: String) -> Result<Arc<Session>> {
//!         self.resolver.factory_scope().arg(user).create::<Session>()
//!     }
//! }
//!
//! let mut registry = Registry::new();
//! registry.register(Impl::of::<Session>().with(Constructor::new(|deps: &Deps| {
//!     Ok(Session {
//!         user: deps.get::<String>()?,
//!     })
//! })));
//! registry.register_auto_factory(|resolver| SessionFactory { resolver });
//!
//! let resolver = Builder::new().registry(Arc::new(registry)).build();
//! let factory = resolver.get::<SessionFactory>().unwrap();
//!
//! let alice = factory.create("alice".into()).unwrap();
//! let bob = factory.create("bob".into()).unwrap();
//! assert_eq!(*alice.user, "alice");
//! assert_eq!(*bob.user, "bob");
//! ```

use crate::builder::Builder;
use crate::error::Result;
use crate::registry::Injectable;
use crate::resolver::Resolver;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// One factory-method call: argument bindings plus the child resolver they
/// seed.
///
/// Created by [`Resolver::factory_scope`]. The child resolver lives only
/// for the duration of [`FactoryScope::create`]; the resolved value outlives
/// it through its `Arc`.
pub struct FactoryScope {
    builder: Builder,
}

impl FactoryScope {
    pub(crate) fn new(enclosing: &Resolver) -> Self {
        #[cfg(feature = "logging")]
        debug!(
            target: "plugin_injector",
            "Opening factory scope"
        );

        Self {
            builder: enclosing.scope(),
        }
    }

    /// Bind a call argument by its declared type
    pub fn arg<T: Injectable>(mut self, value: T) -> Self {
        self.builder = self.builder.bind(value);
        self
    }

    /// Bind a call argument by its declared type and qualifier name
    pub fn named_arg<T: Injectable>(mut self, qualifier: &'static str, value: T) -> Self {
        self.builder = self.builder.bind_named(qualifier, value);
        self
    }

    /// Bind an already-shared call argument
    pub fn arg_arc<T: Injectable>(mut self, value: Arc<T>) -> Self {
        self.builder = self.builder.bind_arc(value);
        self
    }

    /// Qualified variant of [`FactoryScope::arg_arc`]
    pub fn named_arg_arc<T: Injectable>(mut self, qualifier: &'static str, value: Arc<T>) -> Self {
        self.builder = self.builder.bind_named_arc(qualifier, value);
        self
    }

    /// Build the call's child resolver and resolve the return type
    pub fn create<T: Injectable>(self) -> Result<Arc<T>> {
        self.builder.build().get::<T>()
    }
}

impl std::fmt::Debug for FactoryScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FactoryScope")
            .field("builder", &self.builder)
            .finish()
    }
}
