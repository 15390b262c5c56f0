//! Execution context carrier
//!
//! A [`Context`] is an immutable chain of key/value pairs. Deriving a context
//! with [`Context::with_value`] never changes the original, so values bound in a
//! child scope cannot leak back into the parent.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of a value slot in a [`Context`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContextKey(u64);

impl ContextKey {
    /// Allocate a key distinct from every other key in the process
    #[must_use]
    pub fn unique() -> Self {
        static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

struct Node {
    key: ContextKey,
    value: Arc<dyn Any + Send + Sync>,
    parent: Option<Arc<Node>>,
}

/// Immutable, key-addressed propagation value
#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Node>>,
}

impl Context {
    /// The empty root context
    #[must_use]
    pub const fn background() -> Self {
        Self { head: None }
    }

    /// Derive a copy of this context with `value` bound under `key`.
    ///
    /// A binding in the derived context shadows any earlier binding of the same key.
    #[must_use]
    pub fn with_value<T>(&self, key: ContextKey, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            head: Some(Arc::new(Node {
                key,
                value: Arc::new(value),
                parent: self.head.clone(),
            })),
        }
    }

    /// Nearest value bound under `key`, if it has type `T`
    #[must_use]
    pub fn value<T: Any>(&self, key: ContextKey) -> Option<&T> {
        let mut current = self.head.as_deref();

        while let Some(node) = current {
            if node.key == key {
                return node.value.downcast_ref::<T>();
            }
            current = node.parent.as_deref();
        }

        None
    }

    fn depth(&self) -> usize {
        std::iter::successors(self.head.as_deref(), |node| node.parent.as_deref()).count()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("depth", &self.depth())
            .finish()
    }
}
