use alloc::{boxed::Box, sync::Arc};

use crate::{any::TypeInfo, errors::DisposeErrors, injection::Injectable};

/// Deterministic cleanup of an instance owned by a [`crate::Scope`].
///
/// The scope disposes everything it created in creation order when it's disposed.
/// A failure doesn't stop the rest from disposing, it's reported through [`crate::Registry::on_dispose_error`].
///
/// # Warning
/// [`Drop`] isn't an equivalent of dispose, because instances are shared and may outlive the scope
/// (for example, when a caller keeps a resolved `Arc`), while disposal happens when the scope ends.
pub trait Dispose {
    #[allow(clippy::missing_errors_doc)]
    fn dispose(&self) -> anyhow::Result<()>;
}

pub(crate) type DisposeErrorHandler = Arc<dyn Fn(&DisposeErrors) + Send + Sync>;

/// An instance whose disposal belongs to a scope
pub(crate) struct Owned {
    pub(crate) type_info: TypeInfo,
    dispose: Box<dyn FnOnce() -> anyhow::Result<()> + Send>,
}

impl Owned {
    /// Returns `None` if the instance isn't disposable
    #[inline]
    #[must_use]
    pub(crate) fn of<I: Injectable>(instance: Arc<I>) -> Option<Self> {
        instance.as_dispose()?;

        Some(Self {
            type_info: TypeInfo::of::<I>(),
            dispose: Box::new(move || instance.as_dispose().map_or(Ok(()), Dispose::dispose)),
        })
    }

    #[inline]
    pub(crate) fn dispose(self) -> anyhow::Result<()> {
        (self.dispose)()
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use alloc::{string::ToString, sync::Arc};
    use core::sync::atomic::{AtomicU8, Ordering};

    use super::{Dispose, Owned};
    use crate::{any::TypeInfo, injection::Injectable};

    struct Plain;

    impl Injectable for Plain {}

    #[derive(Default)]
    struct Connection {
        closed: AtomicU8,
    }

    impl Injectable for Connection {
        fn as_dispose(&self) -> Option<&dyn Dispose> {
            Some(self)
        }
    }

    impl Dispose for Connection {
        fn dispose(&self) -> anyhow::Result<()> {
            if self.closed.fetch_add(1, Ordering::SeqCst) > 0 {
                anyhow::bail!("connection is already closed");
            }
            Ok(())
        }
    }

    #[test]
    fn test_not_disposable() {
        assert!(Owned::of(Arc::new(Plain)).is_none());
    }

    #[test]
    fn test_dispose_calls_instance() {
        let connection = Arc::new(Connection::default());

        let owned = Owned::of(connection.clone()).unwrap();
        assert_eq!(owned.type_info, TypeInfo::of::<Connection>());
        owned.dispose().unwrap();
        assert_eq!(connection.closed.load(Ordering::SeqCst), 1);

        let err = Owned::of(connection.clone()).unwrap().dispose().unwrap_err();
        assert_eq!(err.to_string(), "connection is already closed");
    }
}
