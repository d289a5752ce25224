//! Host-owned references to pinned embedded values.

use core::fmt;

use tracing::warn;

use crate::error::{BridgeError, Result};
use crate::handle::{HandleId, RuntimeHandle};
use crate::registry::RegistryId;
use crate::runtime::EmbeddedRuntime;

/// One embedded value pinned in its runtime's registry.
///
/// Holds an acquisition of the runtime handle for as long as the value is
/// pinned, so the runtime cannot be destroyed underneath it. Nothing happens
/// on drop: the owner calls [`dispose`](Self::dispose), which
/// [`BridgeObject`](crate::BridgeObject) does from its finalizer.
#[must_use = "a reference holds a runtime acquisition until it is disposed"]
pub struct ValueReference<R: EmbeddedRuntime> {
    handle: RuntimeHandle<R>,
    id: RegistryId,
    origin: HandleId,
    disposed: bool,
}

impl<R: EmbeddedRuntime> ValueReference<R> {
    /// Pin `value` in the runtime behind `handle`.
    ///
    /// Acquires `handle` first, then registers the value. A failed
    /// registration releases the acquisition again before returning.
    ///
    /// # Errors
    /// Returns `RuntimeDisposed` if the runtime is gone, or the registry's
    /// error (e.g. `RegistryFull`) if the value cannot be pinned
    pub fn create(handle: &RuntimeHandle<R>, value: R::Value) -> Result<Self> {
        let acquired = handle.acquire()?;
        let registered = acquired.with_runtime(|runtime| runtime.registry_mut().register(value));

        match registered {
            Ok(Ok(id)) => Ok(Self {
                origin: acquired.id(),
                handle: acquired,
                id,
                disposed: false,
            }),
            Ok(Err(error)) | Err(error) => {
                if let Err(release_error) = acquired.release() {
                    warn!(
                        runtime = %acquired.id(),
                        error = %release_error,
                        "failed to roll back acquisition after registration error"
                    );
                }
                Err(error)
            }
        }
    }

    /// Get a copy of the pinned value.
    ///
    /// # Errors
    /// Returns `StaleReference` once disposed or if the id is no longer pinned
    pub fn get(&self) -> Result<R::Value> {
        self.with_value(|_, value| value.clone())
    }

    /// Run `operation` with the runtime and the pinned value.
    ///
    /// The runtime lock is held while `operation` runs.
    ///
    /// # Errors
    /// Returns `StaleReference` once disposed, or `RuntimeDisposed` if the
    /// runtime is gone
    pub fn with_value<T>(&self, operation: impl FnOnce(&mut R, &R::Value) -> T) -> Result<T> {
        if self.disposed {
            return Err(BridgeError::StaleReference(self.id));
        }
        let id = self.id;
        self.handle.with_runtime(|runtime| {
            let value = runtime.registry().lookup(id)?.clone();
            Ok(operation(runtime, &value))
        })?
    }

    /// Unpin the value, then release the runtime acquisition.
    ///
    /// Calling this again is a no-op. The acquisition is released even when
    /// unpinning fails; the first error is returned.
    ///
    /// # Errors
    /// Returns `StaleReference` if the id was already unpinned behind this
    /// reference's back, or `RuntimeDisposed` if the runtime is gone
    pub fn dispose(&mut self) -> Result<()> {
        if self.disposed {
            return Ok(());
        }
        self.disposed = true;

        let id = self.id;
        let unpinned = self
            .handle
            .with_runtime(|runtime| runtime.registry_mut().release(id).map(drop));
        let released = self.handle.release();

        unpinned??;
        released?;
        Ok(())
    }

    /// Registry id of the pinned value
    #[must_use]
    pub fn id(&self) -> RegistryId {
        self.id
    }

    /// Identity of the runtime the value was pinned on
    #[must_use]
    pub fn origin(&self) -> HandleId {
        self.origin
    }

    /// Handle of the runtime the value was pinned on
    #[must_use]
    pub fn handle(&self) -> &RuntimeHandle<R> {
        &self.handle
    }

    /// Check whether [`dispose`](Self::dispose) already ran
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Check that this reference was pinned on the runtime `expected`.
    ///
    /// # Errors
    /// Returns `ForeignReference` if it came from another runtime
    pub fn ensure_origin(&self, expected: HandleId) -> Result<()> {
        if self.origin == expected {
            Ok(())
        } else {
            Err(BridgeError::ForeignReference {
                expected,
                found: self.origin,
            })
        }
    }
}

impl<R: EmbeddedRuntime> fmt::Debug for ValueReference<R> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ValueReference")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("disposed", &self.disposed)
            .finish_non_exhaustive()
    }
}
