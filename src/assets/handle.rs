//! Poll-Based Asset Handles
//!
//! Loaders deliver their result through a one-shot channel instead of a
//! completion callback. The frame loop polls each pending handle once per
//! frame, so a partially loaded scene is simply one whose handles are still
//! [`AssetPoll::Pending`].
//!
//! ```text
//! loader thread ──send(Result<T>)──► AssetHandle<T> ──poll()──► Pending | Ready | Failed
//! ```
//!
//! A handle whose sender is dropped without a result resolves to
//! [`AssetPoll::Failed`]; a sender that is kept alive but never used leaves
//! the handle pending forever, which is a valid state.

use flume::{Receiver, Sender, TryRecvError};

use crate::errors::{PostFxError, Result};

/// Outcome of a single poll.
#[derive(Debug)]
pub enum AssetPoll<T> {
    Pending,
    Ready(T),
    Failed(String),
}

/// Receiving side of an asynchronous load.
#[derive(Debug)]
pub struct AssetHandle<T> {
    label: String,
    receiver: Receiver<Result<T>>,
}

/// Sending side of an asynchronous load.
#[derive(Debug)]
pub struct AssetSender<T> {
    sender: Sender<Result<T>>,
}

impl<T> AssetSender<T> {
    /// Delivers the loaded asset. Ignored if the handle was dropped.
    pub fn resolve(self, value: T) {
        let _ = self.sender.send(Ok(value));
    }

    /// Delivers a load failure. Ignored if the handle was dropped.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self
            .sender
            .send(Err(PostFxError::AssetLoadFailed(reason.into())));
    }
}

impl<T> AssetHandle<T> {
    /// Creates a connected sender / handle pair.
    #[must_use]
    pub fn channel(label: impl Into<String>) -> (AssetSender<T>, Self) {
        let (sender, receiver) = flume::bounded(1);
        (
            AssetSender { sender },
            Self {
                label: label.into(),
                receiver,
            },
        )
    }

    /// Runs `load` on a background thread.
    pub fn spawn_load<F>(label: impl Into<String>, load: F) -> Self
    where
        F: FnOnce() -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let label = label.into();
        let (sender, handle) = Self::channel(label.clone());
        let spawned = std::thread::Builder::new()
            .name(format!("asset-load:{label}"))
            .spawn(move || {
                let _ = sender.sender.send(load());
            });

        if let Err(e) = spawned {
            log::error!("Failed to spawn loader thread for '{label}': {e}");
            // The sender moved into the closure was dropped with it, so the
            // handle already reports a disconnected (failed) load.
        }
        handle
    }

    #[inline]
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Non-blocking check for a result.
    ///
    /// `Ready` and `Failed` are returned at most once; afterwards the handle
    /// reports `Failed` because the channel is exhausted and disconnected.
    pub fn poll(&self) -> AssetPoll<T> {
        match self.receiver.try_recv() {
            Ok(Ok(value)) => AssetPoll::Ready(value),
            Ok(Err(e)) => AssetPoll::Failed(e.to_string()),
            Err(TryRecvError::Empty) => AssetPoll::Pending,
            Err(TryRecvError::Disconnected) => {
                AssetPoll::Failed(format!("loader for '{}' ended without a result", self.label))
            }
        }
    }
}
