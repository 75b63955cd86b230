use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

/// Slot for the background task feeding one stream.
#[derive(Debug, Default)]
pub(crate) struct StreamTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StreamTask {
    pub(crate) fn replace(&self, handle: JoinHandle<()>) {
        if let Some(previous) = self.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Returns whether a task was running.
    pub(crate) fn abort(&self) -> bool {
        match self.lock().take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for StreamTask {
    fn drop(&mut self) {
        self.abort();
    }
}
