use std::future::Future;

use tokio::task::JoinHandle;

/// A cancellable background request for one logical slot (a search box, a
/// pagination context).
///
/// Issuing a request aborts the previous one and bumps the generation, so a
/// result can always be matched against the request that produced it.
/// Dropping the slot aborts whatever is pending.
pub struct RequestSlot<T> {
    generation: u64,
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> RequestSlot<T> {
    pub fn new() -> Self {
        Self {
            generation: 0,
            handle: None,
        }
    }

    /// Spawn `future` as the slot's current request, aborting any previous
    /// one. Returns the new generation.
    pub fn issue<F>(&mut self, future: F) -> u64
    where
        F: Future<Output = T> + Send + 'static,
    {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        self.handle = Some(tokio::spawn(future));
        tracing::trace!(generation = self.generation, "Request issued");
        self.generation
    }

    /// Abort the pending request, if any. Returns true if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                tracing::trace!(generation = self.generation, "Request cancelled");
                true
            }
            None => false,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the current request. `None` when nothing is pending, or the
    /// task was aborted or panicked.
    pub async fn settle(&mut self) -> Option<T> {
        let handle = self.handle.take()?;
        match handle.await {
            Ok(value) => Some(value),
            Err(e) if e.is_cancelled() => None,
            Err(e) => {
                tracing::error!(generation = self.generation, error = %e, "Request task panicked");
                None
            }
        }
    }
}

impl<T: Send + 'static> Default for RequestSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for RequestSlot<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
