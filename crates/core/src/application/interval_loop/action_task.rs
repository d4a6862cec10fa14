// Owned handle for the in-flight action
use tokio::task::JoinHandle;

/// Spawned action task that is aborted when dropped
///
/// Dropping the `run` future (caller timeout, aborted loop task) drops this
/// guard, so an action never outlives the run that started it.
pub(super) struct ActionTask<T> {
    handle: JoinHandle<T>,
}

impl<T> ActionTask<T> {
    pub(super) fn new(handle: JoinHandle<T>) -> Self {
        Self { handle }
    }

    pub(super) fn handle_mut(&mut self) -> &mut JoinHandle<T> {
        &mut self.handle
    }

    pub(super) fn abort(&self) {
        self.handle.abort();
    }
}

impl<T> Drop for ActionTask<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
