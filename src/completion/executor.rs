//! Executors that run completion callbacks.

use std::fmt;

use tokio::runtime::Handle;

/// A unit of completion work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs completion work on behalf of the dispatcher.
///
/// Every resolution of a dispatch handle is submitted here, so listeners
/// registered by callers run wherever the executor decides.
pub trait CallbackExecutor: Send + Sync + 'static {
    fn execute(&self, task: Task);
}

impl<F> CallbackExecutor for F
where
    F: Fn(Task) + Send + Sync + 'static,
{
    fn execute(&self, task: Task) {
        self(task)
    }
}

/// Runs callbacks immediately on the I/O thread that completed the dispatch.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl CallbackExecutor for InlineExecutor {
    fn execute(&self, task: Task) {
        task()
    }
}

/// Moves callbacks onto the runtime's blocking thread pool, keeping listener
/// work off the reactor threads.
#[derive(Clone)]
pub struct BlockingPoolExecutor {
    handle: Handle,
}

impl BlockingPoolExecutor {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }
}

impl fmt::Debug for BlockingPoolExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingPoolExecutor").finish_non_exhaustive()
    }
}

impl CallbackExecutor for BlockingPoolExecutor {
    fn execute(&self, task: Task) {
        // The join handle is not needed; the task resolves its own handle.
        drop(self.handle.spawn_blocking(task));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn inline_runs_on_calling_thread() {
        let caller = thread::current().id();
        let ran_on = Arc::new(std::sync::Mutex::new(None));
        let sink = Arc::clone(&ran_on);
        InlineExecutor.execute(Box::new(move || {
            *sink.lock().unwrap() = Some(thread::current().id());
        }));
        assert_eq!(*ran_on.lock().unwrap(), Some(caller));
    }

    #[test]
    fn closures_are_executors() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let executor = |task: Task| task();
        executor.execute(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(ran.load(Ordering::SeqCst));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn blocking_pool_runs_off_the_caller() {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let executor = BlockingPoolExecutor::new(Handle::current());
        let caller = thread::current().id();
        executor.execute(Box::new(move || {
            let _ = tx.send(thread::current().id());
        }));
        let ran_on = rx.await.unwrap();
        assert_ne!(ran_on, caller);
    }
}
