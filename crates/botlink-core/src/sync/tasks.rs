// ── Cancellable task arena ──
//
// Every timer and in-flight request a transport starts is spawned through
// its arena. `cancel_all()` stops all of them at once; a cancelled task
// never sends another message.

use std::future::Future;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub(crate) struct TaskArena {
    token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl TaskArena {
    pub(crate) fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    /// Spawn `fut`, racing it against this arena's cancellation token.
    pub(crate) fn spawn<F>(&mut self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.handles.retain(|h| !h.is_finished());

        let token = self.token.clone();
        self.handles.push(tokio::spawn(async move {
            tokio::select! {
                biased;
                () = token.cancelled() => {}
                () = fut => {}
            }
        }));
    }

    /// Cancel and abort everything spawned so far. The arena stays usable.
    pub(crate) fn cancel_all(&mut self) {
        self.token.cancel();
        for handle in self.handles.drain(..) {
            handle.abort();
        }
        self.token = CancellationToken::new();
    }

    /// Number of tasks still running.
    #[cfg(test)]
    pub(crate) fn active(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_finished()).count()
    }
}

impl Drop for TaskArena {
    fn drop(&mut self) {
        self.token.cancel();
        for handle in &self.handles {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn cancel_all_stops_pending_tasks() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut arena = TaskArena::new();

        let flag = Arc::clone(&fired);
        arena.spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            flag.store(true, Ordering::SeqCst);
        });
        assert_eq!(arena.active(), 1);

        arena.cancel_all();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!fired.load(Ordering::SeqCst));
        assert_eq!(arena.active(), 0);
    }

    #[tokio::test]
    async fn arena_is_reusable_after_cancel() {
        let fired = Arc::new(AtomicBool::new(false));
        let mut arena = TaskArena::new();
        arena.cancel_all();

        let flag = Arc::clone(&fired);
        arena.spawn(async move {
            flag.store(true, Ordering::SeqCst);
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert!(fired.load(Ordering::SeqCst));
    }
}
