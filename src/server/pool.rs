//! KVST - Fixed-Size Worker Pool
//! One acceptor thread hands each accepted connection to this pool; a
//! worker drains its assigned connection to completion before pulling the
//! next task. Connection-per-worker, thread-per-task: simpler than
//! per-request dispatch, and sufficient because in-memory operations are
//! short.

use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

/// A fixed-size pool of worker threads draining a shared job queue.
pub struct ThreadPool {
    workers: Vec<Worker>,
    sender: mpsc::Sender<Message>,
}

impl ThreadPool {
    /// Spawn `size` worker threads, each blocking on the shared receiver.
    ///
    /// # Panics
    /// Panics if `size` is 0.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "worker pool size must be greater than 0");

        let (sender, receiver) = mpsc::channel::<Message>();
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| Worker::new(id, Arc::clone(&receiver)))
            .collect();

        Self { workers, sender }
    }

    /// Submit a task to run on the next available worker.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Sending fails only if every worker has already shut down, which
        // only happens after `shutdown()` — submitting past that point is
        // a caller bug, not a recoverable condition.
        self.sender
            .send(Message::Run(Box::new(job)))
            .expect("worker pool sender closed before shutdown");
    }

    /// Stop accepting new tasks, let outstanding tasks finish, and join
    /// every worker thread. Idempotent is not guaranteed — call once.
    pub fn shutdown(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Shutdown);
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                let _ = handle.join();
            }
        }
    }
}

struct Worker {
    #[allow(dead_code)]
    id: usize,
    handle: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn new(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Self {
        let handle = thread::spawn(move || loop {
            let message = {
                let receiver = receiver.lock().expect("worker queue lock poisoned");
                receiver.recv()
            };
            match message {
                Ok(Message::Run(job)) => job(),
                Ok(Message::Shutdown) | Err(_) => break,
            }
        });

        Self {
            id,
            handle: Some(handle),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_submitted_jobs_run() {
        let pool = ThreadPool::new(4);
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = Arc::clone(&counter);
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        // Jobs are async; give the pool a moment to drain before asserting.
        thread::sleep(Duration::from_millis(200));
        assert_eq!(counter.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn test_shutdown_joins_all_workers() {
        let mut pool = ThreadPool::new(2);
        pool.submit(|| {});
        pool.shutdown();
        assert!(pool.workers.iter().all(|w| w.handle.is_none()));
    }

    #[test]
    #[should_panic]
    fn test_zero_size_panics() {
        ThreadPool::new(0);
    }
}
