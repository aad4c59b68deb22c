//! Ordered background execution.

use crate::events::Executor;
use crossbeam_channel::{bounded, unbounded, Sender};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send>;

/// A single worker thread draining a FIFO task channel.
///
/// One queue carries both the asynchronous bootstrap load and every queued
/// durable write, which is what keeps them ordered relative to each other.
/// Dropping the queue closes the channel and joins the worker after it has
/// drained everything already enqueued.
pub struct TaskQueue {
    tx: Option<Sender<Task>>,
    worker: Option<JoinHandle<()>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = unbounded::<Task>();
        let worker = thread::spawn(move || {
            while let Ok(task) = rx.recv() {
                task();
            }
        });
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// Enqueue a task behind everything already queued.
    pub fn run(&self, task: impl FnOnce() + Send + 'static) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(Box::new(task));
        }
    }

    /// Block until every task enqueued before this call has finished.
    pub fn flush(&self) {
        let (done_tx, done_rx) = bounded(1);
        if let Some(tx) = &self.tx {
            let marker: Task = Box::new(move || {
                let _ = done_tx.send(());
            });
            if tx.send(marker).is_ok() {
                let _ = done_rx.recv();
            }
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for TaskQueue {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        self.run(task);
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is left and exit.
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
