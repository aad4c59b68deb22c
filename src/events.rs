//! Change notification.
//!
//! Listeners never run under the cache lock on their own account: the
//! database hands each callback to the [`Executor`] chosen at construction
//! and moves on. Delivery order matches scheduling order whenever the
//! executor itself is ordered, for example a [`crate::worker::TaskQueue`].

use crate::types::SubscriptionId;
use std::sync::Arc;

/// Receiver for database change events.
///
/// Every method has a default empty body so listeners implement only what
/// they care about.
pub trait ChangeListener: Send + Sync + 'static {
    /// The bootstrap load finished and mutations are accepted from now on.
    fn on_database_loaded(&self) {}

    /// A record was inserted or updated.
    fn on_record_changed(&self, _id: SubscriptionId) {}

    /// The applications-enabled flag of a record flipped. Always delivered
    /// after the `on_record_changed` for the same mutation.
    fn on_applications_enabled_changed(&self, _id: SubscriptionId) {}
}

/// Execution context for listener callbacks.
pub trait Executor: Send + Sync + 'static {
    fn execute(&self, task: Box<dyn FnOnce() + Send>);
}

/// Runs tasks on the calling thread, before `execute` returns.
///
/// Meant for tests and callers that only forward events somewhere else.
/// Callback code runs on the mutating thread while the mutation is still in
/// flight, so it must not call back into the database.
pub struct InlineExecutor;

impl Executor for InlineExecutor {
    fn execute(&self, task: Box<dyn FnOnce() + Send>) {
        task();
    }
}

/// One listener paired with the executor its callbacks run on.
pub(crate) struct ChangeNotifier {
    listener: Arc<dyn ChangeListener>,
    executor: Arc<dyn Executor>,
}

impl ChangeNotifier {
    pub(crate) fn new(listener: Arc<dyn ChangeListener>, executor: Arc<dyn Executor>) -> Self {
        Self { listener, executor }
    }

    pub(crate) fn database_loaded(&self) {
        self.dispatch(|listener| listener.on_database_loaded());
    }

    pub(crate) fn record_changed(&self, id: SubscriptionId) {
        self.dispatch(move |listener| listener.on_record_changed(id));
    }

    pub(crate) fn applications_enabled_changed(&self, id: SubscriptionId) {
        self.dispatch(move |listener| listener.on_applications_enabled_changed(id));
    }

    fn dispatch<F>(&self, deliver: F)
    where
        F: FnOnce(&dyn ChangeListener) + Send + 'static,
    {
        let listener = Arc::clone(&self.listener);
        self.executor.execute(Box::new(move || deliver(listener.as_ref())));
    }
}
