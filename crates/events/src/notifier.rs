//! The notification contract used by the task queue.

use std::sync::Arc;

use drawq_core::Task;

/// Receives every task status change observed by the queue.
///
/// Implementations must return quickly: the caller is a queue worker that
/// is still driving the task. Anything slow (HTTP, retries) belongs on a
/// background task owned by the implementation.
pub trait Notifier: Send + Sync {
    fn notify_task_change(&self, task: &Task);
}

/// Fans a change out to several notifiers, in registration order.
#[derive(Default, Clone)]
pub struct Notifiers {
    inner: Vec<Arc<dyn Notifier>>,
}

impl Notifiers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.inner.push(notifier);
        self
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl Notifier for Notifiers {
    fn notify_task_change(&self, task: &Task) {
        for notifier in &self.inner {
            notifier.notify_task_change(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use drawq_core::TaskAction;

    #[derive(Default)]
    struct Counting(Mutex<usize>);

    impl Notifier for Counting {
        fn notify_task_change(&self, _task: &Task) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[test]
    fn fan_out_reaches_every_notifier() {
        let a = Arc::new(Counting::default());
        let b = Arc::new(Counting::default());
        let all = Notifiers::new()
            .with(Arc::clone(&a) as Arc<dyn Notifier>)
            .with(Arc::clone(&b) as Arc<dyn Notifier>);

        all.notify_task_change(&Task::new(TaskAction::Imagine));
        all.notify_task_change(&Task::new(TaskAction::Imagine));

        assert_eq!(all.len(), 2);
        assert_eq!(*a.0.lock().unwrap(), 2);
        assert_eq!(*b.0.lock().unwrap(), 2);
    }

    #[test]
    fn empty_fan_out_is_noop() {
        let none = Notifiers::new();
        assert!(none.is_empty());
        none.notify_task_change(&Task::new(TaskAction::Imagine));
    }
}
