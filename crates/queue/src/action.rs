use std::fmt;
use std::future::Future;

use drawq_core::Message;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::live::LiveTask;

type BoxedAction = Box<dyn FnOnce(LiveTask) -> BoxFuture<'static, Message> + Send>;

/// The call that hands a task to the rendering backend.
///
/// Invoked exactly once, by the worker that runs the task. It receives the
/// [`LiveTask`] so the integration can record correlation properties
/// (nonce, message id) before the backend starts reporting. A non-success
/// [`Message`] fails the task with the message description.
pub struct SubmitAction {
    call: BoxedAction,
}

impl SubmitAction {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: FnOnce(LiveTask) -> Fut + Send + 'static,
        Fut: Future<Output = Message> + Send + 'static,
    {
        Self {
            call: Box::new(move |task| f(task).boxed()),
        }
    }

    pub(crate) async fn invoke(self, task: LiveTask) -> Message {
        (self.call)(task).await
    }
}

impl fmt::Debug for SubmitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmitAction").finish_non_exhaustive()
    }
}
