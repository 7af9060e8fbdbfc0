use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::extract::{ExtractError, ExtractOutcome, ExtractionPipeline};
use crate::namespace::VirtualNamespace;
use crate::node::{FileNode, NodeIndex};

/// Lifecycle of a single-file load.
///
/// `Pending -> Running -> {Succeeded | Cancelled | Failed}`. Terminal states
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Cancelled,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Cancelled | TaskState::Failed
        )
    }
}

/// Receives the content of a loaded file.
pub trait PreviewConsumer: Send {
    /// Runs before the load starts.
    fn on_load_start(&mut self, _namespace: &VirtualNamespace, _node: NodeIndex) {}

    /// Receives the complete content. Never called for a cancelled or failed load.
    fn accept(&mut self, file: &FileNode, data: Vec<u8>);
}

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Node {} is not a file", .0.get())]
    NotAFile(NodeIndex),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error("Load task stopped unexpectedly")]
    Join(#[from] tokio::task::JoinError),
}

/// Loads one file of a namespace into a [PreviewConsumer].
pub struct LoadTask<C> {
    pipeline: ExtractionPipeline,
    node: NodeIndex,
    consumer: C,
    cancel: CancellationToken,
    state: watch::Sender<TaskState>,
}

impl<C: PreviewConsumer> LoadTask<C> {
    pub fn new(pipeline: ExtractionPipeline, node: NodeIndex, consumer: C) -> LoadTask<C> {
        let (state, _) = watch::channel(TaskState::Pending);
        LoadTask {
            pipeline,
            node,
            consumer,
            cancel: CancellationToken::new(),
            state,
        }
    }

    /// Use `token` instead of a fresh one, e.g. a child of an application wide token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    fn transition(&self, next: TaskState) {
        self.state.send_if_modified(|current| {
            if current.is_terminal() || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }

    fn cancelled(&self) -> Result<TaskState, LoadError> {
        tracing::debug!(node = self.node.get(), "load cancelled");
        self.transition(TaskState::Cancelled);
        Ok(TaskState::Cancelled)
    }

    fn failed(&self, err: LoadError) -> Result<TaskState, LoadError> {
        tracing::warn!(node = self.node.get(), error = %err, "load failed");
        self.transition(TaskState::Failed);
        Err(err)
    }

    /// Run the load on the current thread.
    ///
    /// Returns the terminal state. A failure is returned as the error and
    /// leaves the task in [TaskState::Failed].
    pub fn run(mut self) -> Result<TaskState, LoadError> {
        let namespace = self.pipeline.namespace().clone();
        self.consumer.on_load_start(&namespace, self.node);
        self.transition(TaskState::Running);

        if self.cancel.is_cancelled() {
            return self.cancelled();
        }

        let Some(file) = namespace.file(self.node) else {
            return self.failed(LoadError::NotAFile(self.node));
        };

        let data = match self.pipeline.extract_to_vec(file, &self.cancel) {
            Ok(ExtractOutcome::Complete { sink, .. }) => sink,
            Ok(ExtractOutcome::Cancelled) => return self.cancelled(),
            Err(e) => return self.failed(e.into()),
        };

        if self.cancel.is_cancelled() {
            return self.cancelled();
        }

        tracing::debug!(path = %file.path, bytes = data.len(), "loaded file");
        self.consumer.accept(file, data);
        self.transition(TaskState::Succeeded);
        Ok(TaskState::Succeeded)
    }

    /// Run the load on the blocking pool.
    pub fn spawn(self) -> LoadHandle
    where
        C: 'static,
    {
        let cancel = self.cancellation_token();
        let state = self.subscribe();
        let join = tokio::task::spawn_blocking(move || self.run());
        LoadHandle {
            cancel,
            state,
            join,
        }
    }
}

/// A load running in the background.
pub struct LoadHandle {
    cancel: CancellationToken,
    state: watch::Receiver<TaskState>,
    join: JoinHandle<Result<TaskState, LoadError>>,
}

impl LoadHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> TaskState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TaskState> {
        self.state.clone()
    }

    /// Wait for the terminal state.
    pub async fn wait(self) -> Result<TaskState, LoadError> {
        self.join.await?
    }
}
