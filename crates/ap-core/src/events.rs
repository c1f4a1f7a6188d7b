//! Progress events emitted while a pipeline runs.
//!
//! The runner reports every step transition and every line a streaming tool
//! prints through a [`ProgressSink`]. The sink is a plain callback so the
//! caller decides whether to render, log, or collect the events.

/// One observable event of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineEvent {
    /// A step's action is about to run.
    StepStarted { title: String, depth: usize },
    /// A streaming action produced one line of output.
    Progress { title: String, line: String },
    /// The step finished; `value` carries the action's result, if any.
    StepCompleted {
        title: String,
        depth: usize,
        value: Option<String>,
    },
    /// The step was skipped, either by its skip predicate or by its action.
    StepSkipped {
        title: String,
        depth: usize,
        reason: Option<String>,
    },
    /// The step failed and the run is aborting.
    StepFailed {
        title: String,
        depth: usize,
        error: String,
    },
}

impl PipelineEvent {
    /// Title of the step this event belongs to.
    pub fn title(&self) -> &str {
        match self {
            PipelineEvent::StepStarted { title, .. }
            | PipelineEvent::Progress { title, .. }
            | PipelineEvent::StepCompleted { title, .. }
            | PipelineEvent::StepSkipped { title, .. }
            | PipelineEvent::StepFailed { title, .. } => title,
        }
    }
}

/// Receiver of [`PipelineEvent`]s.
pub struct ProgressSink {
    callback: Box<dyn Fn(&PipelineEvent) + Send + Sync>,
}

impl ProgressSink {
    /// Create a new sink from the given callback.
    pub fn new(callback: impl Fn(&PipelineEvent) + Send + Sync + 'static) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Create a no-op sink that discards all events.
    pub fn noop() -> Self {
        Self {
            callback: Box::new(|_| {}),
        }
    }

    /// Deliver one event.
    pub fn send(&self, event: PipelineEvent) {
        (self.callback)(&event);
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}
