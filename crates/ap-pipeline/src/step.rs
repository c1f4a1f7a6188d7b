//! The step model: a titled [`Action`] or nested step list, guarded by
//! optional enablement and skip predicates.

use ap_core::{LineStream, PipelineEvent, ProgressSink, Result};
use async_trait::async_trait;
use futures::StreamExt;

use crate::context::PipelineContext;

/// Predicate over the run's context.
pub type Predicate = Box<dyn Fn(&PipelineContext) -> bool + Send + Sync>;

/// What an action produced.
pub enum Outcome {
    /// Finished with nothing to report.
    Completed,
    /// Finished with a short result shown next to the step title.
    Value(String),
    /// The action decided not to do its work; the reason is shown instead.
    Skipped(String),
    /// Output still being produced. The runner forwards every line and the
    /// step finishes when the stream does.
    Lines(LineStream),
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Completed => f.write_str("Completed"),
            Outcome::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Outcome::Skipped(r) => f.debug_tuple("Skipped").field(r).finish(),
            Outcome::Lines(_) => f.write_str("Lines(..)"),
        }
    }
}

/// The work behind a step.
#[async_trait]
pub trait Action: Send + Sync {
    /// Perform the step.
    ///
    /// Lines reported through `progress` are attributed to the running step.
    /// Returning `Err` aborts the run.
    async fn run(&self, ctx: &mut PipelineContext, progress: &StepProgress<'_>)
        -> Result<Outcome>;
}

/// Progress reporter handed to a running action.
#[derive(Debug, Clone, Copy)]
pub struct StepProgress<'a> {
    title: &'a str,
    sink: &'a ProgressSink,
}

impl<'a> StepProgress<'a> {
    pub fn new(title: &'a str, sink: &'a ProgressSink) -> Self {
        Self { title, sink }
    }

    pub fn title(&self) -> &str {
        self.title
    }

    /// Report one line of output.
    pub fn line(&self, line: &str) {
        tracing::debug!("[{}] {}", self.title, line);
        self.sink.send(PipelineEvent::Progress {
            title: self.title.to_string(),
            line: line.to_string(),
        });
    }

    /// Forward every line of `lines` in order until it ends.
    ///
    /// Returns the stream's error if it terminated with one.
    pub async fn forward(&self, mut lines: LineStream) -> Result<()> {
        while let Some(item) = lines.next().await {
            self.line(&item?);
        }
        Ok(())
    }
}

/// Body of a [`Step`].
pub enum StepBody {
    Action(Box<dyn Action>),
    /// Nested steps run with the same rules and the same context.
    Pipeline(Vec<Step>),
}

/// One entry of a pipeline.
pub struct Step {
    title: String,
    enabled: Option<Predicate>,
    skip: Option<Predicate>,
    body: StepBody,
}

impl Step {
    /// A step that runs `action`.
    pub fn action(title: impl Into<String>, action: impl Action + 'static) -> Self {
        Self::new(title, StepBody::Action(Box::new(action)))
    }

    /// A step that runs `steps` as a sub-pipeline.
    pub fn pipeline(title: impl Into<String>, steps: Vec<Step>) -> Self {
        Self::new(title, StepBody::Pipeline(steps))
    }

    fn new(title: impl Into<String>, body: StepBody) -> Self {
        Self {
            title: title.into(),
            enabled: None,
            skip: None,
            body,
        }
    }

    /// Leave the step out of the run entirely when `pred` is false.
    pub fn enabled_if(
        mut self,
        pred: impl Fn(&PipelineContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.enabled = Some(Box::new(pred));
        self
    }

    /// Report the step as skipped, without running it, when `pred` is true.
    pub fn skip_if(
        mut self,
        pred: impl Fn(&PipelineContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.skip = Some(Box::new(pred));
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn body(&self) -> &StepBody {
        &self.body
    }

    pub(crate) fn is_enabled(&self, ctx: &PipelineContext) -> bool {
        self.enabled.as_ref().map_or(true, |pred| pred(ctx))
    }

    pub(crate) fn should_skip(&self, ctx: &PipelineContext) -> bool {
        self.skip.as_ref().is_some_and(|pred| pred(ctx))
    }
}

impl std::fmt::Debug for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Step");
        s.field("title", &self.title)
            .field("enabled", &self.enabled.is_some())
            .field("skip", &self.skip.is_some());
        match &self.body {
            StepBody::Action(_) => s.field("body", &"action"),
            StepBody::Pipeline(steps) => s.field("body", steps),
        };
        s.finish()
    }
}
