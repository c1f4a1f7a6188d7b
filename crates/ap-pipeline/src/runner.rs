//! Pipeline runner: executes steps in declared order against one context,
//! forwarding progress and stopping at the first failure.

use ap_core::{Error, PipelineEvent, ProgressSink, Result};
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::context::PipelineContext;
use crate::step::{Outcome, Step, StepBody, StepProgress};

/// Final state of a step that ran or was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepStatus {
    Completed(Option<String>),
    Skipped(Option<String>),
}

impl StepStatus {
    pub fn is_skipped(&self) -> bool {
        matches!(self, StepStatus::Skipped(_))
    }
}

/// One reported step of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub title: String,
    /// Nesting level; 0 for top-level steps.
    pub depth: usize,
    pub status: StepStatus,
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// The context after the last step.
    pub context: PipelineContext,
    /// Every reported step in declared order, parents before children.
    /// Disabled steps do not appear.
    pub records: Vec<StepRecord>,
}

impl RunReport {
    pub fn record(&self, title: &str) -> Option<&StepRecord> {
        self.records.iter().find(|r| r.title == title)
    }

    /// Titles of the steps whose action ran to completion.
    pub fn executed(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| !r.status.is_skipped())
            .map(|r| r.title.as_str())
    }
}

/// Runs a list of [`Step`]s.
///
/// Steps never run concurrently. A failing step aborts the run with
/// [`Error::Step`] naming it; nothing already done is undone.
#[derive(Debug)]
pub struct PipelineRunner {
    steps: Vec<Step>,
}

impl PipelineRunner {
    pub fn new(steps: Vec<Step>) -> Self {
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run every step against `ctx`, reporting events to `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Step`] carrying the title of the top-level step that
    /// failed and the underlying error.
    pub async fn run(&self, mut ctx: PipelineContext, sink: &ProgressSink) -> Result<RunReport> {
        let mut records = Vec::new();
        run_steps(&self.steps, 0, &mut ctx, sink, &mut records).await?;
        tracing::info!("Pipeline finished ({} steps reported)", records.len());
        Ok(RunReport {
            context: ctx,
            records,
        })
    }
}

fn run_steps<'a>(
    steps: &'a [Step],
    depth: usize,
    ctx: &'a mut PipelineContext,
    sink: &'a ProgressSink,
    records: &'a mut Vec<StepRecord>,
) -> BoxFuture<'a, Result<()>> {
    async move {
        for step in steps {
            let title = step.title();

            if !step.is_enabled(ctx) {
                tracing::debug!("Disabled: {}", title);
                continue;
            }

            if step.should_skip(ctx) {
                tracing::info!("Skipped: {}", title);
                sink.send(PipelineEvent::StepSkipped {
                    title: title.to_string(),
                    depth,
                    reason: None,
                });
                records.push(StepRecord {
                    title: title.to_string(),
                    depth,
                    status: StepStatus::Skipped(None),
                });
                continue;
            }

            tracing::info!("Starting: {}", title);
            sink.send(PipelineEvent::StepStarted {
                title: title.to_string(),
                depth,
            });

            // Children record themselves while the parent runs; keep the
            // parent ahead of them.
            let slot = records.len();
            let result = match step.body() {
                StepBody::Action(action) => {
                    let progress = StepProgress::new(title, sink);
                    match action.run(ctx, &progress).await {
                        Ok(Outcome::Lines(lines)) => {
                            progress.forward(lines).await.map(|()| Outcome::Completed)
                        }
                        other => other,
                    }
                }
                StepBody::Pipeline(children) => run_steps(children, depth + 1, ctx, sink, records)
                    .await
                    .map(|()| Outcome::Completed),
            };

            let status = match result {
                Ok(Outcome::Completed | Outcome::Lines(_)) => {
                    sink.send(PipelineEvent::StepCompleted {
                        title: title.to_string(),
                        depth,
                        value: None,
                    });
                    StepStatus::Completed(None)
                }
                Ok(Outcome::Value(value)) => {
                    sink.send(PipelineEvent::StepCompleted {
                        title: title.to_string(),
                        depth,
                        value: Some(value.clone()),
                    });
                    StepStatus::Completed(Some(value))
                }
                Ok(Outcome::Skipped(reason)) => {
                    tracing::info!("Skipped: {} ({})", title, reason);
                    sink.send(PipelineEvent::StepSkipped {
                        title: title.to_string(),
                        depth,
                        reason: Some(reason.clone()),
                    });
                    StepStatus::Skipped(Some(reason))
                }
                Err(e) => {
                    tracing::error!("Step failed: {}: {}", title, e);
                    sink.send(PipelineEvent::StepFailed {
                        title: title.to_string(),
                        depth,
                        error: e.to_string(),
                    });
                    return Err(Error::step(title, e));
                }
            };

            tracing::info!("Completed: {}", title);
            records.insert(
                slot,
                StepRecord {
                    title: title.to_string(),
                    depth,
                    status,
                },
            );
        }
        Ok(())
    }
    .boxed()
}
