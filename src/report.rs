//! Terminal rendering of pipeline events.

use std::sync::atomic::{AtomicUsize, Ordering};

use ap_core::{PipelineEvent, ProgressSink};

/// Shown after patching one APK of a split app.
pub const APP_BUNDLE_WARNING: &str = "\
WARNING

This app seems to be using Android App Bundle which means that you
will likely run into problems installing it. That's because this app
is made out of multiple APK files and you've only got one of them.

If you want to patch an app like this, you'll have to pull all of its
APK files from a device and patch them together.";

/// Turns [`PipelineEvent`]s into indented status lines.
#[derive(Debug, Default)]
pub struct Reporter {
    /// Depth of the most recently started step; progress lines nest under it.
    current_depth: AtomicUsize,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The text to print for `event`.
    pub fn render(&self, event: &PipelineEvent) -> String {
        match event {
            PipelineEvent::StepStarted { title, depth } => {
                self.current_depth.store(*depth, Ordering::Relaxed);
                format!("{}… {title}", indent(*depth))
            }
            PipelineEvent::Progress { line, .. } => {
                let depth = self.current_depth.load(Ordering::Relaxed);
                format!("{}  → {line}", indent(depth))
            }
            PipelineEvent::StepCompleted {
                title,
                depth,
                value,
            } => match value {
                Some(value) => format!("{}✓ {title} ({value})", indent(*depth)),
                None => format!("{}✓ {title}", indent(*depth)),
            },
            PipelineEvent::StepSkipped {
                title,
                depth,
                reason,
            } => match reason {
                Some(reason) => format!(
                    "{pad}↓ {title} [skipped]\n{pad}  → {reason}",
                    pad = indent(*depth)
                ),
                None => format!("{}↓ {title} [skipped]", indent(*depth)),
            },
            PipelineEvent::StepFailed {
                title,
                depth,
                error,
            } => format!("{pad}✗ {title}\n{pad}  → {error}", pad = indent(*depth)),
        }
    }

    /// A sink printing every event to stdout.
    pub fn into_sink(self) -> ProgressSink {
        ProgressSink::new(move |event| println!("{}", self.render(event)))
    }
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth)
}
