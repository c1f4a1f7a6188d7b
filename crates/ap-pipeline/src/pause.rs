//! Interactive pause: stop the run until the operator presses a key.
//!
//! Used between decoding and encoding so the decoded tree can be edited by
//! hand. There is no timeout.

use std::future::Future;
use std::sync::Arc;

use ap_core::{Error, Result};
use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use tokio::sync::{mpsc, Mutex};

use crate::context::PipelineContext;
use crate::step::{Action, Outcome, Step, StepProgress};

pub const PAUSE_TITLE: &str = "Waiting for you to make changes";
pub const PROMPT: &str = "Press any key to continue.";

/// Source of the keypress that ends the pause.
#[async_trait]
pub trait KeySource: Send + Sync {
    /// Wait for exactly one keypress.
    async fn wait_for_key(&self) -> Result<()>;
}

/// Reads one key from the controlling terminal in raw mode.
///
/// Ctrl-C arrives as a key event in raw mode; it ends the pause with
/// [`Error::Interrupted`] instead of continuing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalKeySource;

/// Raw mode for as long as the guard lives.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = terminal::disable_raw_mode() {
            tracing::warn!("Failed to restore terminal mode: {e}");
        }
    }
}

fn read_one_key() -> Result<()> {
    let _raw = RawModeGuard::enable()?;
    loop {
        match event::read()? {
            // Release and repeat events would count one press several times.
            Event::Key(KeyEvent {
                kind: KeyEventKind::Press,
                code,
                modifiers,
                ..
            }) => {
                if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
                    return Err(Error::Interrupted);
                }
                return Ok(());
            }
            _ => continue,
        }
    }
}

#[async_trait]
impl KeySource for TerminalKeySource {
    async fn wait_for_key(&self) -> Result<()> {
        tokio::task::spawn_blocking(read_one_key)
            .await
            .map_err(|e| Error::Internal(format!("key reader panicked: {e}")))?
    }
}

/// Key source fed through a channel; each `()` sent is one keypress.
///
/// A closed channel ends the pause with [`Error::Interrupted`].
#[derive(Debug)]
pub struct ChannelKeySource {
    keys: Mutex<mpsc::Receiver<()>>,
}

impl ChannelKeySource {
    /// Create the source and the sender used to "press" keys.
    pub fn new() -> (Self, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel(8);
        (
            Self {
                keys: Mutex::new(rx),
            },
            tx,
        )
    }
}

#[async_trait]
impl KeySource for ChannelKeySource {
    async fn wait_for_key(&self) -> Result<()> {
        self.keys.lock().await.recv().await.ok_or(Error::Interrupted)
    }
}

struct PauseAction {
    keys: Arc<dyn KeySource>,
}

#[async_trait]
impl Action for PauseAction {
    async fn run(
        &self,
        _ctx: &mut PipelineContext,
        progress: &StepProgress<'_>,
    ) -> Result<Outcome> {
        progress.line(PROMPT);
        self.keys.wait_for_key().await?;
        Ok(Outcome::Completed)
    }
}

/// The pause step; present in the run only when `wait` is set.
pub fn pause_step(keys: Arc<dyn KeySource>, wait: bool) -> Step {
    Step::action(PAUSE_TITLE, PauseAction { keys }).enabled_if(move |_| wait)
}

/// Resolves once the process is asked to stop with SIGTERM or SIGHUP.
///
/// Never resolves when the handlers cannot be installed, or on targets
/// without Unix signals.
pub async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(mut term), Ok(mut hup)) => {
                tokio::select! {
                    _ = term.recv() => tracing::debug!("Received SIGTERM"),
                    _ = hup.recv() => tracing::debug!("Received SIGHUP"),
                }
                return;
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Failed to install termination handler: {e}");
            }
        }
    }
    std::future::pending::<()>().await
}

/// Drive `work` to completion unless `terminated` resolves first.
///
/// A key reader blocked inside the pause never gets to drop its
/// [`RawModeGuard`], so on termination raw mode is switched off here before
/// the run ends with [`Error::Interrupted`].
pub async fn until_terminated<T>(
    work: impl Future<Output = Result<T>>,
    terminated: impl Future<Output = ()>,
) -> Result<T> {
    tokio::select! {
        result = work => result,
        () = terminated => {
            if let Err(e) = terminal::disable_raw_mode() {
                tracing::warn!("Failed to restore terminal mode: {e}");
            }
            Err(Error::Interrupted)
        }
    }
}
