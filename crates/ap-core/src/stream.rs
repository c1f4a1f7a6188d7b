//! Line streams produced by progress-reporting tools.
//!
//! A [`LineStream`] is finite and forward-only: it yields the lines a tool
//! prints, then either ends (success) or yields a single `Err` as its last
//! item (failure). Each tool invocation produces a fresh stream; streams are
//! never restarted.

use std::pin::Pin;

use futures::stream::{self, Stream, StreamExt};

use crate::error::{Error, Result};

/// Boxed stream of output lines terminated by completion or an error.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// A stream that yields `lines` and then completes.
pub fn completed<I>(lines: I) -> LineStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    Box::pin(stream::iter(lines.into_iter().map(Ok)))
}

/// A stream that yields `lines` and then terminates with `error`.
pub fn failing<I>(lines: I, error: Error) -> LineStream
where
    I: IntoIterator<Item = String>,
    I::IntoIter: Send + 'static,
{
    Box::pin(stream::iter(lines.into_iter().map(Ok)).chain(stream::once(async move { Err(error) })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn completed_yields_lines() {
        let items: Vec<_> = completed(vec!["a".to_string(), "b".to_string()])
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.is_ok()));
    }

    #[tokio::test]
    async fn failing_ends_with_error() {
        let items: Vec<_> = failing(vec!["a".to_string()], Error::tool("apktool", "brut"))
            .collect()
            .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().ok(), Some("a"));
        assert!(items[1].is_err());
    }
}
