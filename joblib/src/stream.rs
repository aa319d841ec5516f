use crate::events::LogEvent;

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// The log lines of one job, as seen by one subscriber.
///
/// Every subscriber gets the job's whole output from the first line, independently of other
/// subscribers. The stream ends once the job is finished and all of its lines were delivered.
#[derive(Debug)]
pub struct LogStream {
    inner: UnboundedReceiverStream<LogEvent>,
}

impl LogStream {
    pub(crate) fn new(receiver: mpsc::UnboundedReceiver<LogEvent>) -> Self {
        Self {
            inner: UnboundedReceiverStream::new(receiver),
        }
    }

    /// Wait for the next line. `None` once the job's output is exhausted.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.inner.next().await
    }

    /// Drain the stream into plain lines.
    pub async fn lines(self) -> Vec<String> {
        self.map(|event| event.line).collect().await
    }
}

impl Stream for LogStream {
    type Item = LogEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
