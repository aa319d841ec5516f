use crate::events::LogEvent;
use crate::types::JobId;

use bytes::{Buf, BytesMut};
use std::io;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::mpsc,
};

/// Read the child's merged output and forward it line by line.
///
/// `\n`, `\r\n` and a lone `\r` all end a line, so progress bars redrawn with `\r` arrive as
/// they are drawn. A trailing line without a terminator is still forwarded at EOF. On a read
/// error the bytes already read are forwarded before the error is returned.
pub async fn forward_lines<R>(
    job_id: JobId,
    mut output: R,
    output_tx: mpsc::UnboundedSender<LogEvent>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new(job_id, output_tx);
    let mut buf = BytesMut::with_capacity(4096);
    loop {
        buf.reserve(4096);
        match output.read_buf(&mut buf).await {
            Ok(0) => {
                framer.flush(&mut buf);
                return Ok(());
            }
            Ok(_) => framer.split_lines(&mut buf),
            Err(err) => {
                framer.flush(&mut buf);
                return Err(err);
            }
        }
    }
}

struct LineFramer {
    job_id: JobId,
    seq: u64,
    /// Bytes at the front of the buffer already known to hold no line end.
    scanned: usize,
    /// The last line ended in `\r`; a `\n` right after it belongs to the same line end.
    after_cr: bool,
    output_tx: mpsc::UnboundedSender<LogEvent>,
}

impl LineFramer {
    fn new(job_id: JobId, output_tx: mpsc::UnboundedSender<LogEvent>) -> Self {
        Self {
            job_id,
            seq: 0,
            scanned: 0,
            after_cr: false,
            output_tx,
        }
    }

    fn split_lines(&mut self, buf: &mut BytesMut) {
        loop {
            if self.after_cr {
                if buf.is_empty() {
                    return;
                }
                if buf[0] == b'\n' {
                    buf.advance(1);
                }
                self.after_cr = false;
            }

            let end = match buf[self.scanned..]
                .iter()
                .position(|b| *b == b'\n' || *b == b'\r')
            {
                Some(offset) => self.scanned + offset,
                None => {
                    self.scanned = buf.len();
                    return;
                }
            };
            // move the line and its terminator out of buf, leaving the rest in place
            let line = buf.split_to(end + 1);
            self.scanned = 0;
            self.after_cr = line[end] == b'\r';
            self.emit(&line[..end]);
        }
    }

    fn flush(&mut self, buf: &mut BytesMut) {
        self.split_lines(buf);
        if !buf.is_empty() {
            let rest = buf.split();
            self.emit(&rest);
        }
        self.scanned = 0;
    }

    fn emit(&mut self, raw: &[u8]) {
        let event = LogEvent {
            job_id: self.job_id,
            seq: self.seq,
            line: String::from_utf8_lossy(raw).into_owned(),
        };
        self.seq += 1;
        // the broadcaster outlives the reader, a failed send means nobody can observe the line
        let _ = self.output_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWriteExt, ReadBuf};

    async fn collect(input: &[u8]) -> Vec<LogEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_lines(JobId::nil(), input, tx)
            .await
            .expect("reading from a slice cannot fail");
        let mut events = vec![];
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    fn lines(events: &[LogEvent]) -> Vec<&str> {
        events.iter().map(|e| e.line.as_str()).collect()
    }

    #[tokio::test]
    async fn splits_on_newlines() {
        let events = collect(b"first\nsecond\r\n\nthird\n").await;
        assert_eq!(lines(&events), vec!["first", "second", "", "third"]);
        let seqs: Vec<u64> = events.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn carriage_returns_end_lines() {
        let events = collect(b" 10%\r 20%\r 30%\r\ndone\n").await;
        assert_eq!(lines(&events), vec![" 10%", " 20%", " 30%", "done"]);
        let events = collect(b"a\r\rb\r").await;
        assert_eq!(lines(&events), vec!["a", "", "b"]);
    }

    #[tokio::test]
    async fn progress_lines_arrive_before_the_next_newline() {
        let (mut child, reader) = tokio::io::duplex(64);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reading = tokio::spawn(forward_lines(JobId::nil(), reader, tx));

        child.write_all(b" 10%\r").await.unwrap();
        assert_eq!(rx.recv().await.map(|e| e.line), Some(" 10%".into()));

        // the \n completes the \r\n from the previous write, it is not an empty line
        child.write_all(b"\n 20%\r").await.unwrap();
        assert_eq!(rx.recv().await.map(|e| e.line), Some(" 20%".into()));
        child.write_all(b"\ndone").await.unwrap();
        drop(child);

        reading.await.unwrap().unwrap();
        assert_eq!(rx.recv().await.map(|e| e.line), Some("done".into()));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn trailing_partial_line_is_kept() {
        let events = collect(b"done\nno newline").await;
        assert_eq!(lines(&events), vec!["done", "no newline"]);
    }

    #[tokio::test]
    async fn empty_output_yields_nothing() {
        assert!(collect(b"").await.is_empty());
    }

    #[tokio::test]
    async fn invalid_utf8_is_replaced() {
        let events = collect(b"caf\xe9\n").await;
        assert_eq!(lines(&events), vec!["caf\u{fffd}"]);
    }

    /// Yields some bytes, then fails like a broken pipe.
    struct Broken {
        data: Option<&'static [u8]>,
    }

    impl AsyncRead for Broken {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.data.take() {
                Some(data) => {
                    buf.put_slice(data);
                    Poll::Ready(Ok(()))
                }
                None => Poll::Ready(Err(io::ErrorKind::BrokenPipe.into())),
            }
        }
    }

    #[tokio::test]
    async fn read_error_flushes_what_was_read() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader = Broken {
            data: Some(b"line one\npartial"),
        };
        let err = forward_lines(JobId::nil(), reader, tx)
            .await
            .expect_err("reader fails after the first chunk");
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(rx.recv().await.map(|e| e.line), Some("line one".into()));
        assert_eq!(rx.recv().await.map(|e| e.line), Some("partial".into()));
        assert!(rx.recv().await.is_none());
    }
}
