//! [`Stream`] that turns a stream of byte chunks into [`Frame`]s.

use core::{
    pin::Pin,
    task::{Context, Poll, ready},
};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use bytes_utils::Str;
use futures_core::Stream;
use tracing::trace;

use super::{
    constants::{BOM, CR, LF},
    frame::Frame,
    parser::{Line, next_line},
};

// ---------------------------------------------------------------------------
// FrameBuilder
// ---------------------------------------------------------------------------

/// Data accumulated for the block being read.
///
/// Most bridge frames carry a single `data:` line, so the first value is kept
/// as a zero-copy slice and only upgraded to a growable buffer when a second
/// line arrives.
#[derive(Debug, Default, Clone)]
enum DataBuffer {
    #[default]
    Uninit,
    Single(Bytes),
    Joined(BytesMut),
}

impl DataBuffer {
    fn push(&mut self, chunk: Bytes) {
        match self {
            Self::Uninit => *self = Self::Single(chunk),
            Self::Single(first) => {
                let mut joined = BytesMut::with_capacity(first.len() + 1 + chunk.len());
                joined.extend_from_slice(first);
                joined.put_u8(LF);
                joined.extend_from_slice(&chunk);
                *self = Self::Joined(joined);
            }
            Self::Joined(joined) => {
                joined.put_u8(LF);
                joined.extend_from_slice(&chunk);
            }
        }
    }

    fn freeze(self) -> Option<Bytes> {
        match self {
            Self::Uninit => None,
            Self::Single(bytes) => Some(bytes),
            Self::Joined(bytes) => Some(bytes.freeze()),
        }
    }
}

#[derive(Debug, Default, Clone)]
struct FrameBuilder {
    /// Id of the current block; never carried over to the next one.
    id: Option<Str>,
    data: DataBuffer,
    saw_comment: bool,
    saw_field: bool,
    is_complete: bool,
}

impl FrameBuilder {
    fn add(&mut self, line: Line) {
        match line {
            Line::Empty => self.is_complete = true,
            Line::Comment => self.saw_comment = true,
            Line::Data(chunk) => {
                self.saw_field = true;
                self.data.push(chunk);
            }
            Line::Id(id) => {
                self.saw_field = true;
                if id.is_some() {
                    self.id = id;
                }
            }
            Line::Other => self.saw_field = true,
        }
    }

    /// Close the current block.
    ///
    /// Blocks with both an id and data become [`Frame::Data`], blocks made
    /// only of comments become [`Frame::Heartbeat`], and anything else is
    /// dropped.
    #[must_use]
    fn dispatch(&mut self) -> Option<Frame> {
        let FrameBuilder {
            id,
            data,
            saw_comment,
            saw_field,
            ..
        } = core::mem::take(self);

        match (id, data.freeze()) {
            (Some(id), Some(payload)) => Some(Frame::Data { id, payload }),
            (None, Some(payload)) => {
                trace!(len = payload.len(), "data block without id, dropping");
                None
            }
            (_, None) if saw_comment && !saw_field => Some(Frame::Heartbeat),
            (_, None) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// FrameStreamState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
enum FrameStreamState {
    NotStarted,
    Started,
    Terminated,
}

impl FrameStreamState {
    fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }

    fn is_not_started(self) -> bool {
        matches!(self, Self::NotStarted)
    }
}

// ---------------------------------------------------------------------------
// FrameStream
// ---------------------------------------------------------------------------

pin_project_lite::pin_project! {
    /// A [`Stream`] that converts a stream of byte chunks into [`Frame`]s.
    ///
    /// Accepts LF, CR and CRLF line endings and strips a leading byte order
    /// mark. Output does not depend on where the input is split into chunks.
    /// Malformed blocks are skipped; only errors of the underlying stream are
    /// yielded.
    #[project = FrameStreamProjection]
    #[derive(Debug)]
    pub struct FrameStream<S> {
        #[pin]
        stream: S,
        buffer: BytesMut,
        builder: FrameBuilder,
        state: FrameStreamState,
    }
}

impl<S> FrameStream<S> {
    /// Wrap an underlying byte stream.
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buffer: BytesMut::new(),
            builder: FrameBuilder::default(),
            state: FrameStreamState::NotStarted,
        }
    }
}

/// `Some(true)` if the buffer starts with a BOM, `None` if it is too short to
/// tell yet.
fn starts_with_bom(buf: &[u8]) -> Option<bool> {
    let probe = buf.len().min(BOM.len());
    if buf[..probe] != BOM[..probe] {
        return Some(false);
    }
    (probe == BOM.len()).then_some(true)
}

fn parse_frame(buffer: &mut BytesMut, builder: &mut FrameBuilder) -> Option<Frame> {
    while let Some(line) = next_line(buffer) {
        builder.add(line);
        if builder.is_complete
            && let Some(frame) = builder.dispatch()
        {
            return Some(frame);
        }
    }
    None
}

impl<S, E, B> Stream for FrameStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    type Item = Result<Frame, E>;

    fn poll_next(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<<Self as Stream>::Item>> {
        let mut this = self.project();

        if let Some(frame) = parse_frame(this.buffer, this.builder) {
            return Poll::Ready(Some(Ok(frame)));
        }

        if this.state.is_terminated() {
            return Poll::Ready(None);
        }

        loop {
            let chunk = match ready!(this.stream.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Poll::Ready(Some(Err(e))),
                None => {
                    *this.state = FrameStreamState::Terminated;
                    // A trailing CR can no longer be the start of a CRLF.
                    if this.buffer.last() == Some(&CR) {
                        this.buffer.put_u8(LF);
                    }
                    return Poll::Ready(
                        parse_frame(this.buffer, this.builder).map(Ok),
                    );
                }
            };

            let chunk = chunk.as_ref();
            if chunk.is_empty() {
                continue;
            }
            this.buffer.extend_from_slice(chunk);

            if this.state.is_not_started() {
                match starts_with_bom(this.buffer) {
                    Some(true) => {
                        *this.state = FrameStreamState::Started;
                        this.buffer.advance(BOM.len());
                    }
                    Some(false) => *this.state = FrameStreamState::Started,
                    None => continue,
                }
            }

            if let Some(frame) = parse_frame(this.buffer, this.builder) {
                return Poll::Ready(Some(Ok(frame)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;

    const UPDATE: &[u8] = b"id: 1:0\ndata: [{\"type\":\"update\",\"data\":[{\"type\":\"light\",\"id\":\"abc\",\"on\":{\"on\":true}}]}]\n\n";

    async fn frames(chunks: Vec<&'static [u8]>) -> Vec<Frame> {
        FrameStream::new(futures_util::stream::iter(
            chunks
                .into_iter()
                .map(|chunk| Ok::<_, ()>(Bytes::from_static(chunk))),
        ))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .filter_map(Result::ok)
        .collect()
    }

    fn update_frame() -> Frame {
        Frame::data(
            "1:0",
            b"[{\"type\":\"update\",\"data\":[{\"type\":\"light\",\"id\":\"abc\",\"on\":{\"on\":true}}]}]",
        )
    }

    #[tokio::test]
    async fn data_frame() {
        assert_eq!(frames(vec![UPDATE]).await, vec![update_frame()]);
    }

    #[tokio::test]
    async fn heartbeat_frame() {
        assert_eq!(frames(vec![b": hi\n\n"]).await, vec![Frame::Heartbeat]);
        assert_eq!(
            frames(vec![b": hi\n\n: hi\r\n\r\n"]).await,
            vec![Frame::Heartbeat, Frame::Heartbeat]
        );
    }

    #[tokio::test]
    async fn comment_before_data_is_not_a_heartbeat() {
        assert_eq!(
            frames(vec![b": note\nid: 2:0\ndata: []\n\n"]).await,
            vec![Frame::data("2:0", b"[]")]
        );
    }

    #[tokio::test]
    async fn chunk_boundary_independence() {
        let mut input = Vec::new();
        input.extend_from_slice(b"\xEF\xBB\xBF: hi\r\n\r\n");
        input.extend_from_slice(UPDATE);
        input.extend_from_slice(b"id: 1:1\rdata: [\rdata: ]\r\r");
        let input: &'static [u8] = Vec::leak(input);

        let expected = vec![
            Frame::Heartbeat,
            update_frame(),
            Frame::data("1:1", b"[\n]"),
        ];

        for split in 0..=input.len() {
            let (head, tail) = input.split_at(split);
            assert_eq!(frames(vec![head, tail]).await, expected, "split at {split}");
        }

        let bytewise = input.chunks(1).collect::<Vec<_>>();
        assert_eq!(frames(bytewise).await, expected);
    }

    #[tokio::test]
    async fn malformed_blocks_are_skipped() {
        assert_eq!(
            frames(vec![b"id: 3:0\n\nevent: x\nretry: 5\n\n\n\n", UPDATE]).await,
            vec![update_frame()]
        );
    }

    #[tokio::test]
    async fn id_does_not_carry_over_to_next_block() {
        assert_eq!(
            frames(vec![b"id: 4:0\ndata: a\n\ndata: b\n\nid: 4:1\ndata: c\n\n"]).await,
            vec![Frame::data("4:0", b"a"), Frame::data("4:1", b"c")]
        );
    }

    #[tokio::test]
    async fn data_without_id_is_dropped() {
        assert!(frames(vec![b"data: [1]\r\r"]).await.is_empty());
        assert_eq!(
            frames(vec![b"data: [1]\n\n", UPDATE]).await,
            vec![update_frame()]
        );
    }

    #[tokio::test]
    async fn incomplete_block_at_end_is_dropped() {
        assert!(frames(vec![b"id: 5:0\ndata: [1]\n"]).await.is_empty());
    }

    #[tokio::test]
    async fn transport_errors_are_surfaced() {
        let stream = futures_util::stream::iter(vec![
            Ok(Bytes::from_static(b": hi\n\n")),
            Err("reset"),
        ]);
        let items = FrameStream::new(stream).collect::<Vec<_>>().await;
        assert_eq!(items, vec![Ok(Frame::Heartbeat), Err("reset")]);
    }
}
