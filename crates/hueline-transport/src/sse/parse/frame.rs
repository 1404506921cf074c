//! Frames produced by [`FrameStream`](super::frame_stream::FrameStream).

use bytes::Bytes;
use bytes_utils::Str;

/// One complete block of the bridge's event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A block made only of comment lines, e.g. `: hi`.
    ///
    /// The bridge sends these as keep-alives; they carry no data.
    Heartbeat,
    /// A block carrying a payload.
    Data {
        /// Cursor of the form `<seq>:<sub-seq>`, empty if the stream never
        /// sent one. Advisory only.
        id: Str,
        /// Concatenated `data:` lines, joined with `\n`.
        payload: Bytes,
    },
}

impl Frame {
    /// Build a data frame from static parts. Mostly useful in tests.
    pub fn data(id: &'static str, payload: &'static [u8]) -> Self {
        Self::Data {
            id: Str::from_static(id),
            payload: Bytes::from_static(payload),
        }
    }

    /// Returns `true` for keep-alive frames.
    pub fn is_heartbeat(&self) -> bool {
        matches!(self, Self::Heartbeat)
    }

    /// The frame cursor, if this is a data frame.
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Heartbeat => None,
            Self::Data { id, .. } => Some(id),
        }
    }

    /// The frame payload, if this is a data frame.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Self::Heartbeat => None,
            Self::Data { payload, .. } => Some(payload),
        }
    }
}
