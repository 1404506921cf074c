//! Incremental parser for the bridge's event stream.
//!
//! The wire format is a subset of the
//! [Server-Sent Events](https://html.spec.whatwg.org/multipage/server-sent-events.html)
//! format: blocks of `id:`/`data:` lines terminated by a blank line, plus
//! comment-only blocks (`: hi`) used as keep-alives. Parsing never fails on
//! malformed input; unusable lines and blocks are skipped.

pub(crate) mod constants;
pub mod frame;
pub mod frame_stream;
pub(crate) mod parser;

pub use frame::Frame;
pub use frame_stream::FrameStream;
