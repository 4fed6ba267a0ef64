//! The byte-reader capability the engine is parameterized over.
//!
//! The core never touches a stream directly: everything it learns about the
//! bytes comes through [`FitsReader`]. The built-in [`StreamReader`] serves
//! files (plain or gzip-compressed) and in-memory buffers.

mod stream;

pub use stream::StreamReader;

use crate::error::Error;
use crate::state::HduKind;
use crate::tform::{self, BinTform};

/// Byte extent of one HDU. `data_end` includes the fill to the 2880-byte
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HduByteRange {
    pub header_start: u64,
    pub data_start: u64,
    pub data_end: u64,
}

/// Outcome of positioning the stream at an absolute offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPosition {
    /// The offset exists; at least one more byte follows it.
    Within,
    AtEnd,
    PastEnd,
}

/// Checksum verification outcome; `None` when the keyword is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChecksumReport {
    pub data_ok: Option<bool>,
    pub hdu_ok: Option<bool>,
}

/// Read-only access to a FITS byte stream.
///
/// Failures are reported through each method's `Result` and additionally
/// recorded on the reader's own status channel; the engine surfaces them
/// only through its reader diagnostics, draining
/// [`next_stack_message`](FitsReader::next_stack_message).
///
/// # Reentrancy
///
/// Implementations must keep all mutable state on the instance. The engine
/// drives one reader from one thread; distinct verifications with distinct
/// readers run concurrently, so an implementation wrapping a library with
/// process-global state must serialize internally or document that it
/// cannot be used from parallel verifications.
pub trait FitsReader {
    /// Human-readable identification of the stream (path or label).
    fn source(&self) -> &str;

    /// Identification of the reader implementation, for banners.
    fn version(&self) -> String {
        format!("fitscheck stream reader {}", env!("CARGO_PKG_VERSION"))
    }

    /// Number of complete HDUs in the stream.
    fn hdu_count(&mut self) -> Result<usize, Error>;

    /// Position on the 1-based `index`; subsequent card and byte-range
    /// operations refer to this HDU.
    fn move_to_hdu(&mut self, index: usize) -> Result<HduKind, Error>;

    /// Move `delta` HDUs forward or backward from the current one.
    fn move_relative(&mut self, delta: i64) -> Result<HduKind, Error>;

    /// Number of cards in the current header, END included.
    fn num_cards(&mut self) -> Result<usize, Error>;

    /// Raw 80 bytes of the 1-based `index`-th card of the current header.
    fn read_card(&mut self, index: usize) -> Result<[u8; 80], Error>;

    fn read_keyword_i64(&mut self, name: &str) -> Result<i64, Error>;
    fn read_keyword_f64(&mut self, name: &str) -> Result<f64, Error>;
    fn read_keyword_str(&mut self, name: &str) -> Result<String, Error>;

    fn hdu_byte_range(&mut self) -> Result<HduByteRange, Error>;

    /// Check an absolute offset against the stream extent, positioning the
    /// stream there when it exists.
    fn position_at_byte(&mut self, offset: u64) -> Result<StreamPosition, Error>;

    /// Fill `buf` from the absolute `offset`.
    fn read_bytes(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error>;

    /// Verify DATASUM/CHECKSUM of the current HDU.
    fn verify_checksum(&mut self) -> Result<ChecksumReport, Error>;

    /// Most recent failure description, if any.
    fn status_message(&self) -> Option<String>;

    /// Drain one line of the accumulated error stack.
    fn next_stack_message(&mut self) -> Option<String>;

    /// Forget any recorded failure state.
    fn clear_error(&mut self);

    /// Decode a binary-table TFORM value. Needs no stream state; provided
    /// so all implementations agree on the format grammar.
    fn parse_tform(&self, form: &str) -> Result<BinTform, Error> {
        tform::parse_bin(form)
    }

    /// Rows the reader prefers to hand over per batch when the data
    /// validator streams a table.
    fn row_batch_hint(&self, row_len: usize) -> usize {
        ((1 << 20) / row_len.max(1)).max(1)
    }
}
