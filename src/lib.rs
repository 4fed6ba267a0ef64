//! This crate implements a validator for the FITS file format standard.
//!
//! A [`Verifier`] walks a FITS stream HDU by HDU, checks every header card,
//! the mandatory keyword sequences, the table structure and the data areas,
//! and reports each finding as a structured [`Diagnostic`] carrying a
//! stable numeric [`Code`], a severity and the HDU it belongs to. The
//! engine only reports: it never rewrites the stream, and a verification
//! that finds errors is still a successful call.
//!
//! # Examples
//!
//! Basic usage:
//!
//! ```no_run
//! use fitscheck::Verifier;
//!
//! let mut verifier = Verifier::new();
//! let result = verifier.verify_file("samples/image.fits").unwrap();
//! assert_eq!(result.num_errors, 0);
//! ```
//!
//! Collecting diagnostics instead of printing them:
//!
//! ```
//! use fitscheck::{Diagnostic, Verifier};
//! use std::sync::mpsc;
//!
//! let (tx, _rx) = mpsc::channel();
//! let mut verifier = Verifier::new();
//! verifier.set_output(move |d: &Diagnostic| {
//!     // Diagnostics borrow verifier scratch space; copy what you keep.
//!     let _ = tx.send(d.clone());
//! });
//! ```

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    clippy::uninlined_format_args,
    clippy::match_same_arms
)]

#[macro_use]
extern crate quick_error;

pub mod card;
mod check;
pub mod code;
mod diag;
pub mod error;
mod hint;
mod opt;
pub mod reader;
mod state;
pub mod tform;

pub use code::Code;
pub use diag::{Diagnostic, Severity};
pub use error::Error;
pub use opt::{Options, ReportLevel};
pub use reader::{FitsReader, StreamReader};
pub use state::{FileResult, HduKind};

use std::io::Write;
use std::path::Path;

use diag::Sink;
use state::Run;

/// Version of this crate, surfaced in banners and JSON reports.
pub fn pkg_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// A reentrant verification session.
///
/// One `Verifier` carries the options, the output sink and the cumulative
/// totals across the files it verifies. Sessions share no state: distinct
/// instances may run from parallel threads, each with its own reader.
pub struct Verifier {
    opts: Options,
    sink: Sink,
    wrap_margin: usize,
    session_errors: u64,
    session_warnings: u64,
}

impl Default for Verifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Verifier {
    pub fn new() -> Self {
        Self::with_options(Options::default())
    }

    pub fn with_options(opts: Options) -> Self {
        Self {
            opts,
            sink: Sink::default(),
            wrap_margin: diag::DEFAULT_WRAP_MARGIN,
            session_errors: 0,
            session_warnings: 0,
        }
    }

    pub fn options(&self) -> &Options {
        &self.opts
    }

    /// Options take effect at the next `verify_*` call; a run in progress
    /// keeps its snapshot.
    pub fn options_mut(&mut self) -> &mut Options {
        &mut self.opts
    }

    /// Deliver diagnostics to `callback` instead of writing them out.
    ///
    /// The diagnostic borrowed by the callback is only valid during the
    /// call; clone whatever must be retained.
    pub fn set_output<F>(&mut self, callback: F)
    where
        F: FnMut(&Diagnostic) + 'static,
    {
        self.sink = Sink::Callback(Box::new(callback));
    }

    /// Restore textual output, directed at `writer`.
    pub fn set_writer<W>(&mut self, writer: W)
    where
        W: Write + 'static,
    {
        self.sink = Sink::Write(Box::new(writer));
    }

    /// Left margin of wrapped continuation lines in textual output,
    /// clamped to 70 columns.
    pub fn set_wrap_margin(&mut self, margin: usize) {
        self.wrap_margin = margin.min(diag::MAX_WRAP_MARGIN);
    }

    /// Verify a FITS file on disk (gzip-compressed files are accepted).
    ///
    /// `Ok` means the verification ran to completion, whatever it found;
    /// the only `Err` is a reader failure that prevented validation.
    pub fn verify_file<P: AsRef<Path>>(&mut self, path: P) -> Result<FileResult, Error> {
        let label = path.as_ref().display().to_string();
        match StreamReader::open_file(path) {
            Ok(mut rdr) => self.verify_reader(&mut rdr),
            Err(e) => {
                self.report_open_failure(&label, &e);
                Err(e)
            }
        }
    }

    /// Verify an in-memory FITS stream; `label` stands in for the file
    /// name in the output.
    pub fn verify_memory(
        &mut self,
        buffer: Vec<u8>,
        label: impl Into<String>,
    ) -> Result<FileResult, Error> {
        let label = label.into();
        match StreamReader::open_memory(buffer, label.clone()) {
            Ok(mut rdr) => self.verify_reader(&mut rdr),
            Err(e) => {
                self.report_open_failure(&label, &e);
                Err(e)
            }
        }
    }

    /// Verify through an already-open reader capability.
    pub fn verify_reader(&mut self, rdr: &mut dyn FitsReader) -> Result<FileResult, Error> {
        let mut run = Run::new(self.opts.clone(), &mut self.sink, self.wrap_margin);
        let outcome = check::drive(&mut run, rdr);
        let (errors, warnings) = (run.file_errors, run.file_warnings);
        drop(run);
        self.session_errors += errors;
        self.session_warnings += warnings;
        outcome
    }

    /// One severe diagnostic for a stream that could not be opened; this
    /// is the only case where a `verify_*` call returns `Err`.
    fn report_open_failure(&mut self, label: &str, e: &Error) {
        let mut run = Run::new(self.opts.clone(), &mut self.sink, self.wrap_margin);
        run.info(&format!("File: {label}"));
        let code = match e {
            Error::EndNotFound(_) => Code::EndMissing,
            _ => Code::Reader,
        };
        run.severe(code, &format!("cannot verify {label}: {e}"));
        run.aborted = true;
        let (errors, warnings) = (run.file_errors, run.file_warnings);
        drop(run);
        self.session_errors += errors;
        self.session_warnings += warnings;
    }

    /// Cumulative totals over every verification this session ran.
    pub fn totals(&self) -> (u64, u64) {
        (self.session_errors, self.session_warnings)
    }
}
