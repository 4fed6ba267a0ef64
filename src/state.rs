//! Per-verification state.
//!
//! Everything a run mutates lives here and is passed explicitly through the
//! validators; the crate keeps no process-wide mutable state, so distinct
//! sessions are independent and may run from parallel threads.

use std::fmt;

use indexmap::IndexMap;
use serde::Serialize;

use crate::card::ParsedCard;
use crate::diag::Sink;
use crate::opt::Options;

/// HDU classification used by the per-type validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HduKind {
    Primary,
    Image,
    AsciiTable,
    BinTable,
    Unknown,
}

impl Default for HduKind {
    fn default() -> Self {
        HduKind::Unknown
    }
}

impl fmt::Display for HduKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HduKind::Primary => "primary array",
            HduKind::Image => "image extension",
            HduKind::AsciiTable => "ASCII table",
            HduKind::BinTable => "binary table",
            HduKind::Unknown => "unknown extension",
        };
        f.write_str(name)
    }
}

/// One entry of the HDU directory.
#[derive(Debug, Clone, Serialize)]
pub struct HduRecord {
    pub kind: HduKind,
    /// 1-based HDU index.
    pub index: usize,
    /// Stored EXTNAME, empty when absent.
    pub extname: String,
    /// Stored EXTVER, 0 when absent.
    pub extver: i64,
    pub errors: u64,
    pub warnings: u64,
}

/// Result of one `verify_*` call.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct FileResult {
    pub num_errors: u64,
    pub num_warnings: u64,
    pub num_hdus: usize,
    pub aborted: bool,
}

/// Context the hint generator draws on. Validator call sites annotate the
/// state right before emitting; the pipeline clears it after each dispatch.
#[derive(Debug, Default)]
pub(crate) struct HintCtx {
    pub keyword: Option<String>,
    pub column: Option<usize>,
    /// Pre-computed fix text; the overlay must not overwrite it.
    pub fix_override: Option<String>,
    /// Pre-computed explanation; the overlay must not overwrite it.
    pub explain_override: Option<String>,
}

impl HintCtx {
    pub fn clear(&mut self) {
        *self = HintCtx::default();
    }
}

/// Cache assembled while one HDU is being validated, torn down when the
/// driver moves on. Teardown is unconditional and independent of what the
/// validators reported.
#[derive(Debug, Default)]
pub(crate) struct HduView {
    pub cards: Vec<ParsedCard>,
    /// The header bytes literally, one 80-byte record per card.
    pub raw: Vec<[u8; 80]>,
    /// name -> card positions (0-based into `cards`), in reading order.
    pub index: IndexMap<String, Vec<usize>>,
    pub bitpix: i64,
    pub naxis: i64,
    pub naxes: Vec<i64>,
    pub pcount: i64,
    pub gcount: i64,
    pub tfields: i64,
    pub ttype: Vec<Option<String>>,
    pub tform: Vec<Option<String>>,
    pub tunit: Vec<Option<String>>,
    pub is_random_groups: bool,
    pub is_tile_compressed: bool,
    pub use_longstring: bool,
    /// Raw value strings kept for summary printing.
    pub datamax: Option<String>,
    pub datamin: Option<String>,
}

impl HduView {
    /// First card holding `name`, if any.
    pub fn first(&self, name: &str) -> Option<&ParsedCard> {
        self.index
            .get(name)
            .and_then(|positions| positions.first())
            .map(|&p| &self.cards[p])
    }

    pub fn int_of(&self, name: &str) -> Option<i64> {
        self.first(name).and_then(|c| c.int_value())
    }

    pub fn str_of(&self, name: &str) -> Option<&str> {
        self.first(name).map(|c| c.value.as_str())
    }

    /// Size in bytes of the data unit this header declares, before fill.
    pub fn data_len(&self) -> u64 {
        if self.naxis <= 0 {
            return 0;
        }
        // Random groups carry NAXIS1 = 0; the first axis is skipped.
        let product: i64 = if self.is_random_groups {
            self.naxes.iter().skip(1).product()
        } else {
            self.naxes.iter().product()
        };
        if product < 0 {
            return 0;
        }
        self.bitpix.unsigned_abs() * ((self.pcount.max(0) + product) as u64)
            * self.gcount.max(1) as u64
            / 8
    }
}

/// Errors tolerated per file before the run gives up.
pub(crate) const MAX_FILE_ERRORS: u64 = 200;

/// State of one verification run over one stream.
///
/// Owns the counters, the HDU directory and the hint context; borrows the
/// session sink. Dropped at the end of `verify_*`, releasing everything on
/// the normal return path whether or not the run aborted.
pub(crate) struct Run<'a> {
    pub opts: Options,
    pub sink: &'a mut Sink,
    pub wrap_margin: usize,
    pub file_errors: u64,
    pub file_warnings: u64,
    pub hdu_errors: u64,
    pub hdu_warnings: u64,
    /// 1-based HDU under validation, 0 during file-level checks.
    pub cur_hdu: usize,
    pub cur_kind: HduKind,
    pub directory: Vec<HduRecord>,
    pub aborted: bool,
    pub hint: HintCtx,
    /// The 32-bit descriptor warning fires once per file.
    pub warned_var32: bool,
}

impl<'a> Run<'a> {
    pub fn new(opts: Options, sink: &'a mut Sink, wrap_margin: usize) -> Self {
        Self {
            opts,
            sink,
            wrap_margin,
            file_errors: 0,
            file_warnings: 0,
            hdu_errors: 0,
            hdu_warnings: 0,
            cur_hdu: 0,
            cur_kind: HduKind::Unknown,
            directory: Vec::new(),
            aborted: false,
            hint: HintCtx::default(),
            warned_var32: false,
        }
    }

    pub fn init_directory(&mut self, num_hdus: usize) {
        self.directory = (1..=num_hdus)
            .map(|index| HduRecord {
                kind: HduKind::Unknown,
                index,
                extname: String::new(),
                extver: 0,
                errors: 0,
                warnings: 0,
            })
            .collect();
    }

    /// Move the per-HDU counters into the directory entry and reset them.
    pub fn snapshot_hdu_counts(&mut self) {
        if self.cur_hdu >= 1 {
            if let Some(rec) = self.directory.get_mut(self.cur_hdu - 1) {
                rec.kind = self.cur_kind;
                rec.errors = self.hdu_errors;
                rec.warnings = self.hdu_warnings;
            }
        }
        self.hdu_errors = 0;
        self.hdu_warnings = 0;
    }

    pub fn record_extname(&mut self, extname: &str, extver: i64) {
        if self.cur_hdu >= 1 {
            if let Some(rec) = self.directory.get_mut(self.cur_hdu - 1) {
                rec.extname = extname.to_owned();
                rec.extver = extver;
            }
        }
    }

    pub fn result(&self, num_hdus: usize) -> FileResult {
        FileResult {
            num_errors: self.file_errors,
            num_warnings: self.file_warnings,
            num_hdus,
            aborted: self.aborted,
        }
    }
}
