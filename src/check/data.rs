//! Data-unit validation: table column values, variable-length descriptors,
//! fill bytes and checksums.
//!
//! Table rows are streamed in reader-chosen batches and every column check
//! reports its first violation only; subsequent rows of the same column
//! stay silent so one systematic defect cannot flood the report.

use byteorder::{BigEndian, ByteOrder};

use crate::code::Code;
use crate::error::Error;
use crate::reader::FitsReader;
use crate::state::{HduKind, HduView, Run};
use crate::tform::{self, BinTform, TformType};

/// Check the fill areas of the current HDU: header fill after END must be
/// spaces, data fill must be zeros (spaces in ASCII tables).
pub(crate) fn verify_fill(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    view: &HduView,
) -> Result<(), Error> {
    let range = rdr.hdu_byte_range()?;

    let header_used = range.header_start + view.cards.len() as u64 * 80;
    if header_used < range.data_start {
        let mut fill = vec![0_u8; (range.data_start - header_used) as usize];
        rdr.read_bytes(header_used, &mut fill)?;
        if let Some(pos) = fill.iter().position(|&b| b != b' ') {
            run.err(
                Code::HeaderFill,
                &format!(
                    "the header fill area after END contains a byte 0x{:02x} at offset {}; \
                     all fill must be ASCII spaces.",
                    fill[pos],
                    header_used + pos as u64
                ),
            );
        }
    }

    let data_used = range.data_start + view.data_len();
    if data_used < range.data_end {
        let expected = if run.cur_kind == HduKind::AsciiTable {
            b' '
        } else {
            0
        };
        let mut fill = vec![0_u8; (range.data_end - data_used) as usize];
        rdr.read_bytes(data_used, &mut fill)?;
        if let Some(pos) = fill.iter().position(|&b| b != expected) {
            run.err(
                Code::DataFill,
                &format!(
                    "the data fill area contains a byte 0x{:02x} at offset {}; \
                     all fill must be 0x{expected:02x}.",
                    fill[pos],
                    data_used + pos as u64
                ),
            );
        }
    }
    Ok(())
}

/// Verify DATASUM/CHECKSUM when recorded in the header.
pub(crate) fn verify_checksum(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
) -> Result<(), Error> {
    let report = rdr.verify_checksum()?;
    if report.data_ok == Some(false) {
        run.warn(
            Code::BadChecksum,
            "the DATASUM keyword does not match the computed checksum of the data.",
        );
    } else if report.hdu_ok == Some(false) {
        run.warn(
            Code::BadChecksum,
            "the HDU checksum is incorrect although the data sum matches; \
             the header has been modified after CHECKSUM was recorded.",
        );
    }
    Ok(())
}

/// Validate the table data of the current HDU.
pub(crate) fn verify_data(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    view: &HduView,
) -> Result<(), Error> {
    if view.is_tile_compressed {
        run.info("tile compressed data is present and is not validated.");
        return Ok(());
    }
    let naxis2 = view.naxes.get(1).copied().unwrap_or(0);
    if naxis2 > i32::MAX as i64 {
        run.info(&format!(
            "NAXIS2 = {naxis2} exceeds the 32-bit row limit; data validation skipped."
        ));
        return Ok(());
    }
    let naxis1 = view.naxes.first().copied().unwrap_or(0);
    if naxis1 <= 0 || naxis2 <= 0 {
        return Ok(());
    }

    match run.cur_kind {
        HduKind::BinTable => bintable_data(run, rdr, view, naxis1 as usize, naxis2 as u64),
        HduKind::AsciiTable => asciitable_data(run, rdr, view, naxis1 as usize, naxis2 as u64),
        _ => Ok(()),
    }
}

/* -------------------------------------------------------------------- */
/* Binary tables                                                        */
/* -------------------------------------------------------------------- */

struct BinCol {
    /// 1-based column number.
    num: usize,
    name: String,
    form: BinTform,
    /// Byte offset of the field inside a row.
    offset: usize,
    reported_value: bool,
    reported_maxlen: bool,
    reported_heap: bool,
}

impl BinCol {
    fn label(&self) -> String {
        if self.name.is_empty() {
            format!("column {}", self.num)
        } else {
            format!("column {} ({})", self.num, self.name)
        }
    }
}

fn bintable_data(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    view: &HduView,
    row_len: usize,
    rows: u64,
) -> Result<(), Error> {
    let mut cols = Vec::new();
    let mut offset = 0_usize;
    for (i, form) in view.tform.iter().enumerate() {
        // Column layout is unusable after a TFORM error; the header pass
        // already reported it.
        let form = match form.as_deref().map(|f| rdr.parse_tform(f)) {
            Some(Ok(form)) => form,
            _ => return Ok(()),
        };
        let width = form.field_width() as usize;
        cols.push(BinCol {
            num: i + 1,
            name: view.ttype.get(i).cloned().flatten().unwrap_or_default(),
            form,
            offset,
            reported_value: false,
            reported_maxlen: false,
            reported_heap: false,
        });
        offset += width;
    }
    if offset != row_len {
        // Header pass reported the mismatch; the layout is unreliable.
        return Ok(());
    }

    let range = rdr.hdu_byte_range()?;
    let heap_base = view
        .int_of("THEAP")
        .filter(|&t| t >= 0)
        .map(|t| t as u64)
        .unwrap_or(row_len as u64 * rows);

    let batch = rdr.row_batch_hint(row_len).max(1) as u64;
    let mut buf = vec![0_u8; batch as usize * row_len];
    let mut row = 0_u64;
    while row < rows {
        let n = batch.min(rows - row);
        let chunk = &mut buf[..n as usize * row_len];
        rdr.read_bytes(range.data_start + row * row_len as u64, chunk)?;
        let chunk = &*chunk;
        for r in 0..n {
            let bytes = &chunk[r as usize * row_len..][..row_len];
            let row_num = row + r + 1;
            for col in &mut cols {
                check_bin_field(run, rdr, view, &range, heap_base, col, bytes, row_num)?;
            }
        }
        row += n;
    }
    Ok(())
}

fn check_bin_field(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    view: &HduView,
    range: &crate::reader::HduByteRange,
    heap_base: u64,
    col: &mut BinCol,
    row_bytes: &[u8],
    row: u64,
) -> Result<(), Error> {
    let field = &row_bytes[col.offset..col.offset + col.form.field_width() as usize];

    if col.form.var.is_some() {
        return check_descriptor(run, rdr, view, range, heap_base, col, field, row);
    }

    match col.form.ty {
        TformType::Bit => {
            let used = (col.form.repeat % 8) as u32;
            if used != 0 && !col.reported_value {
                let last = field[field.len() - 1];
                let fill_mask = (1_u8 << (8 - used)) - 1;
                if last & fill_mask != 0 {
                    col.reported_value = true;
                    run.err(
                        Code::BitNotJustified,
                        &format!(
                            "{}: the bit array fill bits are not zero at row {row}; \
                             other rows may have errors.",
                            col.label()
                        ),
                    );
                }
            }
        }
        TformType::Logical => {
            if !col.reported_value {
                if let Some(bad) = bad_logical(field) {
                    col.reported_value = true;
                    run.err(
                        Code::BadLogicalData,
                        &format!(
                            "{}: illegal logical value 0x{bad:02x} at row {row} \
                             (must be 'T', 'F' or 0); other rows may have errors.",
                            col.label()
                        ),
                    );
                }
            }
        }
        TformType::Char => {
            if !col.reported_value {
                if let Some(bad) = bad_ascii(field) {
                    col.reported_value = true;
                    run.err(
                        Code::NonasciiData,
                        &format!(
                            "{}: non-ASCII byte 0x{bad:02x} at row {row}; \
                             other rows may have errors.",
                            col.label()
                        ),
                    );
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn check_descriptor(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    view: &HduView,
    range: &crate::reader::HduByteRange,
    heap_base: u64,
    col: &mut BinCol,
    field: &[u8],
    row: u64,
) -> Result<(), Error> {
    let wide = col.form.var == Some(true);
    // Descriptors may repeat; in practice the repeat count is 0 or 1.
    for d in 0..col.form.repeat as usize {
        let (length, offset) = if wide {
            let at = d * 16;
            (
                BigEndian::read_u64(&field[at..at + 8]),
                BigEndian::read_u64(&field[at + 8..at + 16]),
            )
        } else {
            let at = d * 8;
            (
                BigEndian::read_u32(&field[at..at + 4]) as u64,
                BigEndian::read_u32(&field[at + 4..at + 8]) as u64,
            )
        };

        if !wide
            && !run.warned_var32
            && (length > i32::MAX as u64 || offset > i32::MAX as u64)
        {
            run.warned_var32 = true;
            run.warn(
                Code::VarExceeds32bit,
                &format!(
                    "{}: a descriptor value exceeds 2^31-1 while using the 32-bit \
                     P format.",
                    col.label()
                ),
            );
        }

        if let Some(max) = col.form.max_len {
            if length > max && !col.reported_maxlen {
                col.reported_maxlen = true;
                let code = if wide { 'Q' } else { 'P' };
                let replacement =
                    format!("1{code}{}({length})", col.form.ty.code());
                run.hint.column = Some(col.num);
                run.hint.fix_override = Some(format!(
                    "change TFORM{} to {replacement} (or larger)",
                    col.num
                ));
                run.err(
                    Code::VarExceedsMaxlen,
                    &format!(
                        "{}: the descriptor at row {row} has length {length}, larger \
                         than the maximum {max} declared by TFORM{} = '{}'.",
                        col.label(),
                        col.num,
                        view.tform[col.num - 1].as_deref().unwrap_or("")
                    ),
                );
            }
        }

        let elem = col.form.ty.element_size();
        let end = offset.saturating_add(length.saturating_mul(elem));
        if end > view.pcount.max(0) as u64 {
            if !col.reported_heap {
                col.reported_heap = true;
                run.err(
                    Code::VarExceedsHeap,
                    &format!(
                        "{}: the descriptor at row {row} addresses bytes {offset}..{end} \
                         beyond the heap size PCOUNT = {}.",
                        col.label(),
                        view.pcount
                    ),
                );
            }
            continue;
        }

        if length > 0 && !col.reported_value {
            check_heap_elements(run, rdr, range, heap_base, col, length, offset, row)?;
        }
    }
    Ok(())
}

/// Variable-length logical, character and bit arrays get the same value
/// checks as their fixed counterparts.
#[allow(clippy::too_many_arguments)]
fn check_heap_elements(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    range: &crate::reader::HduByteRange,
    heap_base: u64,
    col: &mut BinCol,
    length: u64,
    offset: u64,
    row: u64,
) -> Result<(), Error> {
    let start = range.data_start + heap_base + offset;
    match col.form.ty {
        TformType::Logical => {
            let mut elems = vec![0_u8; length as usize];
            rdr.read_bytes(start, &mut elems)?;
            if let Some(bad) = bad_logical(&elems) {
                col.reported_value = true;
                run.err(
                    Code::BadLogicalData,
                    &format!(
                        "{}: illegal logical value 0x{bad:02x} in the variable-length \
                         array at row {row}; other rows may have errors.",
                        col.label()
                    ),
                );
            }
        }
        TformType::Char => {
            let mut elems = vec![0_u8; length as usize];
            rdr.read_bytes(start, &mut elems)?;
            if let Some(bad) = bad_ascii(&elems) {
                col.reported_value = true;
                run.err(
                    Code::NonasciiData,
                    &format!(
                        "{}: non-ASCII byte 0x{bad:02x} in the variable-length array \
                         at row {row}; other rows may have errors.",
                        col.label()
                    ),
                );
            }
        }
        TformType::Bit => {
            let used = (length % 8) as u32;
            if used != 0 {
                let nbytes = length.div_ceil(8);
                let mut last = [0_u8; 1];
                rdr.read_bytes(start + nbytes - 1, &mut last)?;
                let fill_mask = (1_u8 << (8 - used)) - 1;
                if last[0] & fill_mask != 0 {
                    col.reported_value = true;
                    run.err(
                        Code::BitNotJustified,
                        &format!(
                            "{}: the variable-length bit array fill bits are not zero \
                             at row {row}; other rows may have errors.",
                            col.label()
                        ),
                    );
                }
            }
        }
        _ => {}
    }
    Ok(())
}

fn bad_logical(bytes: &[u8]) -> Option<u8> {
    bytes
        .iter()
        .find(|&&b| b != b'T' && b != b'F' && b != 0)
        .copied()
}

fn bad_ascii(bytes: &[u8]) -> Option<u8> {
    bytes
        .iter()
        .find(|&&b| b != 0 && !(32..=126).contains(&b))
        .copied()
}

/* -------------------------------------------------------------------- */
/* ASCII tables                                                         */
/* -------------------------------------------------------------------- */

struct AsciiCol {
    num: usize,
    start: usize,
    width: usize,
    is_float: bool,
    null: Option<String>,
    reported_decimal: bool,
    reported_space: bool,
}

fn asciitable_data(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    view: &HduView,
    row_len: usize,
    rows: u64,
) -> Result<(), Error> {
    let mut cols = Vec::new();
    let mut coverage = vec![false; row_len];
    for (i, form) in view.tform.iter().enumerate() {
        let form = match form.as_deref().map(tform::parse_ascii) {
            Some(Ok(form)) => form,
            _ => return Ok(()),
        };
        let tbcol = match view.int_of(&format!("TBCOL{}", i + 1)) {
            Some(t) if t >= 1 => t as usize,
            _ => return Ok(()),
        };
        let start = tbcol - 1;
        let width = form.width as usize;
        if start + width > row_len {
            // Header pass reported the overrun.
            return Ok(());
        }
        for c in coverage.iter_mut().skip(start).take(width) {
            *c = true;
        }
        cols.push(AsciiCol {
            num: i + 1,
            start,
            width,
            is_float: form.is_float(),
            null: view.str_of(&format!("TNULL{}", i + 1)).map(str::to_owned),
            reported_decimal: false,
            reported_space: false,
        });
    }

    let range = rdr.hdu_byte_range()?;
    let mut reported_nonascii = false;
    let mut reported_gap = false;

    let batch = rdr.row_batch_hint(row_len).max(1) as u64;
    let mut buf = vec![0_u8; batch as usize * row_len];
    let mut row = 0_u64;
    while row < rows {
        let n = batch.min(rows - row);
        let chunk = &mut buf[..n as usize * row_len];
        rdr.read_bytes(range.data_start + row * row_len as u64, chunk)?;
        for r in 0..n {
            let bytes = &chunk[r as usize * row_len..][..row_len];
            let row_num = row + r + 1;

            for (i, &b) in bytes.iter().enumerate() {
                if b > 127 && !reported_nonascii {
                    reported_nonascii = true;
                    run.err(
                        Code::NonasciiTable,
                        &format!(
                            "non-ASCII byte 0x{b:02x} at row {row_num} column {}; \
                             other rows may have errors.",
                            i + 1
                        ),
                    );
                } else if !coverage[i] && !(32..=126).contains(&b) && !reported_gap {
                    reported_gap = true;
                    run.err(
                        Code::AsciiGap,
                        &format!(
                            "non-printable byte 0x{b:02x} in the gap between fields \
                             at row {row_num} column {}; other rows may have errors.",
                            i + 1
                        ),
                    );
                }
            }

            for col in &mut cols {
                if col.is_float {
                    check_ascii_float(run, col, bytes, row_num);
                }
            }
        }
        row += n;
    }
    Ok(())
}

fn check_ascii_float(run: &mut Run, col: &mut AsciiCol, row_bytes: &[u8], row: u64) {
    let field: String = row_bytes[col.start..col.start + col.width]
        .iter()
        .map(|&b| b as char)
        .collect();
    let text = field.trim();
    if text.is_empty() {
        return;
    }
    if let Some(null) = &col.null {
        if text == null.trim() {
            return;
        }
    }
    if !text.contains('.') && !col.reported_decimal {
        col.reported_decimal = true;
        run.err(
            Code::NoDecimal,
            &format!(
                "column {}: the field '{text}' at row {row} has no decimal point; \
                 other rows may have errors.",
                col.num
            ),
        );
    }
    if text.contains(' ') && !col.reported_space {
        col.reported_space = true;
        run.err(
            Code::EmbeddedSpace,
            &format!(
                "column {}: the field '{text}' at row {row} contains an embedded \
                 space; other rows may have errors.",
                col.num
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{bad_ascii, bad_logical};

    #[test]
    fn test_bad_logical() {
        assert_eq!(bad_logical(b"TFT\0"), None);
        assert_eq!(bad_logical(b"TYF"), Some(b'Y'));
    }

    #[test]
    fn test_bad_ascii() {
        assert_eq!(bad_ascii(b"hello \0"), None);
        assert_eq!(bad_ascii(&[b'a', 7, b'b']), Some(7));
    }
}
