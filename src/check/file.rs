//! Cross-HDU checks run after the per-HDU loop.

use crate::code::Code;
use crate::diag::Severity;
use crate::error::Error;
use crate::reader::{FitsReader, StreamPosition};
use crate::state::Run;

pub(crate) fn verify_file_level(run: &mut Run, rdr: &mut dyn FitsReader, num_hdus: usize) {
    if num_hdus > 0 && !run.aborted {
        end_of_stream(run, rdr, num_hdus);
    }
    duplicate_extnames(run);
}

/// Probe past the last HDU: advancing must fail cleanly, and the byte
/// right after the last data unit must not exist.
fn end_of_stream(run: &mut Run, rdr: &mut dyn FitsReader, num_hdus: usize) {
    if rdr.move_to_hdu(num_hdus).is_err() {
        run.reader_err_with_stack(
            rdr,
            Code::Reader,
            "cannot reposition on the last HDU",
            Severity::Error,
        );
        return;
    }

    match rdr.move_relative(1) {
        Ok(_) => {
            run.err(
                Code::ExtraHdus,
                &format!("the stream continues with an HDU after HDU {num_hdus}."),
            );
            // Reposition for the byte probe below.
            let _ = rdr.move_to_hdu(num_hdus);
        }
        Err(Error::BadHduIndex(..)) => {}
        Err(_) => {
            run.reader_err_with_stack(
                rdr,
                Code::Reader,
                "the stream does not end cleanly after the last HDU",
                Severity::Error,
            );
        }
    }

    let range = match rdr.hdu_byte_range() {
        Ok(range) => range,
        Err(_) => return,
    };
    match rdr.position_at_byte(range.data_end) {
        Ok(StreamPosition::Within) => {
            run.err(
                Code::ExtraBytes,
                &format!(
                    "extra bytes follow the last HDU at offset {}.",
                    range.data_end
                ),
            );
        }
        Ok(StreamPosition::AtEnd | StreamPosition::PastEnd) => {}
        Err(_) => {
            run.reader_err(
                rdr,
                Code::Reader,
                "cannot probe the end of the stream",
                Severity::Error,
            );
        }
    }
}

/// Every ordered pair of HDUs sharing a non-empty EXTNAME, the same type
/// and the same EXTVER is a duplicate. N is small; O(N^2) is fine.
fn duplicate_extnames(run: &mut Run) {
    let mut pairs = Vec::new();
    for i in 0..run.directory.len() {
        for j in (i + 1)..run.directory.len() {
            let (a, b) = (&run.directory[i], &run.directory[j]);
            if !a.extname.is_empty()
                && a.extname == b.extname
                && a.kind == b.kind
                && a.extver == b.extver
            {
                pairs.push((a.index, b.index, a.extname.clone(), a.extver));
            }
        }
    }
    for (first, second, extname, extver) in pairs {
        run.cur_hdu = second;
        run.warn(
            Code::DuplicateExtname,
            &format!(
                "HDU {second} duplicates the EXTNAME = '{extname}' and EXTVER = {extver} \
                 of HDU {first}."
            ),
        );
    }
    run.cur_hdu = 0;
}
