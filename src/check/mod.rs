//! The verification driver: walks the stream HDU by HDU and hands each one
//! to the header and data validators, then runs the file-level checks.

mod data;
mod file;
mod header;
mod keyword;

use crate::code::Code;
use crate::diag::Severity;
use crate::error::Error;
use crate::reader::FitsReader;
use crate::state::{FileResult, HduKind, HduView, Run};

pub(crate) fn drive(run: &mut Run, rdr: &mut dyn FitsReader) -> Result<FileResult, Error> {
    run.info(&format!("File: {}", rdr.source()));

    let num_hdus = match rdr.hdu_count() {
        Ok(n) => n,
        Err(e) => {
            run.reader_err_with_stack(
                rdr,
                Code::Reader,
                "cannot determine the number of HDUs",
                Severity::Severe,
            );
            run.aborted = true;
            return Err(e);
        }
    };
    run.init_directory(num_hdus);

    for hdu_index in 1..=num_hdus {
        if run.aborted {
            break;
        }
        run.cur_hdu = hdu_index;
        run.cur_kind = match rdr.move_to_hdu(hdu_index) {
            Ok(kind) => kind,
            Err(_) => {
                run.reader_err_with_stack(
                    rdr,
                    Code::Reader,
                    &format!("cannot move to HDU {hdu_index}"),
                    Severity::Severe,
                );
                break;
            }
        };
        run.info(&format!("=== HDU {hdu_index}: {} ===", run.cur_kind));

        // The view lives for exactly one HDU; everything it caches is
        // released below no matter what the validators reported.
        let mut view = HduView::default();
        verify_one_hdu(run, rdr, &mut view);

        if run.opts.print_summary {
            run.info(&format!(
                "HDU {hdu_index}: {}, {} errors, {} warnings",
                run.cur_kind, run.hdu_errors, run.hdu_warnings
            ));
        }
        run.snapshot_hdu_counts();
        drop(view);
    }

    run.cur_hdu = 0;
    run.cur_kind = HduKind::Unknown;
    file::verify_file_level(run, rdr, num_hdus);

    if run.opts.print_summary {
        run.info(&format!(
            "**** Verification found {} warning(s) and {} error(s). ****",
            run.file_warnings, run.file_errors
        ));
    }
    Ok(run.result(num_hdus))
}

/// All per-HDU validation; reader failures inside one HDU are reported and
/// the loop moves on, so the user still gets findings from the other HDUs.
fn verify_one_hdu(run: &mut Run, rdr: &mut dyn FitsReader, view: &mut HduView) {
    if header::verify_header(run, rdr, view).is_err() {
        run.reader_err_with_stack(
            rdr,
            Code::Reader,
            &format!("failure while reading the header of HDU {}", run.cur_hdu),
            Severity::Error,
        );
        return;
    }
    if run.aborted {
        return;
    }
    if run.opts.test_fill {
        if data::verify_fill(run, rdr, view).is_err() {
            run.reader_err_with_stack(
                rdr,
                Code::Reader,
                &format!("failure while checking the fill of HDU {}", run.cur_hdu),
                Severity::Error,
            );
        }
    }
    if run.opts.test_checksum {
        if data::verify_checksum(run, rdr).is_err() {
            run.reader_err_with_stack(
                rdr,
                Code::Reader,
                &format!("failure while checking the checksums of HDU {}", run.cur_hdu),
                Severity::Error,
            );
        }
    }
    if run.opts.test_data
        && matches!(run.cur_kind, HduKind::AsciiTable | HduKind::BinTable)
    {
        if data::verify_data(run, rdr, view).is_err() {
            run.reader_err_with_stack(
                rdr,
                Code::Reader,
                &format!("failure while validating the data of HDU {}", run.cur_hdu),
                Severity::Error,
            );
        }
    }
}
