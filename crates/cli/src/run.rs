use std::cell::RefCell;
use std::error::Error;
use std::fs;
use std::process::ExitCode;
use std::rc::Rc;

use serde::Serialize;

use fitscheck::{Diagnostic, FileResult, Options, ReportLevel, Verifier};

#[derive(clap::Parser, Debug, Clone)]
#[command(
    name = "fitscheck",
    version,
    about = "Verify that FITS files conform to the FITS Standard."
)]
pub struct Args {
    /// Files to verify: paths, wildcards, or @listfile response files
    /// (newline-delimited, blank lines skipped).
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<String>,

    /// Echo each header card while it is validated.
    #[arg(short = 'l', long = "print-header")]
    pub print_header: bool,

    /// Decode ESO HIERARCH long keywords.
    #[arg(short = 'H', long = "hierarch")]
    pub hierarch: bool,

    /// One summary line per file.
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,

    /// Report errors only, suppressing warnings.
    #[arg(short = 'e', long = "errors-only", conflicts_with = "severe_only")]
    pub errors_only: bool,

    /// Report severe errors only.
    #[arg(short = 's', long = "severe-only")]
    pub severe_only: bool,

    /// Emit one JSON report on stdout instead of text.
    #[arg(long = "json")]
    pub json: bool,

    /// Attach a fix hint to each finding.
    #[arg(long = "fix-hints")]
    pub fix_hints: bool,

    /// Attach an explanation citing the FITS Standard.
    #[arg(long = "explain")]
    pub explain: bool,
}

impl Args {
    fn options(&self) -> Options {
        let mut opts = Options::default();
        opts.print_header = self.print_header;
        opts.test_hierarch = self.hierarch;
        opts.fix_hints = self.fix_hints;
        opts.explain = self.explain;
        if self.severe_only {
            opts.error_report = ReportLevel::SevereOnly;
        } else if self.errors_only {
            opts.error_report = ReportLevel::ErrorsOnly;
        }
        if self.quiet || self.json {
            opts.print_summary = false;
        }
        opts
    }
}

#[derive(Serialize)]
struct FileEntry {
    file: String,
    messages: Vec<Diagnostic>,
    num_errors: u64,
    num_warnings: u64,
    num_hdus: usize,
    aborted: bool,
}

#[derive(Serialize)]
struct Report {
    fitscheck_version: &'static str,
    reader_version: String,
    files: Vec<FileEntry>,
    total_errors: u64,
    total_warnings: u64,
}

pub fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    let files = expand_files(&args.files)?;
    let mut verifier = Verifier::with_options(args.options());

    let mut entries = Vec::new();
    for file in files {
        let messages: Rc<RefCell<Vec<Diagnostic>>> = Rc::default();
        if args.json {
            let sink = Rc::clone(&messages);
            verifier.set_output(move |d: &Diagnostic| sink.borrow_mut().push(d.clone()));
        } else if args.quiet {
            verifier.set_output(|_: &Diagnostic| {});
        }

        let result = match verifier.verify_file(&file) {
            Ok(result) => result,
            Err(_) => FileResult {
                num_errors: 1,
                num_warnings: 0,
                num_hdus: 0,
                aborted: true,
            },
        };

        if args.quiet {
            let verdict = if result.num_errors == 0 { "OK" } else { "FAILED" };
            println!(
                "{file}: {} error(s), {} warning(s), verification {verdict}",
                result.num_errors, result.num_warnings
            );
        }
        entries.push(FileEntry {
            file,
            // The sink closure still holds its clone of the buffer.
            messages: messages.borrow().clone(),
            num_errors: result.num_errors,
            num_warnings: result.num_warnings,
            num_hdus: result.num_hdus,
            aborted: result.aborted,
        });
    }

    let (total_errors, total_warnings) = verifier.totals();
    if args.json {
        let report = Report {
            fitscheck_version: fitscheck::pkg_version(),
            reader_version: format!("fitscheck stream reader {}", fitscheck::pkg_version()),
            files: entries,
            total_errors,
            total_warnings,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(ExitCode::from((total_errors + total_warnings).min(255) as u8))
}

/// Expand the positional arguments: `@list` response files and glob
/// patterns. A pattern with no match is kept literally so the open failure
/// is reported against it.
fn expand_files(args: &[String]) -> Result<Vec<String>, Box<dyn Error>> {
    let mut files = Vec::new();
    for arg in args {
        if let Some(list) = arg.strip_prefix('@') {
            let body = fs::read_to_string(list)
                .map_err(|e| format!("cannot read list file {list}: {e}"))?;
            files.extend(
                body.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_owned),
            );
        } else if arg.contains(['*', '?', '[']) {
            let mut matched = false;
            for hit in glob::glob(arg)? {
                files.push(hit?.display().to_string());
                matched = true;
            }
            if !matched {
                files.push(arg.clone());
            }
        } else {
            files.push(arg.clone());
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::expand_files;
    use std::io::Write;

    #[test]
    fn test_listfile_expansion() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        writeln!(list, "a.fits\n\n  b.fits  \n").unwrap();
        let arg = format!("@{}", list.path().display());
        let files = expand_files(&[arg]).unwrap();
        assert_eq!(files, vec!["a.fits", "b.fits"]);
    }

    #[test]
    fn test_unmatched_glob_kept_literal() {
        let files = expand_files(&["no/such/dir/*.fits".to_owned()]).unwrap();
        assert_eq!(files, vec!["no/such/dir/*.fits"]);
    }

    #[test]
    fn test_plain_names_pass_through() {
        let files = expand_files(&["x.fits".to_owned(), "y.fits".to_owned()]).unwrap();
        assert_eq!(files, vec!["x.fits", "y.fits"]);
    }
}
