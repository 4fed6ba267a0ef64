//! The diagnostic pipeline.
//!
//! Every finding flows through [`Run::emit`]: severity filtering, the
//! per-file error cap, hint enrichment and sink dispatch all live here.
//! Aborting is passive: once the cap trips, further emissions are no-ops
//! and the driver notices the flag at the next HDU boundary. No validation
//! path unwinds the stack to stop a run.

use std::io::Write;

use serde::Serialize;

use crate::code::Code;
use crate::hint;
use crate::reader::FitsReader;
use crate::state::{Run, MAX_FILE_ERRORS};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Severe,
}

impl Severity {
    /// Rank compared against the report-level floor.
    fn rank(self) -> u8 {
        match self {
            Severity::Info | Severity::Warning => 0,
            Severity::Error => 1,
            Severity::Severe => 2,
        }
    }
}

/// The structured output atom.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Absent on informational chatter.
    pub code: Option<Code>,
    /// 1-based HDU index, 0 for file-level findings.
    pub hdu: usize,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<String>,
}

/// Where delivered diagnostics go.
pub(crate) enum Sink {
    Write(Box<dyn Write>),
    Callback(Box<dyn FnMut(&Diagnostic)>),
}

impl Default for Sink {
    fn default() -> Self {
        Sink::Write(Box::new(std::io::stdout()))
    }
}

/// Tagged diagnostic event. The variant carries its own payload; one
/// `emit` handles all of them.
pub(crate) enum Event {
    Info,
    Warn { heasarc_only: bool },
    Err { severity: Severity },
}

impl<'a> Run<'a> {
    pub fn info(&mut self, text: &str) {
        self.emit(None, text, Event::Info);
    }

    pub fn warn(&mut self, code: Code, text: &str) {
        self.emit(Some(code), text, Event::Warn { heasarc_only: false });
    }

    /// Warning that only applies under the HEASARC conventions.
    pub fn warn_heasarc(&mut self, code: Code, text: &str) {
        self.emit(Some(code), text, Event::Warn { heasarc_only: true });
    }

    pub fn err(&mut self, code: Code, text: &str) {
        self.emit(
            Some(code),
            text,
            Event::Err {
                severity: Severity::Error,
            },
        );
    }

    pub fn severe(&mut self, code: Code, text: &str) {
        self.emit(
            Some(code),
            text,
            Event::Err {
                severity: Severity::Severe,
            },
        );
    }

    /// Reader failure: the reader's pending status becomes part of the text.
    pub fn reader_err(
        &mut self,
        rdr: &mut dyn FitsReader,
        code: Code,
        text: &str,
        severity: Severity,
    ) {
        let mut full = text.to_owned();
        if let Some(status) = rdr.status_message() {
            full.push_str("\n  reader status: ");
            full.push_str(&status);
        }
        rdr.clear_error();
        self.emit(Some(code), &full, Event::Err { severity });
    }

    /// Reader failure including the drained reader error stack. The stack
    /// is drained whether or not the diagnostic survives filtering.
    pub fn reader_err_with_stack(
        &mut self,
        rdr: &mut dyn FitsReader,
        code: Code,
        text: &str,
        severity: Severity,
    ) {
        let mut full = text.to_owned();
        while let Some(line) = rdr.next_stack_message() {
            full.push_str("\n  ");
            full.push_str(&line);
        }
        rdr.clear_error();
        self.emit(Some(code), &full, Event::Err { severity });
    }

    fn emit(&mut self, code: Option<Code>, text: &str, event: Event) {
        if self.aborted {
            self.hint.clear();
            return;
        }

        let floor = self.opts.error_report.floor();
        let severity = match event {
            Event::Info => {
                // Chatter is never counted and only shown in full reports.
                if floor == 0 {
                    self.dispatch(Severity::Info, None, text, false);
                }
                self.hint.clear();
                return;
            }
            Event::Warn { heasarc_only } => {
                let suppressed =
                    floor >= 1 || (heasarc_only && !self.opts.heasarc_conventions);
                if suppressed {
                    self.hint.clear();
                    return;
                }
                self.file_warnings += 1;
                self.hdu_warnings += 1;
                Severity::Warning
            }
            Event::Err { severity } => {
                if severity.rank() < floor {
                    self.hint.clear();
                    return;
                }
                self.file_errors += 1;
                self.hdu_errors += 1;
                severity
            }
        };

        self.dispatch(severity, code, text, true);
        self.hint.clear();

        if severity >= Severity::Error && self.file_errors > MAX_FILE_ERRORS {
            // Terminal diagnostic; everything after this is a no-op.
            self.aborted = true;
            self.file_errors += 1;
            self.hdu_errors += 1;
            self.dispatch(
                Severity::Severe,
                Some(Code::TooManyErrors),
                &format!(
                    "more than {MAX_FILE_ERRORS} errors in this file, giving up"
                ),
                false,
            );
        }
    }

    fn dispatch(&mut self, severity: Severity, code: Option<Code>, text: &str, enrich: bool) {
        let (fix_hint, explain) = if enrich && (self.opts.fix_hints || self.opts.explain) {
            match code {
                Some(code) => {
                    let (fix, why) =
                        hint::generate(code, &self.hint, self.cur_hdu, self.cur_kind);
                    (
                        self.opts.fix_hints.then_some(fix),
                        self.opts.explain.then_some(why),
                    )
                }
                None => (None, None),
            }
        } else {
            (None, None)
        };

        let d = Diagnostic {
            severity,
            code,
            hdu: self.cur_hdu,
            text: text.to_owned(),
            fix_hint,
            explain,
        };

        match self.sink {
            Sink::Callback(cb) => cb(&d),
            Sink::Write(out) => {
                if let Err(e) = print_diagnostic(out, &d, self.wrap_margin) {
                    log::warn!("diagnostic output failed: {e}");
                }
            }
        }
    }
}

const WRAP_COLUMNS: usize = 80;
pub(crate) const DEFAULT_WRAP_MARGIN: usize = 13;
pub(crate) const MAX_WRAP_MARGIN: usize = 70;

fn print_diagnostic(
    out: &mut Box<dyn Write>,
    d: &Diagnostic,
    margin: usize,
) -> std::io::Result<()> {
    let prefix = match d.severity {
        Severity::Info => "",
        Severity::Warning => "*** Warning: ",
        Severity::Error | Severity::Severe => "*** Error:   ",
    };
    let mut lines = d.text.split('\n');
    if let Some(first) = lines.next() {
        write_wrapped(out, prefix, first, margin)?;
    }
    // Continuation lines (card echoes, arrow markers, reader stacks) keep
    // their own alignment.
    for line in lines {
        writeln!(out, "{line}")?;
    }
    if let Some(fix) = &d.fix_hint {
        write_wrapped(out, "    Fix: ", fix, margin)?;
    }
    if let Some(why) = &d.explain {
        write_wrapped(out, "    Note: ", why, margin)?;
    }
    Ok(())
}

/// Wrap `text` to 80 columns. The first line starts with `prefix` (never
/// clipped); continuation lines are indented by `margin` blanks.
fn write_wrapped(
    out: &mut dyn Write,
    prefix: &str,
    text: &str,
    margin: usize,
) -> std::io::Result<()> {
    let margin = margin.min(MAX_WRAP_MARGIN);
    let pad = " ".repeat(margin);
    let mut head = prefix;
    let mut rest = text;
    loop {
        let room = WRAP_COLUMNS.saturating_sub(head.len()).max(1);
        if rest.len() <= room {
            writeln!(out, "{head}{rest}")?;
            return Ok(());
        }
        // Cut on a char boundary, preferring the last space that fits.
        let mut limit = room;
        while !rest.is_char_boundary(limit) {
            limit -= 1;
        }
        let cut = match rest[..limit].rfind(' ') {
            Some(i) if i > 0 => i,
            _ if limit > 0 => limit,
            _ => rest.chars().next().map(char::len_utf8).unwrap_or(rest.len()),
        };
        writeln!(out, "{head}{}", &rest[..cut])?;
        rest = rest[cut..].trim_start();
        head = &pad;
        if rest.is_empty() {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::write_wrapped;

    fn wrapped(prefix: &str, text: &str, margin: usize) -> Vec<String> {
        let mut buf = Vec::new();
        write_wrapped(&mut buf, prefix, text, margin).unwrap();
        String::from_utf8(buf)
            .unwrap()
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn test_short_line_untouched() {
        let lines = wrapped("*** Error:   ", "BITPIX has an illegal value", 13);
        assert_eq!(lines, vec!["*** Error:   BITPIX has an illegal value"]);
    }

    #[test]
    fn test_long_line_wraps_at_80() {
        let text = "word ".repeat(40);
        let lines = wrapped("*** Warning: ", text.trim_end(), 13);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(line.len() <= 80, "line too long: {line:?}");
        }
        assert!(lines[0].starts_with("*** Warning: word"));
        assert!(lines[1].starts_with("             "));
    }

    #[test]
    fn test_prefix_never_clipped() {
        let token = "x".repeat(200);
        let lines = wrapped("*** Error:   ", &token, 13);
        assert!(lines[0].starts_with("*** Error:   "));
    }

    #[test]
    fn test_margin_clamped() {
        let text = "word ".repeat(40);
        let lines = wrapped("", text.trim_end(), 500);
        assert!(lines[1].starts_with(&" ".repeat(70)));
        assert!(!lines[1].starts_with(&" ".repeat(71)));
    }
}
