use serde::Serialize;

/// Minimum severity rank delivered to the sink.
///
/// Warnings rank 0, errors 1, severe errors 2; the report level acts as a
/// floor. Informational chatter is only delivered at [`ReportLevel::All`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReportLevel {
    #[default]
    All,
    ErrorsOnly,
    SevereOnly,
}

impl ReportLevel {
    pub(crate) fn floor(self) -> u8 {
        match self {
            ReportLevel::All => 0,
            ReportLevel::ErrorsOnly => 1,
            ReportLevel::SevereOnly => 2,
        }
    }
}

/// Verification options. The set is snapshotted when a verification starts;
/// changing options on the session never affects a run in progress.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Options {
    /// Echo every header card to the output before validating it.
    pub print_header: bool,
    /// Per-HDU and end-of-file summary lines.
    pub print_summary: bool,
    /// Validate table data (column values, descriptors, heap bounds).
    pub test_data: bool,
    /// Verify CHECKSUM/DATASUM when present.
    pub test_checksum: bool,
    /// Check header and data fill bytes.
    pub test_fill: bool,
    /// Apply the HEASARC convention checks.
    pub heasarc_conventions: bool,
    /// Decode ESO HIERARCH long-keyword cards.
    pub test_hierarch: bool,
    pub error_report: ReportLevel,
    /// Attach a fix hint to every error and warning.
    pub fix_hints: bool,
    /// Attach an explanation citing the FITS Standard section.
    pub explain: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            print_header: false,
            print_summary: true,
            test_data: true,
            test_checksum: true,
            test_fill: true,
            heasarc_conventions: true,
            test_hierarch: false,
            error_report: ReportLevel::All,
            fix_hints: false,
            explain: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Options, ReportLevel};

    #[test]
    fn test_defaults() {
        let o = Options::default();
        assert!(o.print_summary && o.test_data && o.test_checksum && o.test_fill);
        assert!(o.heasarc_conventions);
        assert!(!o.print_header && !o.test_hierarch && !o.fix_hints && !o.explain);
        assert_eq!(o.error_report, ReportLevel::All);
    }

    #[test]
    fn test_options_round_trip() {
        let mut o = Options::default();
        o.fix_hints = true;
        o.error_report = ReportLevel::SevereOnly;
        let copy = o.clone();
        assert_eq!(copy, o);
        assert_eq!(copy.error_report.floor(), 2);
    }
}
