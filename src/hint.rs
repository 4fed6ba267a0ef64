//! Fix-hint and explanation generation.
//!
//! Two layers: a static per-code table giving the canonical short fix and
//! an explanation citing the FITS Standard section, and a contextual
//! overlay that rewrites both when the emitting call site annotated the
//! state with a keyword name or column number. A call site may also
//! pre-fill either text (e.g. the variable-length check computes the exact
//! replacement TFORM); the overlay never overwrites those.

use crate::code::Code;
use crate::state::{HduKind, HintCtx};

/// Purpose and FITS Standard section for the keywords the contextual
/// overlay knows about. Indexed keywords are listed by their root.
const KEYWORD_INFO: &[(&str, &str, &str)] = &[
    ("SIMPLE", "marks the file as conforming to the standard", "4.4.1.1"),
    ("BITPIX", "gives the data type of the array elements", "4.4.1.1"),
    ("NAXIS", "gives the number of data axes", "4.4.1.1"),
    ("NAXIS1", "gives the length of a data axis", "4.4.1.1"),
    ("NAXIS2", "gives the length of a data axis", "4.4.1.1"),
    ("EXTEND", "announces that extensions may follow", "4.4.1.2"),
    ("XTENSION", "identifies the extension type", "4.4.1.2"),
    ("PCOUNT", "gives the parameter count (heap size for bintables)", "4.4.1.2"),
    ("GCOUNT", "gives the group count, 1 except for random groups", "4.4.1.2"),
    ("END", "closes the header", "4.4.1.1"),
    ("TFIELDS", "gives the number of table columns", "7.2.1"),
    ("TTYPE", "names a table column", "7.3.2"),
    ("TFORM", "declares the data format of a table column", "7.2.1"),
    ("TUNIT", "gives the physical unit of a table column", "7.3.2"),
    ("TBCOL", "gives the starting column of an ASCII-table field", "7.2.1"),
    ("TSCAL", "scales raw column values to physical values", "7.3.2"),
    ("TZERO", "offsets raw column values to physical values", "7.3.2"),
    ("TNULL", "declares the null value of an integer column", "7.3.2"),
    ("TDISP", "suggests a display format for a column", "7.3.2"),
    ("TDIM", "declares the dimensions of a binary-table cell", "7.3.2"),
    ("THEAP", "gives the byte offset of the variable-length heap", "7.3.2"),
    ("EXTNAME", "names the HDU", "4.4.2.1"),
    ("EXTVER", "distinguishes HDUs with the same EXTNAME", "4.4.2.1"),
    ("EXTLEVEL", "gives the hierarchical level of the HDU", "4.4.2.1"),
    ("BSCALE", "scales raw array values to physical values", "4.4.2.5"),
    ("BZERO", "offsets raw array values to physical values", "4.4.2.5"),
    ("BUNIT", "gives the physical unit of the array values", "4.4.2.5"),
    ("BLANK", "declares the null value of an integer array", "4.4.2.5"),
    ("DATAMAX", "gives the maximum data value", "4.4.2.5"),
    ("DATAMIN", "gives the minimum data value", "4.4.2.5"),
    ("CHECKSUM", "makes the 32-bit 1's complement sum of the HDU zero", "4.4.2.7"),
    ("DATASUM", "records the 32-bit 1's complement sum of the data", "4.4.2.7"),
    ("WCSAXES", "gives the dimensionality of the WCS description", "8.2"),
];

fn keyword_info(name: &str) -> Option<(&'static str, &'static str)> {
    let root = name.trim_end_matches(|c: char| c.is_ascii_digit());
    KEYWORD_INFO
        .iter()
        .find(|(kw, _, _)| *kw == name || *kw == root)
        .map(|(_, purpose, section)| (*purpose, *section))
}

/// Ordered mandatory-keyword list for an HDU type, used by the overlay.
fn mandatory_list(kind: HduKind) -> &'static str {
    match kind {
        HduKind::Primary => "SIMPLE, BITPIX, NAXIS, NAXISn, END",
        HduKind::Image => "XTENSION, BITPIX, NAXIS, NAXISn, PCOUNT, GCOUNT, END",
        HduKind::AsciiTable => {
            "XTENSION, BITPIX, NAXIS, NAXIS1, NAXIS2, PCOUNT, GCOUNT, TFIELDS, \
             TBCOLn, TFORMn, END"
        }
        HduKind::BinTable => {
            "XTENSION, BITPIX, NAXIS, NAXIS1, NAXIS2, PCOUNT, GCOUNT, TFIELDS, TFORMn, END"
        }
        HduKind::Unknown => "XTENSION, BITPIX, NAXIS, NAXISn, PCOUNT, GCOUNT, END",
    }
}

/// Static fix hint and explanation for a code.
fn static_texts(code: Code) -> (&'static str, &'static str) {
    match code {
        Code::EndMissing => (
            "append an END card and pad the header to a multiple of 2880 bytes",
            "every header ends with the END keyword (FITS Standard 4.4.1.1)",
        ),
        Code::ExtraHdus => (
            "remove the data following the last declared HDU",
            "a FITS file is exactly a sequence of HDUs (FITS Standard 3.1)",
        ),
        Code::ExtraBytes => (
            "truncate the file at the end of the last HDU",
            "no bytes may follow the last HDU (FITS Standard 3.1)",
        ),
        Code::HeaderFill => (
            "fill the header block after END with ASCII spaces",
            "header fill bytes must be spaces (FITS Standard 3.3.1)",
        ),
        Code::DataFill => (
            "fill the last data block with zeros (spaces for ASCII tables)",
            "data fill bytes must be zero, or spaces in ASCII tables (FITS Standard 3.3.2)",
        ),
        Code::UnknownXtension => (
            "use one of IMAGE, TABLE or BINTABLE",
            "XTENSION names a registered extension type (FITS Standard 4.4.1.2)",
        ),
        Code::MissingKeyword => (
            "insert the missing mandatory keyword",
            "each HDU type requires a fixed set of keywords (FITS Standard 4.4.1)",
        ),
        Code::KeywordOrder => (
            "move the keyword to its mandatory position",
            "mandatory keywords must appear in order (FITS Standard 4.4.1)",
        ),
        Code::KeywordDuplicate => (
            "delete the duplicate card",
            "a mandatory keyword must appear exactly once (FITS Standard 4.4.1)",
        ),
        Code::KeywordValue => (
            "replace the value with one the standard allows",
            "the keyword's value range is fixed by the standard (FITS Standard 4.4.1)",
        ),
        Code::KeywordType => (
            "rewrite the value in the required type",
            "mandatory keywords carry values of a fixed type (FITS Standard 4.4.1)",
        ),
        Code::NotFixedFormat => (
            "rewrite the card in fixed format",
            "mandatory keywords must use fixed format (FITS Standard 4.2)",
        ),
        Code::CardTooLong => (
            "shorten the card to 80 characters",
            "a header card is exactly 80 characters (FITS Standard 4.1.2)",
        ),
        Code::IllegalNameChar => (
            "use only uppercase letters, digits, '-' and '_' in keyword names",
            "the keyword-name character set is restricted (FITS Standard 4.1.2.1)",
        ),
        Code::NameNotJustified => (
            "left-justify the keyword name in columns 1-8",
            "keyword names start in column 1 (FITS Standard 4.1.2.1)",
        ),
        Code::NontextChars => (
            "remove the non-printable characters",
            "commentary text is restricted to printable ASCII (FITS Standard 4.1.2.3)",
        ),
        Code::EndNotBlank => (
            "blank columns 9-80 of the END card",
            "END is followed only by blanks (FITS Standard 4.4.1.1)",
        ),
        Code::NoValueSeparator => (
            "put a '/' before the comment",
            "a comment on a value card starts with '/' (FITS Standard 4.1.2.3)",
        ),
        Code::UnclosedString => (
            "close the string with a quote",
            "character strings are enclosed in single quotes (FITS Standard 4.2.1)",
        ),
        Code::BadLogicalValue => (
            "use T or F",
            "logical values are the single characters T or F (FITS Standard 4.2.2)",
        ),
        Code::BadNumberValue => (
            "rewrite the value as a valid FITS number",
            "number formats are fixed by the standard (FITS Standard 4.2.3, 4.2.4)",
        ),
        Code::BadComplexValue => (
            "write complex values as (real, imaginary)",
            "complex values are parenthesized pairs (FITS Standard 4.2.5, 4.2.6)",
        ),
        Code::LowercaseExponent => (
            "use an uppercase E or D exponent",
            "exponent letters are uppercase (FITS Standard 4.2.4)",
        ),
        Code::WrongType => (
            "rewrite the value in the type this keyword requires",
            "reserved keywords carry values of a fixed type (FITS Standard 4.3)",
        ),
        Code::NullValue => (
            "give the keyword a value or delete the card",
            "a value card with blanks after '= ' has an undefined value (FITS Standard 4.1.2.3)",
        ),
        Code::BadTdisp => (
            "use a valid display format such as I8, F10.2 or E12.5",
            "TDISPn formats are enumerated by the standard (FITS Standard 7.3.4)",
        ),
        Code::XtensionInPrimary => (
            "remove XTENSION from the primary header",
            "XTENSION announces an extension, never the primary (FITS Standard 4.4.1.2)",
        ),
        Code::PrimaryKeyInExt => (
            "remove the primary-only keyword from the extension",
            "SIMPLE, EXTEND and BLOCKED belong to the primary header (FITS Standard 4.4.1)",
        ),
        Code::ImageKeyInTable => (
            "remove the image keyword from the table header",
            "array keywords are undefined in tables (FITS Standard 4.4.2.5)",
        ),
        Code::TableKeyInImage => (
            "remove the table keyword from the image header",
            "column keywords are undefined in images (FITS Standard 7.2, 7.3)",
        ),
        Code::TableWcsInImage => (
            "use the image form of the WCS keywords",
            "TC*-form WCS keywords describe table columns (FITS Standard 8.2)",
        ),
        Code::BadTform => (
            "use a valid TFORM such as 1E, 20A or 1PE(100)",
            "column formats are enumerated by the standard (FITS Standard 7.2.1, 7.3.1)",
        ),
        Code::IndexExceedsTfields => (
            "renumber the keyword or raise TFIELDS",
            "indexed column keywords run from 1 to TFIELDS (FITS Standard 7.2.1)",
        ),
        Code::TscalWrongType => (
            "remove the scaling keyword from this column",
            "TSCALn/TZEROn are undefined for string, logical and bit columns \
             (FITS Standard 7.3.2)",
        ),
        Code::TnullWrongType => (
            "remove TNULLn; floating columns use NaN for nulls",
            "TNULLn applies to integer columns only (FITS Standard 7.3.2)",
        ),
        Code::BlankWrongType => (
            "remove BLANK; floating arrays use NaN for nulls",
            "BLANK applies to integer arrays only (FITS Standard 4.4.2.5)",
        ),
        Code::TdimInAscii => (
            "remove TDIMn from the ASCII-table header",
            "TDIMn is defined for binary tables only (FITS Standard 7.3.2)",
        ),
        Code::TbcolInBinary => (
            "remove TBCOLn from the binary-table header",
            "TBCOLn is defined for ASCII tables only (FITS Standard 7.2.1)",
        ),
        Code::TheapNoPcount => (
            "remove THEAP or declare a heap with PCOUNT > 0",
            "THEAP points into the heap declared by PCOUNT (FITS Standard 7.3.2)",
        ),
        Code::BadTbcol => (
            "point TBCOLn inside the table row",
            "TBCOLn must lie within NAXIS1 (FITS Standard 7.2.1)",
        ),
        Code::RowWidthMismatch => (
            "make NAXIS1 equal to the total width of the declared columns",
            "the column formats determine the row length (FITS Standard 7.3.1)",
        ),
        Code::BitNotJustified => (
            "zero the unused bits of the last byte of the bit array",
            "bit arrays are left-justified and zero-padded (FITS Standard 7.3.3.2)",
        ),
        Code::BadLogicalData => (
            "store T (0x54), F (0x46) or 0 in logical columns",
            "logical column values are restricted (FITS Standard 7.3.3.1)",
        ),
        Code::NonasciiData => (
            "restrict character columns to printable ASCII",
            "character columns hold ASCII text (FITS Standard 7.3.3.1)",
        ),
        Code::NoDecimal => (
            "write a decimal point in every floating field",
            "ASCII-table floating fields contain a decimal point (FITS Standard 7.2.4)",
        ),
        Code::EmbeddedSpace => (
            "remove the embedded spaces from the numeric field",
            "ASCII-table numeric fields contain no embedded blanks (FITS Standard 7.2.4)",
        ),
        Code::VarExceedsMaxlen => (
            "raise the declared maximum element count of the column",
            "the TFORM (e) value bounds descriptor lengths (FITS Standard 7.3.5)",
        ),
        Code::VarExceedsHeap => (
            "keep descriptors inside the heap declared by PCOUNT",
            "descriptors address the heap area only (FITS Standard 7.3.5)",
        ),
        Code::NonasciiTable => (
            "restrict ASCII-table bytes to ASCII characters",
            "ASCII-table rows hold ASCII text (FITS Standard 7.2.3)",
        ),
        Code::AsciiGap => (
            "fill bytes between ASCII-table fields with printable characters",
            "gap bytes in ASCII tables are printable (FITS Standard 7.2.3)",
        ),
        Code::WcsaxesOrder => (
            "move WCSAXES before every other WCS keyword",
            "WCSAXES precedes the WCS keywords it scopes (FITS Standard 8.2)",
        ),
        Code::WcsIndex => (
            "renumber the WCS keyword within the axis count",
            "WCS axis numbers run from 1 to WCSAXES (or NAXIS) (FITS Standard 8.2)",
        ),
        Code::Reader => (
            "verify that the file is a readable FITS stream",
            "the underlying reader could not deliver the requested bytes",
        ),
        Code::Internal => (
            "report this as a verifier defect",
            "an internal invariant of the verifier was violated",
        ),
        Code::TooManyErrors => (
            "fix the reported errors and run the verification again",
            "verification stops after the per-file error cap",
        ),
        Code::Deprecated => (
            "remove the deprecated keyword",
            "EPOCH and BLOCKED are deprecated (FITS Standard appendix H)",
        ),
        Code::ZeroScale => (
            "use a non-zero scale factor",
            "a zero BSCALE/TSCALn makes all values indistinguishable (FITS Standard 4.4.2.5)",
        ),
        Code::TnullRange => (
            "choose a null value inside the column data-type range",
            "the null must be representable in the column type (FITS Standard 7.3.2)",
        ),
        Code::RawNotMultiple => (
            "make the repeat count a multiple of the display width",
            "rAw substring conventions require r to be a multiple of w (HEASARC convention)",
        ),
        Code::Y2kDate => (
            "use the yyyy-mm-dd date form",
            "two-digit years are ambiguous; new files use ISO dates (FITS Standard 4.4.2.1)",
        ),
        Code::DuplicateKeyword => (
            "delete one of the duplicate cards",
            "duplicate keywords make the header value ill-defined (FITS Standard 4.1.2.1)",
        ),
        Code::BadChecksum => (
            "recompute CHECKSUM and DATASUM after any edit",
            "the recorded checksums must match the HDU bytes (FITS Standard 4.4.2.7)",
        ),
        Code::MissingLongstrn => (
            "add the LONGSTRN keyword when using long-string continuation",
            "the long-string convention asks for LONGSTRN (HEASARC convention)",
        ),
        Code::RandomGroups => (
            "prefer binary tables to random groups in new files",
            "random groups are deprecated (FITS Standard 6)",
        ),
        Code::LegacyXtension => (
            "use a registered XTENSION value",
            "this extension name is a legacy registration (FITS Standard appendix F)",
        ),
        Code::TimesysValue => (
            "use a recognized time scale such as UTC, TAI or TT",
            "TIMESYS values are enumerated (FITS Standard 9.2.1)",
        ),
        Code::InheritPrimary => (
            "remove INHERIT or empty the primary data array",
            "INHERIT applies when the primary HDU has no data (HEASARC convention)",
        ),
        Code::SimpleFalse => (
            "set SIMPLE = T or fix the non-conforming structure",
            "SIMPLE = F declares the file non-conforming (FITS Standard 4.4.1.1)",
        ),
        Code::DuplicateExtname => (
            "give each HDU a distinct (EXTNAME, EXTVER, EXTLEVEL)",
            "the name triple identifies an HDU uniquely (FITS Standard 4.4.2.1)",
        ),
        Code::VarExceeds32bit => (
            "use the Q descriptor form for heaps beyond 2^31 bytes",
            "P descriptors hold 32-bit values only (FITS Standard 7.3.5)",
        ),
    }
}

/// Produce the (fix, explanation) pair for a diagnostic.
pub(crate) fn generate(
    code: Code,
    ctx: &HintCtx,
    hdu: usize,
    kind: HduKind,
) -> (String, String) {
    let (static_fix, static_why) = static_texts(code);

    let fix = match &ctx.fix_override {
        Some(text) => text.clone(),
        None => contextual_fix(code, ctx, hdu, kind).unwrap_or_else(|| static_fix.to_owned()),
    };
    let why = match &ctx.explain_override {
        Some(text) => text.clone(),
        None => contextual_why(code, ctx).unwrap_or_else(|| static_why.to_owned()),
    };
    (fix, why)
}

fn contextual_fix(code: Code, ctx: &HintCtx, hdu: usize, kind: HduKind) -> Option<String> {
    match code {
        Code::MissingKeyword | Code::KeywordOrder => {
            let kw = ctx.keyword.as_deref()?;
            Some(format!(
                "write {kw} at its mandatory position in HDU {hdu} ({kind}); \
                 the required order is: {}",
                mandatory_list(kind)
            ))
        }
        Code::KeywordValue | Code::KeywordType | Code::NotFixedFormat | Code::WrongType => {
            let kw = ctx.keyword.as_deref()?;
            match keyword_info(kw) {
                Some((purpose, _)) => Some(format!(
                    "correct the value of {kw} in HDU {hdu}; {kw} {purpose}"
                )),
                None => Some(format!("correct the value of {kw} in HDU {hdu}")),
            }
        }
        Code::IndexExceedsTfields => {
            let kw = ctx.keyword.as_deref()?;
            Some(format!(
                "renumber {kw} in HDU {hdu} to at most TFIELDS, or raise TFIELDS"
            ))
        }
        Code::TscalWrongType | Code::TnullWrongType | Code::BadTform | Code::BadTdisp => {
            let col = ctx.column?;
            let kw = ctx.keyword.as_deref().unwrap_or("the keyword");
            Some(format!("correct {kw} of column {col} in HDU {hdu}"))
        }
        _ => None,
    }
}

fn contextual_why(code: Code, ctx: &HintCtx) -> Option<String> {
    match code {
        Code::MissingKeyword
        | Code::KeywordOrder
        | Code::KeywordValue
        | Code::KeywordType
        | Code::NotFixedFormat
        | Code::WrongType => {
            let kw = ctx.keyword.as_deref()?;
            let (purpose, section) = keyword_info(kw)?;
            Some(format!("{kw} {purpose} (FITS Standard {section})"))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::HintCtx;

    #[test]
    fn test_static_fallback() {
        let ctx = HintCtx::default();
        let (fix, why) = generate(Code::DataFill, &ctx, 2, HduKind::BinTable);
        assert!(fix.contains("fill"));
        assert!(why.contains("FITS Standard"));
    }

    #[test]
    fn test_contextual_names_keyword_and_hdu() {
        let ctx = HintCtx {
            keyword: Some("BITPIX".into()),
            ..Default::default()
        };
        let (fix, why) = generate(Code::KeywordValue, &ctx, 1, HduKind::Primary);
        assert!(fix.contains("BITPIX"));
        assert!(fix.contains("HDU 1"));
        assert!(why.contains("4.4.1.1"));
    }

    #[test]
    fn test_override_wins() {
        let ctx = HintCtx {
            keyword: Some("TFORM3".into()),
            column: Some(3),
            fix_override: Some("change TFORM3 to 1PE(12)".into()),
            ..Default::default()
        };
        let (fix, _) = generate(Code::VarExceedsMaxlen, &ctx, 2, HduKind::BinTable);
        assert_eq!(fix, "change TFORM3 to 1PE(12)");
    }

    #[test]
    fn test_mandatory_list_in_missing_hint() {
        let ctx = HintCtx {
            keyword: Some("PCOUNT".into()),
            ..Default::default()
        };
        let (fix, _) = generate(Code::MissingKeyword, &ctx, 3, HduKind::BinTable);
        assert!(fix.contains("TFIELDS, TFORMn, END"));
    }
}
