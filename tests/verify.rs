//! End-to-end verification scenarios on synthesized FITS streams.

use std::cell::RefCell;
use std::rc::Rc;

use fitscheck::{
    Code, Diagnostic, Error, FileResult, Options, ReportLevel, Severity, Verifier,
};

const BLOCK: usize = 2880;
const CARD: usize = 80;

/* ------------------------------------------------------------------ */
/* In-memory FITS builder                                             */
/* ------------------------------------------------------------------ */

/// Fixed-format value card: the value right-justified so it ends at
/// column 30.
fn kw(name: &str, value: &str) -> String {
    format!("{name:<8}= {value:>20}")
}

/// Fixed-format string card: opening quote at column 11, closing quote at
/// or after column 20.
fn kw_str(name: &str, value: &str) -> String {
    format!("{name:<8}= '{value:<8}'")
}

fn pad_card(text: &str) -> Vec<u8> {
    let mut raw = text.as_bytes().to_vec();
    assert!(raw.len() <= CARD, "card literal too long: {text}");
    raw.resize(CARD, b' ');
    raw
}

/// One complete HDU: cards + END, header padded with spaces, data padded
/// with `fill` to the block boundary.
fn hdu(cards: &[String], data: &[u8], fill: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    for card in cards {
        bytes.extend_from_slice(&pad_card(card));
    }
    bytes.extend_from_slice(&pad_card("END"));
    let header_len = bytes.len().div_ceil(BLOCK) * BLOCK;
    bytes.resize(header_len, b' ');
    bytes.extend_from_slice(data);
    let total = bytes.len().div_ceil(BLOCK) * BLOCK;
    bytes.resize(total, fill);
    bytes
}

fn minimal_image_cards() -> Vec<String> {
    vec![
        kw("SIMPLE", "T"),
        kw("BITPIX", "16"),
        kw("NAXIS", "2"),
        kw("NAXIS1", "10"),
        kw("NAXIS2", "10"),
    ]
}

fn minimal_image() -> Vec<u8> {
    hdu(&minimal_image_cards(), &[0_u8; 200], 0)
}

fn empty_primary() -> Vec<u8> {
    hdu(
        &[kw("SIMPLE", "T"), kw("BITPIX", "8"), kw("NAXIS", "0")],
        &[],
        0,
    )
}

fn bintable_cards(naxis1: i64, naxis2: i64, tforms: &[&str]) -> Vec<String> {
    let mut cards = vec![
        kw_str("XTENSION", "BINTABLE"),
        kw("BITPIX", "8"),
        kw("NAXIS", "2"),
        kw("NAXIS1", &naxis1.to_string()),
        kw("NAXIS2", &naxis2.to_string()),
        kw("PCOUNT", "0"),
        kw("GCOUNT", "1"),
        kw("TFIELDS", &tforms.len().to_string()),
    ];
    for (i, form) in tforms.iter().enumerate() {
        cards.push(kw_str(&format!("TFORM{}", i + 1), form));
    }
    cards
}

/* ------------------------------------------------------------------ */
/* Harness                                                            */
/* ------------------------------------------------------------------ */

fn verify_with(
    bytes: Vec<u8>,
    opts: Options,
) -> (Result<FileResult, Error>, Vec<Diagnostic>) {
    let collected: Rc<RefCell<Vec<Diagnostic>>> = Rc::default();
    let sink = Rc::clone(&collected);
    let mut verifier = Verifier::with_options(opts);
    verifier.set_output(move |d: &Diagnostic| sink.borrow_mut().push(d.clone()));
    let result = verifier.verify_memory(bytes, "test.fits");
    let diags = collected.borrow().clone();
    (result, diags)
}

fn verify(bytes: Vec<u8>) -> (FileResult, Vec<Diagnostic>) {
    let (result, diags) = verify_with(bytes, Options::default());
    (result.expect("verification should complete"), diags)
}

fn codes(diags: &[Diagnostic]) -> Vec<Code> {
    diags.iter().filter_map(|d| d.code).collect()
}

/* ------------------------------------------------------------------ */
/* Scenario 1: minimal valid image                                    */
/* ------------------------------------------------------------------ */

#[test]
fn minimal_valid_image_is_clean() {
    let (result, diags) = verify(minimal_image());
    assert_eq!(result.num_errors, 0);
    assert_eq!(result.num_warnings, 0);
    assert_eq!(result.num_hdus, 1);
    assert!(!result.aborted);
    assert!(
        diags.iter().all(|d| d.severity == Severity::Info),
        "only informational output expected: {diags:?}"
    );
    // Informational chatter never carries hints.
    assert!(diags.iter().all(|d| d.fix_hint.is_none() && d.explain.is_none()));
}

/* ------------------------------------------------------------------ */
/* Scenario 2: corrupted BITPIX                                       */
/* ------------------------------------------------------------------ */

fn corrupt_bitpix_image() -> Vec<u8> {
    let mut cards = minimal_image_cards();
    cards[1] = kw("BITPIX", "99");
    hdu(&cards, &[0_u8; 2880], 0)
}

#[test]
fn corrupted_bitpix_reports_keyword_value() {
    let (result, diags) = verify(corrupt_bitpix_image());
    assert_eq!(result.num_errors, 1);
    let bad = diags
        .iter()
        .find(|d| d.code == Some(Code::KeywordValue))
        .expect("keyword-value diagnostic");
    assert!(bad.severity >= Severity::Error);
    assert_eq!(bad.hdu, 1);
    assert!(bad.text.contains("BITPIX"));
}

#[test]
fn corrupted_bitpix_hints_name_keyword_and_hdu() {
    let mut opts = Options::default();
    opts.fix_hints = true;
    opts.explain = true;
    let (result, diags) = verify_with(corrupt_bitpix_image(), opts);
    assert_eq!(result.unwrap().num_errors, 1);
    let bad = diags
        .iter()
        .find(|d| d.code == Some(Code::KeywordValue))
        .unwrap();
    let fix = bad.fix_hint.as_deref().expect("fix hint requested");
    assert!(fix.contains("BITPIX"));
    assert!(fix.contains("HDU 1"));
    let explain = bad.explain.as_deref().expect("explanation requested");
    assert!(explain.contains("FITS Standard"));
}

/* ------------------------------------------------------------------ */
/* Scenario 3: duplicate EXTNAME                                      */
/* ------------------------------------------------------------------ */

fn duplicate_extname_file() -> Vec<u8> {
    let mut bytes = empty_primary();
    for _ in 0..2 {
        let mut cards = bintable_cards(4, 1, &["1J"]);
        cards.push(kw_str("EXTNAME", "DUPLICATE"));
        cards.push(kw("EXTVER", "1"));
        bytes.extend_from_slice(&hdu(&cards, &[0_u8; 4], 0));
    }
    bytes
}

#[test]
fn duplicate_extname_is_warned() {
    let (result, diags) = verify(duplicate_extname_file());
    assert_eq!(result.num_hdus, 3);
    assert_eq!(result.num_errors, 0);
    let dup = diags
        .iter()
        .find(|d| d.code == Some(Code::DuplicateExtname))
        .expect("duplicate-extname warning");
    assert_eq!(dup.severity, Severity::Warning);
    assert!(dup.hdu == 2 || dup.hdu == 3);
    assert!(dup.text.contains('2') && dup.text.contains('3'));
}

#[test]
fn duplicate_extname_suppressed_in_errors_only_mode() {
    let mut opts = Options::default();
    opts.error_report = ReportLevel::ErrorsOnly;
    let (result, diags) = verify_with(duplicate_extname_file(), opts);
    assert_eq!(result.unwrap().num_warnings, 0);
    assert!(diags.is_empty(), "nothing should be delivered: {diags:?}");
}

/* ------------------------------------------------------------------ */
/* Scenario 4: missing END                                            */
/* ------------------------------------------------------------------ */

#[test]
fn missing_end_is_a_severe_reader_failure() {
    let mut bytes = minimal_image();
    let end_off = 5 * CARD;
    bytes[end_off..end_off + 3].copy_from_slice(b"   ");
    let (result, diags) = verify_with(bytes, Options::default());
    assert!(matches!(result, Err(Error::EndNotFound(1))));
    let severe = diags
        .iter()
        .find(|d| d.code == Some(Code::EndMissing))
        .expect("missing-end diagnostic");
    assert_eq!(severe.severity, Severity::Severe);
}

/* ------------------------------------------------------------------ */
/* Scenario 5: error cascade and the per-file cap                     */
/* ------------------------------------------------------------------ */

#[test]
fn error_cascade_trips_the_cap_and_aborts() {
    let ncols = 220;
    let tforms: Vec<&str> = vec!["1J"; ncols];
    let mut cards = bintable_cards(4 * ncols as i64, 1, &tforms);
    for i in 1..=ncols {
        cards.push(kw_str(&format!("TDISP{i}"), &format!("Q{i}")));
    }
    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &vec![0_u8; 4 * ncols], 0));

    let (result, diags) = verify(bytes);
    assert!(result.aborted);
    let bad_tdisp = diags
        .iter()
        .filter(|d| d.code == Some(Code::BadTdisp))
        .count();
    assert!(bad_tdisp >= 200, "expected >= 200 bad-tdisp errors, got {bad_tdisp}");
    let terminal: Vec<_> = diags
        .iter()
        .filter(|d| d.code == Some(Code::TooManyErrors))
        .collect();
    assert_eq!(terminal.len(), 1, "exactly one terminal diagnostic");
    // The terminal diagnostic is the last counted one.
    let counted = diags
        .iter()
        .filter(|d| d.severity >= Severity::Error)
        .count() as u64;
    assert_eq!(result.num_errors, counted);
}

/* ------------------------------------------------------------------ */
/* Scenario 6: variable-length overflow                               */
/* ------------------------------------------------------------------ */

#[test]
fn var_length_overflow_proposes_replacement_tform() {
    let rows = 10_u32;
    let pcount = 1000_u32;
    let mut cards = vec![
        kw_str("XTENSION", "BINTABLE"),
        kw("BITPIX", "8"),
        kw("NAXIS", "2"),
        kw("NAXIS1", "8"),
        kw("NAXIS2", &rows.to_string()),
        kw("PCOUNT", &pcount.to_string()),
        kw("GCOUNT", "1"),
        kw("TFIELDS", "1"),
        kw_str("TFORM1", "1PE(5)"),
    ];
    cards.push(kw_str("TTYPE1", "SPECTRUM"));

    // Ten (length, offset) descriptors; row 7 overflows the declared max.
    let mut data = Vec::new();
    for row in 1..=rows {
        let length: u32 = if row == 7 { 12 } else { 5 };
        data.extend_from_slice(&length.to_be_bytes());
        data.extend_from_slice(&((row - 1) * 48).to_be_bytes());
    }
    data.resize((rows * 8 + pcount) as usize, 0);

    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &data, 0));

    let mut opts = Options::default();
    opts.fix_hints = true;
    let (result, diags) = verify_with(bytes, opts);
    assert_eq!(result.unwrap().num_errors, 1);
    let overflow = diags
        .iter()
        .find(|d| d.code == Some(Code::VarExceedsMaxlen))
        .expect("var-exceeds-maxlen diagnostic");
    assert_eq!(overflow.hdu, 2);
    assert!(overflow.text.contains("row 7"));
    assert!(overflow.text.contains("length 12"));
    assert!(overflow.fix_hint.as_deref().unwrap().contains("1PE(12)"));
}

#[test]
fn var_descriptor_beyond_heap_is_an_error() {
    let mut cards = bintable_cards(8, 1, &[]);
    cards[5] = kw("PCOUNT", "16");
    cards[7] = kw("TFIELDS", "1");
    cards.push(kw_str("TFORM1", "1PE"));
    // One descriptor addressing 20 bytes in a 16-byte heap.
    let mut data = Vec::new();
    data.extend_from_slice(&5_u32.to_be_bytes());
    data.extend_from_slice(&0_u32.to_be_bytes());
    data.resize(8 + 16, 0);

    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &data, 0));
    let (result, diags) = verify(bytes);
    assert!(result.num_errors >= 1);
    assert!(codes(&diags).contains(&Code::VarExceedsHeap));
}

/* ------------------------------------------------------------------ */
/* Boundary cases                                                     */
/* ------------------------------------------------------------------ */

#[test]
fn header_of_exactly_one_block_has_no_fill_error() {
    let mut cards = vec![kw("SIMPLE", "T"), kw("BITPIX", "8"), kw("NAXIS", "0")];
    // 35 cards + END fill the block exactly.
    for i in 0..32 {
        cards.push(format!("COMMENT filler {i}"));
    }
    let bytes = hdu(&cards, &[], 0);
    assert_eq!(bytes.len(), BLOCK);
    let (result, diags) = verify(bytes);
    assert_eq!(result.num_errors, 0, "{diags:?}");
}

#[test]
fn trailing_byte_detection_is_exact() {
    let exact = minimal_image();
    let (result, diags) = verify(exact.clone());
    assert_eq!(result.num_errors, 0);
    assert!(!codes(&diags).contains(&Code::ExtraBytes));

    let mut longer = exact;
    longer.push(0);
    let (result, diags) = verify(longer);
    assert!(result.num_errors >= 1);
    assert!(codes(&diags).contains(&Code::ExtraBytes));
}

#[test]
fn row_count_guard_skips_data_validation() {
    let over = 1_i64 << 31;
    let mut cards = bintable_cards(0, over, &[]);
    cards[3] = kw("NAXIS1", "0");
    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &[], 0));
    let (result, diags) = verify(bytes);
    assert_eq!(result.num_errors, 0);
    assert!(diags
        .iter()
        .any(|d| d.severity == Severity::Info && d.text.contains("NAXIS2")));

    let under = over - 1;
    let mut cards = bintable_cards(0, under, &[]);
    cards[3] = kw("NAXIS1", "0");
    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &[], 0));
    let (result, diags) = verify(bytes);
    assert_eq!(result.num_errors, 0);
    assert!(!diags
        .iter()
        .any(|d| d.severity == Severity::Info && d.text.contains("row limit")));
}

/* ------------------------------------------------------------------ */
/* Data validation                                                    */
/* ------------------------------------------------------------------ */

#[test]
fn bad_logical_column_reported_once() {
    let mut bytes = empty_primary();
    let cards = bintable_cards(1, 3, &["1L"]);
    // Three rows: 'Y' is illegal twice, but one report suffices.
    bytes.extend_from_slice(&hdu(&cards, b"YTY", 0));
    let (result, diags) = verify(bytes);
    assert_eq!(result.num_errors, 1);
    let bad: Vec<_> = diags
        .iter()
        .filter(|d| d.code == Some(Code::BadLogicalData))
        .collect();
    assert_eq!(bad.len(), 1);
    assert!(bad[0].text.contains("other rows may have errors"));
}

#[test]
fn bit_column_fill_bits_must_be_zero() {
    let mut bytes = empty_primary();
    let cards = bintable_cards(2, 1, &["10X"]);
    // 10 bits: second byte may only use its top two bits.
    bytes.extend_from_slice(&hdu(&cards, &[0xFF, 0b1100_0001], 0));
    let (_, diags) = verify(bytes);
    assert!(codes(&diags).contains(&Code::BitNotJustified));

    let mut bytes = empty_primary();
    let cards = bintable_cards(2, 1, &["10X"]);
    bytes.extend_from_slice(&hdu(&cards, &[0xFF, 0b1100_0000], 0));
    let (result, _) = verify(bytes);
    assert_eq!(result.num_errors, 0);
}

#[test]
fn char_column_rejects_control_bytes() {
    let mut bytes = empty_primary();
    let cards = bintable_cards(4, 1, &["4A"]);
    bytes.extend_from_slice(&hdu(&cards, &[b'a', 7, b'c', b'd'], 0));
    let (_, diags) = verify(bytes);
    assert!(codes(&diags).contains(&Code::NonasciiData));
}

#[test]
fn ascii_table_field_and_gap_checks() {
    let mut cards = vec![
        kw_str("XTENSION", "TABLE"),
        kw("BITPIX", "8"),
        kw("NAXIS", "2"),
        kw("NAXIS1", "12"),
        kw("NAXIS2", "2"),
        kw("PCOUNT", "0"),
        kw("GCOUNT", "1"),
        kw("TFIELDS", "2"),
        kw("TBCOL1", "1"),
        kw_str("TFORM1", "I4"),
        kw("TBCOL2", "6"),
        kw_str("TFORM2", "F6.2"),
    ];
    cards.push(kw_str("TTYPE1", "INDEX"));
    cards.push(kw_str("TTYPE2", "FLUX"));
    // Row 1 is fine; row 2 has a float with no decimal point and a
    // control byte in the gap column 5.
    let row1 = b"  12   3.14 ";
    let row2 = b"  13\x07  314  ";
    let mut data = Vec::new();
    data.extend_from_slice(row1);
    data.extend_from_slice(row2);

    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &data, b' '));
    let (result, diags) = verify(bytes);
    let found = codes(&diags);
    assert!(found.contains(&Code::NoDecimal), "{diags:?}");
    assert!(found.contains(&Code::AsciiGap), "{diags:?}");
    assert_eq!(result.num_errors, 2);
}

#[test]
fn wrong_datasum_is_warned() {
    let mut cards = minimal_image_cards();
    cards.push(kw_str("DATASUM", "1234567"));
    let (result, diags) = verify(hdu(&cards, &[0_u8; 200], 0));
    assert_eq!(result.num_errors, 0);
    assert_eq!(result.num_warnings, 1);
    assert!(codes(&diags).contains(&Code::BadChecksum));
}

/* ------------------------------------------------------------------ */
/* Header findings                                                    */
/* ------------------------------------------------------------------ */

#[test]
fn missing_mandatory_keyword_and_order() {
    // PCOUNT missing entirely from an image extension.
    let cards = vec![
        kw_str("XTENSION", "IMAGE"),
        kw("BITPIX", "8"),
        kw("NAXIS", "0"),
        kw("GCOUNT", "1"),
    ];
    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &[], 0));
    let (_, diags) = verify(bytes);
    let missing = diags
        .iter()
        .find(|d| d.code == Some(Code::MissingKeyword))
        .expect("missing-keyword");
    assert!(missing.text.contains("PCOUNT"));
    // GCOUNT sits one position early: order violation.
    assert!(codes(&diags).contains(&Code::KeywordOrder));
}

#[test]
fn deprecated_and_placement_warnings() {
    let mut cards = minimal_image_cards();
    cards.push(kw("EPOCH", "2000.0"));
    cards.push(kw("TFIELDS", "2"));
    let (result, diags) = verify(hdu(&cards, &[0_u8; 200], 0));
    let found = codes(&diags);
    assert!(found.contains(&Code::Deprecated));
    assert!(found.contains(&Code::TableKeyInImage));
    assert_eq!(result.num_warnings, 1);
    assert_eq!(result.num_errors, 1);
}

#[test]
fn index_exceeding_tfields_is_reported() {
    let mut cards = bintable_cards(4, 1, &["1J"]);
    cards.push(kw_str("TTYPE9", "GHOST"));
    let mut bytes = empty_primary();
    bytes.extend_from_slice(&hdu(&cards, &[0_u8; 4], 0));
    let (_, diags) = verify(bytes);
    let hit = diags
        .iter()
        .find(|d| d.code == Some(Code::IndexExceedsTfields))
        .expect("index-exceeds-tfields");
    assert!(hit.text.contains("TTYPE9"));
}

#[test]
fn not_fixed_format_points_at_the_card() {
    let mut cards = minimal_image_cards();
    cards[1] = "BITPIX  = 16".to_owned();
    let (_, diags) = verify(hdu(&cards, &[0_u8; 200], 0));
    let hit = diags
        .iter()
        .find(|d| d.code == Some(Code::NotFixedFormat))
        .expect("not-fixed-format");
    // The offending card is echoed with an arrow marker line.
    assert!(hit.text.contains("BITPIX  = 16"));
    assert!(hit.text.lines().last().unwrap().trim_end().ends_with('^'));
}

/* ------------------------------------------------------------------ */
/* Severity filtering and hint nullity                                */
/* ------------------------------------------------------------------ */

fn one_error_one_warning() -> Vec<u8> {
    let mut cards = minimal_image_cards();
    cards[1] = kw("BITPIX", "99");
    cards.push(kw("EPOCH", "2000.0"));
    hdu(&cards, &[0_u8; 2880], 0)
}

#[test]
fn report_level_is_a_floor() {
    let (result, diags) = verify(one_error_one_warning());
    assert_eq!((result.num_errors, result.num_warnings), (1, 1));
    assert!(diags.iter().any(|d| d.severity == Severity::Warning));
    assert!(diags.iter().any(|d| d.severity == Severity::Error));

    let mut opts = Options::default();
    opts.error_report = ReportLevel::ErrorsOnly;
    let (result, diags) = verify_with(one_error_one_warning(), opts);
    let result = result.unwrap();
    assert_eq!((result.num_errors, result.num_warnings), (1, 0));
    assert!(diags.iter().all(|d| d.severity == Severity::Error));

    let mut opts = Options::default();
    opts.error_report = ReportLevel::SevereOnly;
    let (result, diags) = verify_with(one_error_one_warning(), opts);
    let result = result.unwrap();
    assert_eq!((result.num_errors, result.num_warnings), (0, 0));
    assert!(diags.is_empty());
}

#[test]
fn hints_are_null_unless_requested() {
    let (_, diags) = verify(one_error_one_warning());
    assert!(diags.iter().all(|d| d.fix_hint.is_none() && d.explain.is_none()));

    let mut opts = Options::default();
    opts.fix_hints = true;
    let (_, diags) = verify_with(one_error_one_warning(), opts);
    for d in diags.iter().filter(|d| d.severity >= Severity::Warning) {
        assert!(d.fix_hint.is_some(), "hint expected on {d:?}");
        assert!(d.explain.is_none(), "explain not requested on {d:?}");
    }
}

/* ------------------------------------------------------------------ */
/* Cross-cutting invariants                                           */
/* ------------------------------------------------------------------ */

#[test]
fn counters_match_delivered_diagnostics() {
    let (result, diags) = verify(one_error_one_warning());
    let errors = diags.iter().filter(|d| d.severity >= Severity::Error).count() as u64;
    let warnings = diags
        .iter()
        .filter(|d| d.severity == Severity::Warning)
        .count() as u64;
    assert_eq!(result.num_errors, errors);
    assert_eq!(result.num_warnings, warnings);
}

#[test]
fn diagnostics_are_ordered_by_hdu() {
    let mut bytes = corrupt_bitpix_image();
    let mut cards = bintable_cards(4, 1, &["1J"]);
    cards.push(kw_str("TDISP1", "Q9"));
    bytes.extend_from_slice(&hdu(&cards, &[0_u8; 4], 0));
    let (_, diags) = verify(bytes);
    let tagged: Vec<usize> = diags
        .iter()
        .filter(|d| d.severity >= Severity::Warning && d.hdu > 0)
        .map(|d| d.hdu)
        .collect();
    let mut sorted = tagged.clone();
    sorted.sort_unstable();
    assert_eq!(tagged, sorted, "HDU order must be nondecreasing");
}

#[test]
fn repeated_runs_give_identical_sequences() {
    let bytes = one_error_one_warning();
    let (_, first) = verify(bytes.clone());
    let (_, second) = verify(bytes);
    let key = |diags: &[Diagnostic]| -> Vec<(Severity, Option<Code>, usize, String)> {
        diags
            .iter()
            .map(|d| (d.severity, d.code, d.hdu, d.text.clone()))
            .collect()
    };
    assert_eq!(key(&first), key(&second));
}

#[test]
fn session_totals_accumulate_across_files() {
    let mut verifier = Verifier::new();
    verifier.set_output(|_: &Diagnostic| {});
    verifier.verify_memory(one_error_one_warning(), "a").unwrap();
    verifier.verify_memory(one_error_one_warning(), "b").unwrap();
    assert_eq!(verifier.totals(), (2, 2));
}

#[test]
fn file_output_mode_writes_prefixed_lines() {
    struct Shared(Rc<RefCell<Vec<u8>>>);
    impl std::io::Write for Shared {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let out: Rc<RefCell<Vec<u8>>> = Rc::default();
    let mut verifier = Verifier::new();
    verifier.set_writer(Shared(Rc::clone(&out)));
    verifier
        .verify_memory(one_error_one_warning(), "mem")
        .unwrap();
    let text = String::from_utf8(out.borrow().clone()).unwrap();
    assert!(text.contains("*** Error:   "));
    assert!(text.contains("*** Warning: "));
    assert!(text.lines().all(|l| l.len() <= 80), "{text}");
}
