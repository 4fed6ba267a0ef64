//! Per-HDU header validation.
//!
//! Order matters: cards are ingested and their format diagnosed first, the
//! mandatory sequence for the HDU type next, then placement rules, indexed
//! column keywords, WCS keywords and finally the convention warnings. The
//! diagnostics therefore come out in header reading order per concern.

use crate::card::{self, Kind, ParsedCard, CARD_LEN};
use crate::code::Code;
use crate::error::Error;
use crate::reader::FitsReader;
use crate::state::{HduKind, HduView, Run};
use crate::tform::{self, TformType};

use super::keyword::require_kind;

pub(crate) fn verify_header(
    run: &mut Run,
    rdr: &mut dyn FitsReader,
    view: &mut HduView,
) -> Result<(), Error> {
    ingest(run, rdr, view)?;
    extract(view);
    mandatory(run, view);
    placement(run, view);
    match run.cur_kind {
        HduKind::AsciiTable | HduKind::BinTable => columns(run, view),
        HduKind::Primary | HduKind::Image => image_keys(run, view),
        HduKind::Unknown => {}
    }
    wcs(run, view);
    conventions(run, view);
    Ok(())
}

/* -------------------------------------------------------------------- */
/* Card ingest                                                          */
/* -------------------------------------------------------------------- */

fn ingest(run: &mut Run, rdr: &mut dyn FitsReader, view: &mut HduView) -> Result<(), Error> {
    let num_cards = rdr.num_cards()?;
    for position in 1..=num_cards {
        let raw = rdr.read_card(position)?;
        let parsed = card::parse(&raw, position, run.opts.test_hierarch);
        if run.opts.print_header {
            let text = String::from_utf8_lossy(&raw);
            run.info(&format!("{position:4} | {}", text.trim_end()));
        }
        emit_parse_errors(run, &parsed, &raw);
        view.index
            .entry(parsed.name.clone())
            .or_default()
            .push(view.cards.len());
        view.cards.push(parsed);
        view.raw.push(raw);
    }
    Ok(())
}

fn emit_parse_errors(run: &mut Run, card: &ParsedCard, raw: &[u8; CARD_LEN]) {
    use card::ParseFlags as F;
    let flags = card.flags;
    if flags.is_empty() {
        return;
    }
    let echo = String::from_utf8_lossy(raw).trim_end().to_owned();
    let report = |run: &mut Run, code: Code, what: &str| {
        run.hint.keyword = Some(card.name.clone());
        run.err(
            code,
            &format!("Keyword #{}, {}: {}.\n{}", card.position, card.name, what, echo),
        );
    };
    if flags.contains(F::TOO_LONG) {
        report(run, Code::CardTooLong, "the card is longer than 80 characters");
    }
    if flags.contains(F::BAD_NAME_CHAR) {
        report(
            run,
            Code::IllegalNameChar,
            "the keyword name contains an illegal character",
        );
    }
    if flags.contains(F::NOT_JUSTIFIED) {
        report(
            run,
            Code::NameNotJustified,
            "the keyword name is not left justified",
        );
    }
    if flags.contains(F::NON_TEXT) {
        report(
            run,
            Code::NontextChars,
            "the commentary text contains non-printable characters",
        );
    }
    if flags.contains(F::END_NOT_BLANK) {
        report(run, Code::EndNotBlank, "the END card is not blank after column 8");
    }
    if flags.contains(F::UNCLOSED_STRING) {
        report(run, Code::UnclosedString, "the string value has no closing quote");
    }
    if flags.contains(F::BAD_NUMBER) {
        report(run, Code::BadNumberValue, "the value is not a valid FITS number");
    }
    if flags.contains(F::BAD_COMPLEX) {
        report(
            run,
            Code::BadComplexValue,
            "the value is not a valid complex number pair",
        );
    }
    if flags.contains(F::LOWERCASE_EXP) {
        report(
            run,
            Code::LowercaseExponent,
            "the exponent letter must be uppercase",
        );
    }
    if flags.contains(F::NO_SEPARATOR) {
        report(
            run,
            Code::NoValueSeparator,
            "extra characters follow the value without a '/' comment separator",
        );
    }
}

/* -------------------------------------------------------------------- */
/* Structural extraction                                                */
/* -------------------------------------------------------------------- */

fn extract(view: &mut HduView) {
    view.bitpix = view.int_of("BITPIX").unwrap_or(0);
    view.naxis = view.int_of("NAXIS").unwrap_or(0);
    let naxis = view.naxis.clamp(0, 999) as usize;
    view.naxes = (1..=naxis)
        .map(|n| view.int_of(&format!("NAXIS{n}")).unwrap_or(0))
        .collect();
    view.pcount = view.int_of("PCOUNT").unwrap_or(0);
    view.gcount = view.int_of("GCOUNT").unwrap_or(1);
    view.tfields = view.int_of("TFIELDS").unwrap_or(0).clamp(0, 999);

    let tfields = view.tfields as usize;
    view.ttype = column_strings(view, "TTYPE", tfields);
    view.tform = column_strings(view, "TFORM", tfields);
    view.tunit = column_strings(view, "TUNIT", tfields);

    view.is_random_groups = view
        .first("GROUPS")
        .and_then(|c| c.logical_value())
        .unwrap_or(false)
        && view.naxes.first() == Some(&0);
    view.is_tile_compressed = view
        .first("ZIMAGE")
        .and_then(|c| c.logical_value())
        .unwrap_or(false);
    view.use_longstring = view.index.contains_key("LONGSTRN");
    view.datamax = view.first("DATAMAX").map(|c| c.value.clone());
    view.datamin = view.first("DATAMIN").map(|c| c.value.clone());
}

fn column_strings(view: &HduView, root: &str, tfields: usize) -> Vec<Option<String>> {
    (1..=tfields)
        .map(|n| {
            view.first(&format!("{root}{n}"))
                .filter(|c| c.kind == Kind::Str)
                .map(|c| c.value.clone())
        })
        .collect()
}

/* -------------------------------------------------------------------- */
/* Mandatory keyword sequence                                           */
/* -------------------------------------------------------------------- */

fn mandatory(run: &mut Run, view: &HduView) {
    match run.cur_kind {
        HduKind::Primary => {
            if let Some(pos) = slot(run, view, 0, "SIMPLE") {
                check_simple(run, view, pos);
            }
            common_array_keywords(run, view, 1);
        }
        HduKind::Image | HduKind::Unknown => {
            if let Some(pos) = slot(run, view, 0, "XTENSION") {
                check_xtension(run, view, pos);
            }
            let after_axes = common_array_keywords(run, view, 1);
            check_pcount(run, view, after_axes, Some(0));
            check_gcount(run, view, after_axes + 1);
        }
        HduKind::AsciiTable | HduKind::BinTable => {
            if let Some(pos) = slot(run, view, 0, "XTENSION") {
                check_xtension(run, view, pos);
            }
            let after_axes = common_array_keywords(run, view, 1);
            let required_pcount = (run.cur_kind == HduKind::AsciiTable).then_some(0);
            check_pcount(run, view, after_axes, required_pcount);
            check_gcount(run, view, after_axes + 1);
            check_tfields(run, view, after_axes + 2);
            table_columns_mandatory(run, view);
        }
    }
}

/// Locate the mandatory keyword expected at 0-based `pos`. Emits
/// `keyword-order` or `missing-keyword`; once a slot has been reported the
/// found-elsewhere card is still returned so its value checks run. Only the
/// first violation per slot is reported.
fn slot(run: &mut Run, view: &HduView, pos: usize, name: &str) -> Option<usize> {
    if let Some(card) = view.cards.get(pos) {
        if card.name == name {
            unique(run, view, name);
            return Some(pos);
        }
    }
    if let Some(&found) = view.index.get(name).and_then(|p| p.first()) {
        run.hint.keyword = Some(name.to_owned());
        run.err(
            Code::KeywordOrder,
            &format!(
                "Keyword #{}, {name}: a mandatory keyword out of order, expected at position {}.",
                found + 1,
                pos + 1
            ),
        );
        unique(run, view, name);
        return Some(found);
    }
    run.hint.keyword = Some(name.to_owned());
    run.err(
        Code::MissingKeyword,
        &format!("mandatory keyword {name} is missing in HDU {}.", run.cur_hdu),
    );
    None
}

fn unique(run: &mut Run, view: &HduView, name: &str) {
    if let Some(positions) = view.index.get(name) {
        if positions.len() > 1 {
            run.hint.keyword = Some(name.to_owned());
            run.err(
                Code::KeywordDuplicate,
                &format!(
                    "mandatory keyword {name} occurs {} times in HDU {}.",
                    positions.len(),
                    run.cur_hdu
                ),
            );
        }
    }
}

fn fixed(run: &mut Run, view: &HduView, pos: usize, check: fn(&[u8]) -> Result<(), usize>) {
    let card = &view.cards[pos];
    if let Err(col) = check(&view.raw[pos]) {
        let echo = String::from_utf8_lossy(&view.raw[pos]).trim_end().to_owned();
        run.hint.keyword = Some(card.name.clone());
        run.err(
            Code::NotFixedFormat,
            &format!(
                "Keyword #{}, {}: the value is not in fixed format.\n{}\n{}",
                card.position,
                card.name,
                echo,
                card::marker(col)
            ),
        );
    }
}

fn keyword_value_err(run: &mut Run, card: &ParsedCard, what: &str) {
    run.hint.keyword = Some(card.name.clone());
    run.err(
        Code::KeywordValue,
        &format!("Keyword #{}, {}: {}.", card.position, card.name, what),
    );
}

fn check_simple(run: &mut Run, view: &HduView, pos: usize) {
    let card = &view.cards[pos];
    if require_kind(run, card, Kind::Logical) {
        fixed(run, view, pos, card::check_fixed_log);
        if card.value == "F" {
            run.warn(
                Code::SimpleFalse,
                &format!(
                    "Keyword #{}, SIMPLE: the file is declared non-conforming (SIMPLE = F).",
                    card.position
                ),
            );
        }
    }
}

fn check_xtension(run: &mut Run, view: &HduView, pos: usize) {
    const LEGACY: [&str; 4] = ["A3DTABLE", "IUEIMAGE", "FOREIGN", "DUMP"];
    let card = &view.cards[pos];
    if !require_kind(run, card, Kind::Str) {
        return;
    }
    fixed(run, view, pos, card::check_fixed_str);
    let value = card.value.trim();
    match value {
        "IMAGE" | "TABLE" | "BINTABLE" => {}
        _ if LEGACY.contains(&value) => {
            run.warn(
                Code::LegacyXtension,
                &format!(
                    "Keyword #{}, XTENSION: '{value}' is a legacy extension type.",
                    card.position
                ),
            );
        }
        _ => {
            run.hint.keyword = Some("XTENSION".into());
            run.err(
                Code::UnknownXtension,
                &format!(
                    "Keyword #{}, XTENSION: '{value}' is not a registered extension type.",
                    card.position
                ),
            );
        }
    }
}

/// BITPIX, NAXIS and the NAXISn sequence, shared by every HDU type.
/// Returns the 0-based position right after the last NAXISn slot.
fn common_array_keywords(run: &mut Run, view: &HduView, bitpix_pos: usize) -> usize {
    if let Some(pos) = slot(run, view, bitpix_pos, "BITPIX") {
        let card = &view.cards[pos];
        if require_kind(run, card, Kind::Int) {
            fixed(run, view, pos, card::check_fixed_int);
            let value = card.int_value().unwrap_or(0);
            if ![8, 16, 32, 64, -32, -64].contains(&value) {
                keyword_value_err(
                    run,
                    card,
                    &format!("illegal value {value}, must be 8, 16, 32, 64, -32 or -64"),
                );
            }
        }
    }

    let mut naxis = 0;
    if let Some(pos) = slot(run, view, bitpix_pos + 1, "NAXIS") {
        let card = &view.cards[pos];
        if require_kind(run, card, Kind::Int) {
            fixed(run, view, pos, card::check_fixed_int);
            match card.int_value() {
                Some(v) if (0..=999).contains(&v) => naxis = v as usize,
                Some(v) => keyword_value_err(
                    run,
                    card,
                    &format!("illegal value {v}, must lie in [0, 999]"),
                ),
                None => {}
            }
        }
    }

    for n in 1..=naxis {
        let name = format!("NAXIS{n}");
        if let Some(pos) = slot(run, view, bitpix_pos + 1 + n, &name) {
            let card = &view.cards[pos];
            if require_kind(run, card, Kind::Int) {
                fixed(run, view, pos, card::check_fixed_int);
                if card.int_value().is_some_and(|v| v < 0) {
                    keyword_value_err(run, card, "the axis length may not be negative");
                }
            }
        }
    }

    bitpix_pos + 2 + naxis
}

fn check_pcount(run: &mut Run, view: &HduView, pos: usize, required: Option<i64>) {
    if let Some(pos) = slot(run, view, pos, "PCOUNT") {
        let card = &view.cards[pos];
        if require_kind(run, card, Kind::Int) {
            fixed(run, view, pos, card::check_fixed_int);
            match (required, card.int_value()) {
                (Some(req), Some(v)) if v != req => {
                    keyword_value_err(run, card, &format!("value must be {req}, found {v}"))
                }
                (None, Some(v)) if v < 0 => {
                    keyword_value_err(run, card, "the heap size may not be negative")
                }
                _ => {}
            }
        }
    }
}

fn check_gcount(run: &mut Run, view: &HduView, pos: usize) {
    if let Some(pos) = slot(run, view, pos, "GCOUNT") {
        let card = &view.cards[pos];
        if require_kind(run, card, Kind::Int) {
            fixed(run, view, pos, card::check_fixed_int);
            if card.int_value().is_some_and(|v| v != 1) {
                keyword_value_err(run, card, "value must be 1 in an extension");
            }
        }
    }
}

fn check_tfields(run: &mut Run, view: &HduView, pos: usize) {
    if let Some(pos) = slot(run, view, pos, "TFIELDS") {
        let card = &view.cards[pos];
        if require_kind(run, card, Kind::Int) {
            fixed(run, view, pos, card::check_fixed_int);
            if card.int_value().is_some_and(|v| !(0..=999).contains(&v)) {
                keyword_value_err(run, card, "the column count must lie in [0, 999]");
            }
        }
    }
}

/// Per-column TFORMn (and TBCOLn for ASCII tables): required, typed,
/// parsable, and consistent with NAXIS1.
fn table_columns_mandatory(run: &mut Run, view: &HduView) {
    let naxis1 = view.naxes.first().copied().unwrap_or(0);
    let ascii = run.cur_kind == HduKind::AsciiTable;
    let mut bin_width: u64 = 0;
    let mut all_parsed = true;

    for col in 1..=view.tfields.max(0) as usize {
        let name = format!("TFORM{col}");
        let card = match view.first(&name) {
            Some(card) => card,
            None => {
                run.hint.keyword = Some(name.clone());
                run.err(
                    Code::MissingKeyword,
                    &format!("mandatory keyword {name} is missing in HDU {}.", run.cur_hdu),
                );
                all_parsed = false;
                continue;
            }
        };
        unique(run, view, &name);
        if !require_kind(run, card, Kind::Str) {
            all_parsed = false;
            continue;
        }
        if ascii {
            if tform::parse_ascii(&card.value).is_err() {
                bad_tform(run, col, card);
            }
        } else {
            match tform::parse_bin(&card.value) {
                Ok(form) => bin_width += form.field_width(),
                Err(_) => {
                    bad_tform(run, col, card);
                    all_parsed = false;
                }
            }
        }
    }

    if ascii {
        ascii_tbcols(run, view, naxis1);
    } else if all_parsed && view.tfields > 0 && naxis1 >= 0 && bin_width != naxis1 as u64 {
        run.err(
            Code::RowWidthMismatch,
            &format!(
                "the TFORMn columns occupy {bin_width} bytes per row but NAXIS1 = {naxis1}."
            ),
        );
    }
}

fn bad_tform(run: &mut Run, col: usize, card: &ParsedCard) {
    run.hint.keyword = Some(card.name.clone());
    run.hint.column = Some(col);
    run.err(
        Code::BadTform,
        &format!(
            "Keyword #{}, {}: '{}' is not a valid column format.",
            card.position, card.name, card.value
        ),
    );
}

fn ascii_tbcols(run: &mut Run, view: &HduView, naxis1: i64) {
    for col in 1..=view.tfields.max(0) as usize {
        let name = format!("TBCOL{col}");
        let card = match view.first(&name) {
            Some(card) => card,
            None => {
                run.hint.keyword = Some(name.clone());
                run.err(
                    Code::MissingKeyword,
                    &format!("mandatory keyword {name} is missing in HDU {}.", run.cur_hdu),
                );
                continue;
            }
        };
        unique(run, view, &name);
        if !require_kind(run, card, Kind::Int) {
            continue;
        }
        let tbcol = card.int_value().unwrap_or(0);
        let width = view.tform[col - 1]
            .as_deref()
            .and_then(|f| tform::parse_ascii(f).ok())
            .map(|f| f.width as i64)
            .unwrap_or(0);
        if tbcol < 1 || (naxis1 > 0 && tbcol - 1 + width > naxis1) {
            run.hint.keyword = Some(name.clone());
            run.hint.column = Some(col);
            run.err(
                Code::BadTbcol,
                &format!(
                    "Keyword #{}, {name}: field at column {tbcol} width {width} \
                     does not fit the row length {naxis1}.",
                    card.position
                ),
            );
        }
    }
}

/* -------------------------------------------------------------------- */
/* Placement rules                                                      */
/* -------------------------------------------------------------------- */

const PRIMARY_ONLY: [&str; 3] = ["SIMPLE", "EXTEND", "BLOCKED"];
const IMAGE_ONLY: [&str; 6] = ["BSCALE", "BZERO", "BUNIT", "BLANK", "DATAMAX", "DATAMIN"];
const TABLE_ROOTS: [&str; 3] = ["TTYPE", "TFORM", "TBCOL"];
const TABLE_WCS_ROOTS: [&str; 6] = ["TCTYP", "TCRPX", "TCRVL", "TCDLT", "TCUNI", "TCROT"];

/// Split an indexed keyword such as `TTYPE12` into its root and number.
fn split_indexed<'a>(name: &'a str, roots: &[&'static str]) -> Option<(&'static str, usize)> {
    for root in roots {
        if let Some(digits) = name.strip_prefix(root) {
            if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
                return digits.parse().ok().map(|n| (*root, n));
            }
        }
    }
    None
}

fn placement(run: &mut Run, view: &HduView) {
    let kind = run.cur_kind;
    for card in &view.cards {
        if card.is_commentary() {
            continue;
        }
        let name = card.name.as_str();
        match kind {
            HduKind::Primary => {
                if name == "XTENSION" {
                    run.hint.keyword = Some(name.to_owned());
                    run.err(
                        Code::XtensionInPrimary,
                        &format!(
                            "Keyword #{}, XTENSION: not allowed in the primary header.",
                            card.position
                        ),
                    );
                }
            }
            _ => {
                if PRIMARY_ONLY.contains(&name) {
                    run.hint.keyword = Some(name.to_owned());
                    run.err(
                        Code::PrimaryKeyInExt,
                        &format!(
                            "Keyword #{}, {name}: only allowed in the primary header.",
                            card.position
                        ),
                    );
                }
            }
        }
        match kind {
            HduKind::AsciiTable | HduKind::BinTable => {
                if IMAGE_ONLY.contains(&name) {
                    run.hint.keyword = Some(name.to_owned());
                    run.err(
                        Code::ImageKeyInTable,
                        &format!(
                            "Keyword #{}, {name}: an array keyword is not allowed in a table.",
                            card.position
                        ),
                    );
                }
            }
            HduKind::Primary | HduKind::Image => {
                if name == "TFIELDS" || split_indexed(name, &TABLE_ROOTS).is_some() {
                    run.hint.keyword = Some(name.to_owned());
                    run.err(
                        Code::TableKeyInImage,
                        &format!(
                            "Keyword #{}, {name}: a table keyword is not allowed in an image.",
                            card.position
                        ),
                    );
                } else if split_indexed(name, &TABLE_WCS_ROOTS).is_some() {
                    run.hint.keyword = Some(name.to_owned());
                    run.err(
                        Code::TableWcsInImage,
                        &format!(
                            "Keyword #{}, {name}: a table WCS keyword is not allowed in an image.",
                            card.position
                        ),
                    );
                }
            }
            HduKind::Unknown => {}
        }
    }
}

/* -------------------------------------------------------------------- */
/* Indexed column keywords                                              */
/* -------------------------------------------------------------------- */

const COLUMN_ROOTS: [&str; 13] = [
    "TTYPE", "TFORM", "TUNIT", "TSCAL", "TZERO", "TNULL", "TDISP", "TDIM", "TBCOL", "TLMIN",
    "TLMAX", "TDMIN", "TDMAX",
];

/// Column type as seen by the TSCAL/TNULL applicability rules.
#[derive(Clone, Copy, PartialEq)]
enum ColClass {
    Unscalable, // string, logical, bit
    Int(TformType),
    Floating,
    Other,
}

fn column_class(run_kind: HduKind, view: &HduView, col: usize) -> ColClass {
    let form = match view.tform.get(col - 1).and_then(|f| f.as_deref()) {
        Some(form) => form,
        None => return ColClass::Other,
    };
    if run_kind == HduKind::AsciiTable {
        return match tform::parse_ascii(form) {
            Ok(f) if f.code == 'A' => ColClass::Unscalable,
            Ok(f) if f.is_float() => ColClass::Floating,
            Ok(_) => ColClass::Int(TformType::Long),
            Err(_) => ColClass::Other,
        };
    }
    match tform::parse_bin(form) {
        Ok(f) => match f.ty {
            TformType::Char | TformType::Logical | TformType::Bit => ColClass::Unscalable,
            TformType::Byte | TformType::Short | TformType::Long | TformType::LongLong => {
                ColClass::Int(f.ty)
            }
            TformType::Float | TformType::Double => ColClass::Floating,
            _ => ColClass::Other,
        },
        Err(_) => ColClass::Other,
    }
}

fn columns(run: &mut Run, view: &HduView) {
    let ascii = run.cur_kind == HduKind::AsciiTable;

    for card in &view.cards {
        if card.is_commentary() {
            continue;
        }
        let (root, n) = match split_indexed(&card.name, &COLUMN_ROOTS) {
            Some(hit) => hit,
            None => continue,
        };

        if n < 1 || n as i64 > view.tfields {
            run.hint.keyword = Some(card.name.clone());
            run.err(
                Code::IndexExceedsTfields,
                &format!(
                    "Keyword #{}, {}: the column number {n} exceeds TFIELDS = {}.",
                    card.position, card.name, view.tfields
                ),
            );
            continue;
        }

        let class = column_class(run.cur_kind, view, n);
        match root {
            "TTYPE" | "TUNIT" => {
                require_kind(run, card, Kind::Str);
            }
            // TFORMn was checked with the mandatory set.
            "TFORM" => {}
            "TSCAL" | "TZERO" => {
                if !require_kind(run, card, Kind::Float) {
                    continue;
                }
                if class == ColClass::Unscalable {
                    run.hint.keyword = Some(card.name.clone());
                    run.hint.column = Some(n);
                    run.err(
                        Code::TscalWrongType,
                        &format!(
                            "Keyword #{}, {}: scaling is undefined for a string, logical \
                             or bit column.",
                            card.position, card.name
                        ),
                    );
                } else if root == "TSCAL" && card.float_value() == Some(0.0) {
                    run.warn(
                        Code::ZeroScale,
                        &format!(
                            "Keyword #{}, {}: a zero scale factor.",
                            card.position, card.name
                        ),
                    );
                }
            }
            "TNULL" => check_tnull(run, card, n, class, ascii),
            "TDISP" => {
                if require_kind(run, card, Kind::Str) && !tform::tdisp_is_valid(&card.value) {
                    run.hint.keyword = Some(card.name.clone());
                    run.hint.column = Some(n);
                    run.err(
                        Code::BadTdisp,
                        &format!(
                            "Keyword #{}, {}: '{}' is not a valid display format.",
                            card.position, card.name, card.value
                        ),
                    );
                }
            }
            "TDIM" => {
                if ascii {
                    run.hint.keyword = Some(card.name.clone());
                    run.err(
                        Code::TdimInAscii,
                        &format!(
                            "Keyword #{}, {}: not allowed in an ASCII table.",
                            card.position, card.name
                        ),
                    );
                } else {
                    require_kind(run, card, Kind::Str);
                }
            }
            "TBCOL" => {
                if !ascii {
                    run.hint.keyword = Some(card.name.clone());
                    run.err(
                        Code::TbcolInBinary,
                        &format!(
                            "Keyword #{}, {}: not allowed in a binary table.",
                            card.position, card.name
                        ),
                    );
                }
                // The ASCII-table TBCOLn were checked with the mandatory set.
            }
            "TLMIN" | "TLMAX" | "TDMIN" | "TDMAX" => {
                require_kind(run, card, Kind::Float);
            }
            _ => {}
        }
    }

    if let Some(card) = view.first("THEAP") {
        if require_kind(run, card, Kind::Int) && view.pcount == 0 {
            run.hint.keyword = Some("THEAP".into());
            run.err(
                Code::TheapNoPcount,
                &format!(
                    "Keyword #{}, THEAP: a heap pointer while PCOUNT = 0.",
                    card.position
                ),
            );
        }
    }

    raw_substring_convention(run, view);
}

fn check_tnull(run: &mut Run, card: &ParsedCard, n: usize, class: ColClass, ascii: bool) {
    // ASCII-table TNULLn is the literal null string; binary TNULLn is the
    // integer stored in null elements.
    if ascii {
        require_kind(run, card, Kind::Str);
        return;
    }
    if !require_kind(run, card, Kind::Int) {
        return;
    }
    match class {
        ColClass::Floating => {
            run.hint.keyword = Some(card.name.clone());
            run.hint.column = Some(n);
            run.err(
                Code::TnullWrongType,
                &format!(
                    "Keyword #{}, {}: a null value is undefined for a floating column.",
                    card.position, card.name
                ),
            );
        }
        ColClass::Int(ty) => {
            let value = card.int_value().unwrap_or(0);
            let in_range = match ty {
                TformType::Byte => (0..=255).contains(&value),
                TformType::Short => i16::try_from(value).is_ok(),
                TformType::Long => i32::try_from(value).is_ok(),
                _ => true,
            };
            if !in_range {
                run.warn(
                    Code::TnullRange,
                    &format!(
                        "Keyword #{}, {}: the null value {value} cannot be represented \
                         in the column data type.",
                        card.position, card.name
                    ),
                );
            }
        }
        _ => {}
    }
}

/// HEASARC `rAw` substring convention: the repeat count must be a multiple
/// of the substring width.
fn raw_substring_convention(run: &mut Run, view: &HduView) {
    if run.cur_kind != HduKind::BinTable {
        return;
    }
    for (i, form) in view.tform.iter().enumerate() {
        let Some(form) = form.as_deref() else { continue };
        if let Ok(parsed) = tform::parse_bin(form) {
            if let Some(w) = parsed.raw_width {
                if w == 0 || parsed.repeat % w != 0 {
                    run.warn_heasarc(
                        Code::RawNotMultiple,
                        &format!(
                            "TFORM{}: the repeat count {} is not a multiple of the \
                             substring width {w}.",
                            i + 1,
                            parsed.repeat
                        ),
                    );
                }
            }
        }
    }
}

/* -------------------------------------------------------------------- */
/* Array keywords on images                                             */
/* -------------------------------------------------------------------- */

fn image_keys(run: &mut Run, view: &HduView) {
    if let Some(card) = view.first("BLANK") {
        if require_kind(run, card, Kind::Int) {
            if view.bitpix < 0 {
                run.hint.keyword = Some("BLANK".into());
                run.err(
                    Code::BlankWrongType,
                    &format!(
                        "Keyword #{}, BLANK: a null value is undefined for a floating \
                         point array.",
                        card.position
                    ),
                );
            } else {
                let value = card.int_value().unwrap_or(0);
                let in_range = match view.bitpix {
                    8 => (0..=255).contains(&value),
                    16 => i16::try_from(value).is_ok(),
                    32 => i32::try_from(value).is_ok(),
                    _ => true,
                };
                if !in_range {
                    run.warn(
                        Code::TnullRange,
                        &format!(
                            "Keyword #{}, BLANK: the null value {value} cannot be \
                             represented with BITPIX = {}.",
                            card.position, view.bitpix
                        ),
                    );
                }
            }
        }
    }
    if let Some(card) = view.first("BSCALE") {
        if require_kind(run, card, Kind::Float) && card.float_value() == Some(0.0) {
            run.warn(
                Code::ZeroScale,
                &format!("Keyword #{}, BSCALE: a zero scale factor.", card.position),
            );
        }
    }
    if let Some(card) = view.first("BZERO") {
        require_kind(run, card, Kind::Float);
    }
}

/* -------------------------------------------------------------------- */
/* WCS keywords                                                         */
/* -------------------------------------------------------------------- */

const IMG_WCS_ROOTS: [&str; 6] = ["CTYPE", "CRPIX", "CRVAL", "CDELT", "CUNIT", "CROTA"];

fn wcs(run: &mut Run, view: &HduView) {
    if !matches!(run.cur_kind, HduKind::Primary | HduKind::Image) {
        return;
    }

    let wcsaxes = view.first("WCSAXES").map(|c| (c.position, c.int_value()));
    if let Some(card) = view.first("WCSAXES") {
        require_kind(run, card, Kind::Int);
    }

    let mut family = Vec::new();
    for card in &view.cards {
        if card.is_commentary() {
            continue;
        }
        if let Some((_, n)) = split_indexed(&card.name, &IMG_WCS_ROOTS) {
            family.push((card.position, card.name.clone(), n));
        }
    }

    if let Some((axes_pos, _)) = wcsaxes {
        if let Some((pos, name, _)) = family.iter().find(|(pos, _, _)| *pos < axes_pos) {
            run.hint.keyword = Some("WCSAXES".into());
            run.err(
                Code::WcsaxesOrder,
                &format!(
                    "Keyword #{axes_pos}, WCSAXES: must precede the other WCS keywords, \
                     but {name} appears at position {pos}."
                ),
            );
        }
    }

    let declared = wcsaxes.and_then(|(_, v)| v);
    let limit = declared.unwrap_or(0).max(view.naxis);
    for (pos, name, n) in &family {
        if *n as i64 > limit {
            run.hint.keyword = Some(name.clone());
            let text = format!(
                "Keyword #{pos}, {name}: the axis number {n} exceeds {}.",
                if declared.is_some() { "WCSAXES" } else { "NAXIS" }
            );
            if declared.is_some() {
                run.err(Code::WcsIndex, &text);
            } else {
                run.warn(Code::WcsIndex, &text);
            }
        }
    }
}

/* -------------------------------------------------------------------- */
/* Conventions and deprecation warnings                                 */
/* -------------------------------------------------------------------- */

const TIMESYS_VALUES: [&str; 13] = [
    "UTC", "TAI", "TDB", "TT", "ET", "UT1", "UT", "TCG", "TCB", "TDT", "IAT", "GPS", "LOCAL",
];

fn conventions(run: &mut Run, view: &HduView) {
    for name in ["EPOCH", "BLOCKED"] {
        if let Some(card) = view.first(name) {
            run.warn(
                Code::Deprecated,
                &format!("Keyword #{}, {name}: a deprecated keyword.", card.position),
            );
        }
    }

    if let Some(card) = view.first("DATE") {
        if let Some(yy) = old_date_year(&card.value) {
            if yy < 10 {
                run.warn(
                    Code::Y2kDate,
                    &format!(
                        "Keyword #{}, DATE: the two-digit year {yy:02} is ambiguous, \
                         use the yyyy-mm-dd form.",
                        card.position
                    ),
                );
            }
        }
    }

    duplicate_keywords(run, view);

    let continued = view.index.contains_key("CONTINUE")
        || view
            .cards
            .iter()
            .any(|c| c.kind == Kind::Str && c.value.ends_with('&'));
    if continued && !view.use_longstring {
        run.warn_heasarc(
            Code::MissingLongstrn,
            "long string values are used without the LONGSTRN keyword.",
        );
    }

    if run.cur_kind == HduKind::Primary && view.is_random_groups {
        run.warn(
            Code::RandomGroups,
            "the primary array uses the deprecated random groups structure.",
        );
    }

    if let Some(card) = view.first("TIMESYS") {
        if require_kind(run, card, Kind::Str)
            && !TIMESYS_VALUES.contains(&card.value.trim())
        {
            run.warn(
                Code::TimesysValue,
                &format!(
                    "Keyword #{}, TIMESYS: '{}' is not a recognized time scale.",
                    card.position, card.value
                ),
            );
        }
    }

    if let Some(card) = view.first("INHERIT") {
        if require_kind(run, card, Kind::Logical)
            && run.cur_kind == HduKind::Primary
            && view.naxis > 0
            && view.naxes.iter().all(|&a| a > 0)
        {
            run.warn_heasarc(
                Code::InheritPrimary,
                &format!(
                    "Keyword #{}, INHERIT: used in a primary HDU that contains data.",
                    card.position
                ),
            );
        }
    }

    // Record the HDU identity for the file-level duplicate scan.
    let extname = view
        .first("EXTNAME")
        .filter(|c| c.kind == Kind::Str)
        .map(|c| c.value.trim().to_owned())
        .unwrap_or_default();
    let extver = view.int_of("EXTVER").unwrap_or(0);
    if let Some(card) = view.first("EXTNAME") {
        require_kind(run, card, Kind::Str);
    }
    if let Some(card) = view.first("EXTVER") {
        require_kind(run, card, Kind::Int);
    }
    run.record_extname(&extname, extver);
}

fn duplicate_keywords(run: &mut Run, view: &HduView) {
    const COMMENTARY: [&str; 5] = ["COMMENT", "HISTORY", "CONTINUE", "HIERARCH", ""];
    let mandatory = |name: &str| {
        matches!(
            name,
            "SIMPLE" | "BITPIX" | "NAXIS" | "XTENSION" | "PCOUNT" | "GCOUNT" | "TFIELDS"
        ) || split_indexed(name, &["NAXIS", "TFORM", "TBCOL"]).is_some()
    };
    let dups: Vec<(String, usize)> = view
        .index
        .iter()
        .filter(|(name, positions)| {
            positions.len() > 1
                && !COMMENTARY.contains(&name.as_str())
                && !mandatory(name.as_str())
        })
        .map(|(name, positions)| (name.clone(), positions.len()))
        .collect();
    for (name, count) in dups {
        run.warn(
            Code::DuplicateKeyword,
            &format!("keyword {name} occurs {count} times in HDU {}.", run.cur_hdu),
        );
    }
}

/// Year of a legacy `dd/mm/yy` date value, `None` for any other form.
fn old_date_year(value: &str) -> Option<u32> {
    let v = value.trim();
    let bytes = v.as_bytes();
    if bytes.len() != 8 || bytes[2] != b'/' || bytes[5] != b'/' {
        return None;
    }
    let digits = |r: std::ops::Range<usize>| {
        v.get(r)
            .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u32>().ok())
    };
    digits(0..2)?;
    digits(3..5)?;
    digits(6..8)
}

#[cfg(test)]
mod tests {
    use super::old_date_year;

    #[test]
    fn test_old_date_year() {
        assert_eq!(old_date_year("25/12/99"), Some(99));
        assert_eq!(old_date_year("01/01/05"), Some(5));
        assert_eq!(old_date_year("2015-02-11"), None);
        assert_eq!(old_date_year("1/1/99"), None);
    }
}
