//! Decoding of a single 80-byte header card.
//!
//! A card is the unit of a FITS header: an eight-byte keyword name, an
//! optional `= ` value indicator, a value field and an optional `/` comment.
//! The parser never fails: format violations accumulate in a
//! [`ParseFlags`] bitset on the returned [`ParsedCard`] and are turned into
//! diagnostics by a later stage, so that one malformed card yields every
//! applicable finding instead of the first.

use serde::Serialize;

pub const CARD_LEN: usize = 80;

/// Value kinds a card can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Kind {
    Str,
    Logical,
    Int,
    Float,
    ComplexInt,
    ComplexFloat,
    /// COMMENT, HISTORY, CONTINUE, blank-name and END cards.
    Commentary,
    Unknown,
}

/// Accumulated card-format violations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ParseFlags(u32);

impl ParseFlags {
    pub const TOO_LONG: ParseFlags = ParseFlags(1);
    pub const BAD_NAME_CHAR: ParseFlags = ParseFlags(1 << 1);
    pub const NOT_JUSTIFIED: ParseFlags = ParseFlags(1 << 2);
    pub const NON_TEXT: ParseFlags = ParseFlags(1 << 3);
    pub const END_NOT_BLANK: ParseFlags = ParseFlags(1 << 4);
    pub const UNCLOSED_STRING: ParseFlags = ParseFlags(1 << 5);
    pub const BAD_NUMBER: ParseFlags = ParseFlags(1 << 6);
    pub const BAD_COMPLEX: ParseFlags = ParseFlags(1 << 7);
    pub const LOWERCASE_EXP: ParseFlags = ParseFlags(1 << 8);
    pub const NO_SEPARATOR: ParseFlags = ParseFlags(1 << 9);

    pub fn set(&mut self, other: ParseFlags) {
        self.0 |= other.0;
    }

    pub fn contains(self, other: ParseFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// One decoded header card.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedCard {
    /// 1-based position in the header.
    pub position: usize,
    /// Trimmed keyword name; `HIERARCH <tokens>` for the long form.
    pub name: String,
    pub kind: Kind,
    /// Textual value, stripped of surrounding whitespace per kind.
    /// For strings the doubled-quote escape is already collapsed.
    pub value: String,
    pub comment: String,
    #[serde(skip)]
    pub flags: ParseFlags,
}

impl ParsedCard {
    pub fn is_commentary(&self) -> bool {
        self.kind == Kind::Commentary
    }

    /// The value field was entirely blank after the `= ` indicator.
    pub fn is_null(&self) -> bool {
        self.kind == Kind::Unknown && self.value.is_empty()
    }

    pub fn int_value(&self) -> Option<i64> {
        if self.kind == Kind::Int {
            self.value.parse().ok()
        } else {
            None
        }
    }

    pub fn float_value(&self) -> Option<f64> {
        match self.kind {
            Kind::Int | Kind::Float => self.value.replace(['D', 'd'], "E").parse().ok(),
            _ => None,
        }
    }

    pub fn logical_value(&self) -> Option<bool> {
        if self.kind == Kind::Logical {
            Some(self.value == "T")
        } else {
            None
        }
    }
}

const COMMENTARY_NAMES: [&str; 4] = ["COMMENT", "HISTORY", "CONTINUE", ""];

/// Decode one raw card.
///
/// `position` is the 1-based keyword number used in diagnostics. When
/// `hierarch` is on, `HIERARCH` cards are decoded as the ESO long-keyword
/// form instead of commentary.
pub fn parse(raw: &[u8], position: usize, hierarch: bool) -> ParsedCard {
    let mut flags = ParseFlags::default();

    // The card must fit 80 columns; excess is diagnosed and dropped.
    let len = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    if len > CARD_LEN {
        flags.set(ParseFlags::TOO_LONG);
    }
    let mut buf = [b' '; CARD_LEN];
    let n = len.min(CARD_LEN);
    buf[..n].copy_from_slice(&raw[..n]);

    let (name, name_flags) = parse_name(&buf);
    flags.set(name_flags);

    // END closes the header; the rest of the card must be blank.
    if name == "END" {
        if buf[8..].iter().any(|&b| b != b' ') {
            flags.set(ParseFlags::END_NOT_BLANK);
        }
        return ParsedCard {
            position,
            name,
            kind: Kind::Commentary,
            value: String::new(),
            comment: String::new(),
            flags,
        };
    }

    if COMMENTARY_NAMES.contains(&name.as_str()) || (name == "HIERARCH" && !hierarch) {
        if buf[8..].iter().any(|&b| !is_text_byte(b)) {
            flags.set(ParseFlags::NON_TEXT);
        }
        let body = trim_end(&buf[8..]);
        return ParsedCard {
            position,
            name,
            kind: Kind::Commentary,
            value: String::new(),
            comment: body,
            flags,
        };
    }

    if name == "HIERARCH" {
        return parse_hierarch(&buf, position, flags);
    }

    // A value card needs the `= ` indicator in columns 9-10; anything else
    // is treated as commentary.
    if &buf[8..10] != b"= " {
        let body = trim_end(&buf[8..]);
        return ParsedCard {
            position,
            name,
            kind: Kind::Commentary,
            value: String::new(),
            comment: body,
            flags,
        };
    }

    let (kind, value, after, value_flags) = parse_value(&buf, 10);
    flags.set(value_flags);
    let (comment, sep_flags) = parse_comment(&buf, after);
    flags.set(sep_flags);

    ParsedCard {
        position,
        name,
        kind,
        value,
        comment,
        flags,
    }
}

fn parse_name(buf: &[u8; CARD_LEN]) -> (String, ParseFlags) {
    let mut flags = ParseFlags::default();
    let field = &buf[..8];
    let trimmed = trim_end_bytes(field);
    if trimmed.is_empty() {
        return (String::new(), flags);
    }
    // Left-justification: no blank may precede or interrupt the name.
    if trimmed.iter().any(|&b| b == b' ') {
        flags.set(ParseFlags::NOT_JUSTIFIED);
    }
    for &b in trimmed {
        if b != b' ' && !b.is_ascii_uppercase() && !b.is_ascii_digit() && b != b'_' && b != b'-' {
            flags.set(ParseFlags::BAD_NAME_CHAR);
            break;
        }
    }
    let name: String = trimmed
        .iter()
        .filter(|&&b| b != b' ')
        .map(|&b| b as char)
        .collect();
    (name, flags)
}

fn parse_hierarch(buf: &[u8; CARD_LEN], position: usize, mut flags: ParseFlags) -> ParsedCard {
    // Long form: `HIERARCH <tokens> = <value> [/ comment]`.
    let body = &buf[8..];
    let eq = body.iter().position(|&b| b == b'=');
    let eq = match eq {
        Some(i) if body.get(i + 1) == Some(&b' ') => i,
        _ => {
            // No value indicator: plain commentary, as in the short form.
            return ParsedCard {
                position,
                name: "HIERARCH".into(),
                kind: Kind::Commentary,
                value: String::new(),
                comment: trim_end(body),
                flags,
            };
        }
    };
    let long = String::from_utf8_lossy(&body[..eq]).trim().to_owned();
    let name = format!("HIERARCH {long}");
    let (kind, value, after, value_flags) = parse_value(buf, 8 + eq + 2);
    flags.set(value_flags);
    let (comment, sep_flags) = parse_comment(buf, after);
    flags.set(sep_flags);
    ParsedCard {
        position,
        name,
        kind,
        value,
        comment,
        flags,
    }
}

/// Decode the value field starting at `start`. Returns the kind, the value
/// text, the index of the first byte after the value, and violation flags.
fn parse_value(buf: &[u8; CARD_LEN], start: usize) -> (Kind, String, usize, ParseFlags) {
    let mut flags = ParseFlags::default();
    let mut i = start;
    while i < CARD_LEN && buf[i] == b' ' {
        i += 1;
    }
    if i == CARD_LEN {
        // Undefined (null) value.
        return (Kind::Unknown, String::new(), i, flags);
    }

    match buf[i] {
        b'\'' => {
            let (value, end, ok) = parse_string(buf, i);
            if !ok {
                flags.set(ParseFlags::UNCLOSED_STRING);
            }
            (Kind::Str, value, end, flags)
        }
        b'T' | b'F' if value_terminated(buf, i + 1) => {
            (Kind::Logical, (buf[i] as char).to_string(), i + 1, flags)
        }
        b'+' | b'-' | b'.' | b'0'..=b'9' => {
            let end = token_end(buf, i);
            let token = std::str::from_utf8(&buf[i..end]).unwrap_or("");
            let (kind, f) = classify_number(token);
            flags.set(f);
            (kind, token.to_owned(), end, flags)
        }
        b'(' => {
            let (kind, value, end, f) = parse_complex(buf, i);
            flags.set(f);
            (kind, value, end, flags)
        }
        b'/' => {
            // Comment-only card: the value is undefined.
            (Kind::Unknown, String::new(), i, flags)
        }
        _ => {
            let end = token_end(buf, i);
            let token = trim_end(&buf[i..end]);
            (Kind::Unknown, token, end, flags)
        }
    }
}

/// `T`/`F` must stand alone to be a logical value.
fn value_terminated(buf: &[u8; CARD_LEN], i: usize) -> bool {
    i >= CARD_LEN || buf[i] == b' ' || buf[i] == b'/'
}

fn token_end(buf: &[u8; CARD_LEN], start: usize) -> usize {
    let mut i = start;
    while i < CARD_LEN && buf[i] != b' ' && buf[i] != b'/' {
        i += 1;
    }
    i
}

/// Consume a quoted string starting at the opening quote. The doubled
/// quote `''` escapes a literal quote. Returns (value, end, closed).
fn parse_string(buf: &[u8; CARD_LEN], start: usize) -> (String, usize, bool) {
    let mut value = String::new();
    let mut i = start + 1;
    while i < CARD_LEN {
        if buf[i] == b'\'' {
            if i + 1 < CARD_LEN && buf[i + 1] == b'\'' {
                value.push('\'');
                i += 2;
                continue;
            }
            // Trailing blanks inside the quotes are not significant.
            let trimmed = value.trim_end().to_owned();
            return (trimmed, i + 1, true);
        }
        value.push(buf[i] as char);
        i += 1;
    }
    (value.trim_end().to_owned(), CARD_LEN, false)
}

fn classify_number(token: &str) -> (Kind, ParseFlags) {
    let mut flags = ParseFlags::default();
    if token.contains(['e', 'd']) {
        flags.set(ParseFlags::LOWERCASE_EXP);
    }
    let normalized = token.to_ascii_uppercase().replace('D', "E");
    let body = normalized.strip_prefix(['+', '-']).unwrap_or(&normalized);
    if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
        return (Kind::Int, flags);
    }
    if parse_float_text(&normalized).is_some() {
        return (Kind::Float, flags);
    }
    flags.set(ParseFlags::BAD_NUMBER);
    (Kind::Unknown, flags)
}

/// Strict FITS float: `[+-]digits[.digits][E[+-]digits]`, with at least one
/// digit somewhere around the point.
fn parse_float_text(s: &str) -> Option<f64> {
    let rest = s.strip_prefix(['+', '-']).unwrap_or(s);
    let (mantissa, exponent) = match rest.split_once('E') {
        Some((m, e)) => (m, Some(e)),
        None => (rest, None),
    };
    let (int_part, frac_part) = match mantissa.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit()) || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    if let Some(e) = exponent {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        if e.is_empty() || !e.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
    }
    s.replace('E', "e").parse().ok()
}

fn parse_complex(buf: &[u8; CARD_LEN], start: usize) -> (Kind, String, usize, ParseFlags) {
    let mut flags = ParseFlags::default();
    let close = buf[start..].iter().position(|&b| b == b')');
    let close = match close {
        Some(off) => start + off,
        None => {
            flags.set(ParseFlags::BAD_COMPLEX);
            let end = token_end(buf, start);
            return (Kind::Unknown, trim_end(&buf[start..end]), end, flags);
        }
    };
    let inner = String::from_utf8_lossy(&buf[start + 1..close]).into_owned();
    let mut parts = inner.splitn(2, ',');
    let re = parts.next().unwrap_or("").trim().to_owned();
    let im = parts.next().map(|s| s.trim().to_owned());
    let im = match im {
        Some(im) => im,
        None => {
            flags.set(ParseFlags::BAD_COMPLEX);
            return (Kind::Unknown, format!("({inner})"), close + 1, flags);
        }
    };
    let (re_kind, re_flags) = classify_number(&re);
    let (im_kind, im_flags) = classify_number(&im);
    flags.set(re_flags);
    flags.set(im_flags);
    if re_kind == Kind::Unknown || im_kind == Kind::Unknown {
        flags.set(ParseFlags::BAD_COMPLEX);
        return (Kind::Unknown, format!("({re}, {im})"), close + 1, flags);
    }
    let kind = if re_kind == Kind::Int && im_kind == Kind::Int {
        Kind::ComplexInt
    } else {
        Kind::ComplexFloat
    };
    (kind, format!("({re}, {im})"), close + 1, flags)
}

fn parse_comment(buf: &[u8; CARD_LEN], after: usize) -> (String, ParseFlags) {
    let mut flags = ParseFlags::default();
    let mut i = after;
    while i < CARD_LEN && buf[i] == b' ' {
        i += 1;
    }
    if i == CARD_LEN {
        return (String::new(), flags);
    }
    if buf[i] != b'/' {
        // Garbage between the value and the comment.
        flags.set(ParseFlags::NO_SEPARATOR);
        return (trim_end(&buf[i..]), flags);
    }
    let mut body = &buf[i + 1..];
    if body.first() == Some(&b' ') {
        body = &body[1..];
    }
    (trim_end(body), flags)
}

fn is_text_byte(b: u8) -> bool {
    (32..=126).contains(&b)
}

fn trim_end_bytes(bytes: &[u8]) -> &[u8] {
    let mut end = bytes.len();
    while end > 0 && bytes[end - 1] == b' ' {
        end -= 1;
    }
    &bytes[..end]
}

fn trim_end(bytes: &[u8]) -> String {
    String::from_utf8_lossy(trim_end_bytes(bytes)).into_owned()
}

/* Fixed-format position checks. Mandatory keywords must use the fixed
format of the standard; each check returns the 1-based column an arrow
marker should point at on violation. */

pub fn check_fixed_int(buf: &[u8]) -> Result<(), usize> {
    let buf = pad(buf);
    let end = token_end(&buf, first_non_space(&buf, 10));
    if end == 30 { Ok(()) } else { Err(30) }
}

pub fn check_fixed_log(buf: &[u8]) -> Result<(), usize> {
    let buf = pad(buf);
    if (buf[29] == b'T' || buf[29] == b'F') && buf[10..29].iter().all(|&b| b == b' ') {
        Ok(())
    } else {
        Err(30)
    }
}

pub fn check_fixed_str(buf: &[u8]) -> Result<(), usize> {
    let buf = pad(buf);
    if buf[10] != b'\'' {
        return Err(11);
    }
    let (_, end, closed) = parse_string(&buf, 10);
    // The closing quote must sit at column 20 or later.
    if closed && end >= 20 { Ok(()) } else { Err(20) }
}

/// Second line of a fixed-format diagnostic: an arrow under `column`.
pub fn marker(column: usize) -> String {
    let mut line = " ".repeat(column.saturating_sub(1));
    line.push('^');
    line
}

fn first_non_space(buf: &[u8; CARD_LEN], start: usize) -> usize {
    let mut i = start;
    while i < CARD_LEN && buf[i] == b' ' {
        i += 1;
    }
    i
}

fn pad(raw: &[u8]) -> [u8; CARD_LEN] {
    let mut buf = [b' '; CARD_LEN];
    let n = raw.len().min(CARD_LEN);
    buf[..n].copy_from_slice(&raw[..n]);
    buf
}

#[cfg(test)]
mod tests {
    use super::{parse, Kind, ParseFlags};

    fn card(text: &str) -> Vec<u8> {
        let mut raw = text.as_bytes().to_vec();
        raw.resize(super::CARD_LEN, b' ');
        raw
    }

    #[test]
    fn test_logical_card() {
        let c = parse(&card("SIMPLE  =                    T / file conforms"), 1, false);
        assert_eq!(c.name, "SIMPLE");
        assert_eq!(c.kind, Kind::Logical);
        assert_eq!(c.value, "T");
        assert_eq!(c.comment, "file conforms");
        assert!(c.flags.is_empty());
    }

    #[test]
    fn test_string_card_with_escape() {
        let c = parse(&card("OBJECT  = 'Barnard''s star'    / target"), 1, false);
        assert_eq!(c.kind, Kind::Str);
        assert_eq!(c.value, "Barnard's star");
    }

    #[test]
    fn test_unclosed_string() {
        let c = parse(&card("OBJECT  = 'no closing quote"), 1, false);
        assert!(c.flags.contains(ParseFlags::UNCLOSED_STRING));
    }

    #[test]
    fn test_integer_and_float() {
        let c = parse(&card("NAXIS1  =                  100"), 1, false);
        assert_eq!(c.kind, Kind::Int);
        assert_eq!(c.int_value(), Some(100));

        let c = parse(&card("BSCALE  =              1.25E02"), 1, false);
        assert_eq!(c.kind, Kind::Float);
        assert_eq!(c.float_value(), Some(125.0));
    }

    #[test]
    fn test_lowercase_exponent() {
        let c = parse(&card("BZERO   =               1.0e03"), 1, false);
        assert_eq!(c.kind, Kind::Float);
        assert!(c.flags.contains(ParseFlags::LOWERCASE_EXP));
    }

    #[test]
    fn test_fortran_double_exponent() {
        let c = parse(&card("CRVAL1  =            1.25D+02"), 1, false);
        assert_eq!(c.kind, Kind::Float);
        assert_eq!(c.float_value(), Some(125.0));
    }

    #[test]
    fn test_complex_card() {
        let c = parse(&card("GAIN    = (1.0, -2.5)"), 1, false);
        assert_eq!(c.kind, Kind::ComplexFloat);
        let c = parse(&card("REFPIX  = (3, 4)"), 1, false);
        assert_eq!(c.kind, Kind::ComplexInt);
    }

    #[test]
    fn test_bad_name() {
        let c = parse(&card("bad key =                    1"), 1, false);
        assert!(c.flags.contains(ParseFlags::BAD_NAME_CHAR));
        let c = parse(&card("  LATE  =                    1"), 1, false);
        assert!(c.flags.contains(ParseFlags::NOT_JUSTIFIED));
    }

    #[test]
    fn test_commentary_and_end() {
        let c = parse(&card("COMMENT  this file was synthesized"), 1, false);
        assert_eq!(c.kind, Kind::Commentary);
        assert_eq!(c.comment, " this file was synthesized");

        let c = parse(&card("END"), 1, false);
        assert_eq!(c.name, "END");
        assert!(c.flags.is_empty());

        let c = parse(&card("END      trailing junk"), 1, false);
        assert!(c.flags.contains(ParseFlags::END_NOT_BLANK));
    }

    #[test]
    fn test_missing_indicator_downgrades() {
        let c = parse(&card("NOVALUE   123"), 1, false);
        assert_eq!(c.kind, Kind::Commentary);
    }

    #[test]
    fn test_null_value() {
        let c = parse(&card("UNDEF   ="), 1, false);
        assert!(c.is_null());
    }

    #[test]
    fn test_no_separator() {
        let c = parse(&card("NAXIS   =                    2 junk without slash"), 1, false);
        assert!(c.flags.contains(ParseFlags::NO_SEPARATOR));
    }

    #[test]
    fn test_card_too_long() {
        let mut raw = card("NAXIS   =                    2");
        raw.push(b'X');
        let c = parse(&raw, 1, false);
        assert!(c.flags.contains(ParseFlags::TOO_LONG));
    }

    #[test]
    fn test_hierarch_long_form() {
        let raw = card("HIERARCH ESO DET CHIP ID = 'CCID-20' / chip");
        let off = parse(&raw, 1, false);
        assert_eq!(off.kind, Kind::Commentary);

        let on = parse(&raw, 1, true);
        assert_eq!(on.name, "HIERARCH ESO DET CHIP ID");
        assert_eq!(on.kind, Kind::Str);
        assert_eq!(on.value, "CCID-20");
    }

    #[test]
    fn test_fixed_format_checks() {
        assert!(super::check_fixed_int(&card("BITPIX  =                   16")).is_ok());
        assert_eq!(
            super::check_fixed_int(&card("BITPIX  = 16")),
            Err(30)
        );
        assert!(super::check_fixed_log(&card("SIMPLE  =                    T")).is_ok());
        assert_eq!(
            super::check_fixed_log(&card("SIMPLE  =  T")),
            Err(30)
        );
        assert!(super::check_fixed_str(&card("XTENSION= 'IMAGE   '")).is_ok());
        assert_eq!(
            super::check_fixed_str(&card("XTENSION= 'IMG'")),
            Err(20)
        );
    }

    #[test]
    fn test_marker_column() {
        assert_eq!(super::marker(3), "  ^");
    }
}
