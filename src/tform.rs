//! Column-format string parsing: binary-table TFORM, ASCII-table TFORM
//! and the TDISPn display formats.

use crate::error::Error;

/// Binary-table element type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TformType {
    Logical,       // L
    Bit,           // X
    Byte,          // B
    Short,         // I
    Long,          // J
    LongLong,      // K
    Char,          // A
    Float,         // E
    Double,        // D
    ComplexFloat,  // C
    ComplexDouble, // M
}

impl TformType {
    pub fn from_code(c: char) -> Option<Self> {
        Some(match c {
            'L' => TformType::Logical,
            'X' => TformType::Bit,
            'B' => TformType::Byte,
            'I' => TformType::Short,
            'J' => TformType::Long,
            'K' => TformType::LongLong,
            'A' => TformType::Char,
            'E' => TformType::Float,
            'D' => TformType::Double,
            'C' => TformType::ComplexFloat,
            'M' => TformType::ComplexDouble,
            _ => return None,
        })
    }

    pub fn code(self) -> char {
        match self {
            TformType::Logical => 'L',
            TformType::Bit => 'X',
            TformType::Byte => 'B',
            TformType::Short => 'I',
            TformType::Long => 'J',
            TformType::LongLong => 'K',
            TformType::Char => 'A',
            TformType::Float => 'E',
            TformType::Double => 'D',
            TformType::ComplexFloat => 'C',
            TformType::ComplexDouble => 'M',
        }
    }

    /// Size in bytes of one element; bits count as one byte here, the
    /// field-width computation packs them separately.
    pub fn element_size(self) -> u64 {
        match self {
            TformType::Logical | TformType::Bit | TformType::Byte | TformType::Char => 1,
            TformType::Short => 2,
            TformType::Long | TformType::Float => 4,
            TformType::LongLong | TformType::Double | TformType::ComplexFloat => 8,
            TformType::ComplexDouble => 16,
        }
    }
}

/// One parsed binary-table TFORM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinTform {
    pub repeat: u64,
    pub ty: TformType,
    /// `Some(false)` for a P descriptor, `Some(true)` for Q.
    pub var: Option<bool>,
    /// Declared maximum element count `(e)` of a variable-length column.
    pub max_len: Option<u64>,
    /// Display width of the `rAw` substring convention.
    pub raw_width: Option<u64>,
}

impl BinTform {
    /// Bytes this field occupies in a table row.
    pub fn field_width(&self) -> u64 {
        match self.var {
            Some(false) => self.repeat * 8,
            Some(true) => self.repeat * 16,
            None => match self.ty {
                TformType::Bit => self.repeat.div_ceil(8),
                ty => self.repeat * ty.element_size(),
            },
        }
    }
}

/// Parse a binary-table TFORM value, e.g. `1E`, `16X`, `20A10`, `1PE(100)`.
pub fn parse_bin(form: &str) -> Result<BinTform, Error> {
    let s = form.trim();
    let bad = || Error::BadTform(form.to_owned());
    let mut chars = s.char_indices().peekable();

    let mut repeat_digits = String::new();
    while let Some((_, c)) = chars.peek() {
        if c.is_ascii_digit() {
            repeat_digits.push(*c);
            chars.next();
        } else {
            break;
        }
    }
    let repeat = if repeat_digits.is_empty() {
        1
    } else {
        repeat_digits.parse().map_err(|_| bad())?
    };

    let (_, first) = chars.next().ok_or_else(bad)?;
    let (var, ty) = if first == 'P' || first == 'Q' {
        let (_, code) = chars.next().ok_or_else(bad)?;
        (
            Some(first == 'Q'),
            TformType::from_code(code).ok_or_else(bad)?,
        )
    } else {
        (None, TformType::from_code(first).ok_or_else(bad)?)
    };

    let rest: String = chars.map(|(_, c)| c).collect();
    let rest = rest.trim();

    let mut max_len = None;
    let mut raw_width = None;
    if !rest.is_empty() {
        if var.is_some() {
            let inner = rest
                .strip_prefix('(')
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(bad)?;
            max_len = Some(inner.trim().parse().map_err(|_| bad())?);
        } else if ty == TformType::Char && rest.bytes().all(|b| b.is_ascii_digit()) {
            raw_width = Some(rest.parse().map_err(|_| bad())?);
        } else {
            return Err(bad());
        }
    }

    Ok(BinTform {
        repeat,
        ty,
        var,
        max_len,
        raw_width,
    })
}

/// One parsed ASCII-table TFORM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsciiTform {
    pub code: char,
    pub width: u64,
    pub decimals: Option<u64>,
}

impl AsciiTform {
    pub fn is_float(&self) -> bool {
        matches!(self.code, 'F' | 'E' | 'D')
    }
}

/// Parse an ASCII-table TFORM value: `Aw`, `Iw`, `Fw.d`, `Ew.d`, `Dw.d`.
pub fn parse_ascii(form: &str) -> Result<AsciiTform, Error> {
    let s = form.trim();
    let bad = || Error::BadTform(form.to_owned());
    let mut chars = s.chars();
    let code = chars.next().ok_or_else(bad)?;
    let rest = chars.as_str();
    let (width_text, decimals) = match rest.split_once('.') {
        Some((w, d)) => (w, Some(d.parse().map_err(|_| bad())?)),
        None => (rest, None),
    };
    let width: u64 = width_text.parse().map_err(|_| bad())?;
    match code {
        'A' | 'I' if decimals.is_none() => {}
        'F' | 'E' | 'D' => {}
        _ => return Err(bad()),
    }
    if width == 0 {
        return Err(bad());
    }
    Ok(AsciiTform {
        code,
        width,
        decimals,
    })
}

/// Validate a TDISPn display format.
///
/// Accepted codes: `A`, `L`, `I`, `B`, `O`, `Z` with `w[.m]`; `F`, `E`,
/// `EN`, `ES`, `D`, `G` with `w.d[Ee]`.
pub fn tdisp_is_valid(disp: &str) -> bool {
    let s = disp.trim();
    if s.is_empty() {
        return false;
    }
    let (code, rest) = if let Some(r) = s.strip_prefix("EN").or_else(|| s.strip_prefix("ES")) {
        ("E", r)
    } else {
        (&s[..1], &s[1..])
    };
    match code {
        "A" | "L" => rest.is_empty() || rest.bytes().all(|b| b.is_ascii_digit()),
        "I" | "B" | "O" | "Z" => {
            let (w, m) = match rest.split_once('.') {
                Some((w, m)) => (w, Some(m)),
                None => (rest, None),
            };
            digits(w) && m.map_or(true, digits)
        }
        "F" | "E" | "D" | "G" => {
            let (w, rest) = match rest.split_once('.') {
                Some((w, r)) => (w, r),
                None => return false,
            };
            // An optional Ee exponent-width suffix.
            let (d, e) = match rest.split_once('E') {
                Some((d, e)) => (d, Some(e)),
                None => (rest, None),
            };
            digits(w) && digits(d) && e.map_or(true, digits)
        }
        _ => false,
    }
}

fn digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::{parse_ascii, parse_bin, tdisp_is_valid, TformType};

    #[test_case("1E", TformType::Float, 1, 4; "single float")]
    #[test_case("20A", TformType::Char, 20, 20; "char vector")]
    #[test_case("E", TformType::Float, 1, 4; "implicit repeat")]
    #[test_case("3J", TformType::Long, 3, 12; "long vector")]
    #[test_case("16X", TformType::Bit, 16, 2; "bit array")]
    #[test_case("10X", TformType::Bit, 10, 2; "ragged bit array")]
    #[test_case("2M", TformType::ComplexDouble, 2, 32; "double complex")]
    fn test_parse_bin(form: &str, ty: TformType, repeat: u64, width: u64) {
        let t = parse_bin(form).unwrap();
        assert_eq!(t.ty, ty);
        assert_eq!(t.repeat, repeat);
        assert_eq!(t.field_width(), width);
        assert!(t.var.is_none());
    }

    #[test]
    fn test_parse_bin_var() {
        let t = parse_bin("1PE(100)").unwrap();
        assert_eq!(t.var, Some(false));
        assert_eq!(t.ty, TformType::Float);
        assert_eq!(t.max_len, Some(100));
        assert_eq!(t.field_width(), 8);

        let t = parse_bin("1QD").unwrap();
        assert_eq!(t.var, Some(true));
        assert_eq!(t.max_len, None);
        assert_eq!(t.field_width(), 16);
    }

    #[test]
    fn test_parse_bin_raw_substring() {
        let t = parse_bin("60A10").unwrap();
        assert_eq!(t.repeat, 60);
        assert_eq!(t.raw_width, Some(10));
    }

    #[test_case("1R")]
    #[test_case("")]
    #[test_case("1PE(x)")]
    #[test_case("1E(5)")]
    fn test_parse_bin_rejects(form: &str) {
        assert!(parse_bin(form).is_err());
    }

    #[test]
    fn test_parse_ascii() {
        let t = parse_ascii("F10.4").unwrap();
        assert_eq!((t.code, t.width, t.decimals), ('F', 10, Some(4)));
        assert!(t.is_float());

        let t = parse_ascii("A12").unwrap();
        assert!(!t.is_float());
        assert!(parse_ascii("I5").is_ok());
        assert!(parse_ascii("E14.7").is_ok());
    }

    #[test_case("A5.2")]
    #[test_case("X4")]
    #[test_case("F0.2")]
    #[test_case("I")]
    fn test_parse_ascii_rejects(form: &str) {
        assert!(parse_ascii(form).is_err());
    }

    #[test_case("I8", true)]
    #[test_case("F10.2", true)]
    #[test_case("E12.5", true)]
    #[test_case("EN15.4", true)]
    #[test_case("G14.7E3", true)]
    #[test_case("Z8.8", true)]
    #[test_case("A", true)]
    #[test_case("Q2", false; "not a display code")]
    #[test_case("F10", false; "float needs decimals")]
    #[test_case("", false)]
    fn test_tdisp(disp: &str, ok: bool) {
        assert_eq!(tdisp_is_valid(disp), ok);
    }
}
