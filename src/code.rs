//! The diagnostic code catalog.
//!
//! Codes are grouped in numeric ranges with gaps left for extension:
//! 100s file/HDU structure, 200s mandatory keywords, 300s keyword format,
//! 400s HDU-type placement, 500s table structure, 600s data validation,
//! 700s WCS, 800s reader library, 900s internal/abort, 1000s warnings.
//! The numeric value of every variant is part of the public API and is
//! never reused for a different meaning.

use serde_repr::Serialize_repr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr)]
#[repr(u16)]
pub enum Code {
    // File / HDU structure
    EndMissing = 101,
    ExtraHdus = 103,
    ExtraBytes = 104,
    HeaderFill = 105,
    DataFill = 106,
    UnknownXtension = 107,

    // Mandatory keywords
    MissingKeyword = 201,
    KeywordOrder = 202,
    KeywordDuplicate = 203,
    KeywordValue = 204,
    KeywordType = 205,
    NotFixedFormat = 206,

    // Keyword format
    CardTooLong = 301,
    IllegalNameChar = 302,
    NameNotJustified = 303,
    NontextChars = 304,
    EndNotBlank = 305,
    NoValueSeparator = 306,
    UnclosedString = 307,
    BadLogicalValue = 308,
    BadNumberValue = 309,
    BadComplexValue = 310,
    LowercaseExponent = 311,
    WrongType = 312,
    NullValue = 313,
    BadTdisp = 314,

    // HDU-type placement
    XtensionInPrimary = 401,
    PrimaryKeyInExt = 402,
    ImageKeyInTable = 403,
    TableKeyInImage = 404,
    TableWcsInImage = 405,

    // Table structure
    BadTform = 501,
    IndexExceedsTfields = 502,
    TscalWrongType = 503,
    TnullWrongType = 504,
    BlankWrongType = 505,
    TdimInAscii = 506,
    TbcolInBinary = 507,
    TheapNoPcount = 508,
    BadTbcol = 509,
    RowWidthMismatch = 510,

    // Data validation
    BitNotJustified = 601,
    BadLogicalData = 602,
    NonasciiData = 603,
    NoDecimal = 604,
    EmbeddedSpace = 605,
    VarExceedsMaxlen = 606,
    VarExceedsHeap = 607,
    NonasciiTable = 608,
    AsciiGap = 609,

    // WCS
    WcsaxesOrder = 701,
    WcsIndex = 702,

    // Reader library
    Reader = 801,

    // Internal / abort
    Internal = 901,
    TooManyErrors = 902,

    // Warnings
    Deprecated = 1001,
    ZeroScale = 1002,
    TnullRange = 1003,
    RawNotMultiple = 1004,
    Y2kDate = 1005,
    DuplicateKeyword = 1006,
    BadChecksum = 1007,
    MissingLongstrn = 1008,
    RandomGroups = 1009,
    LegacyXtension = 1010,
    TimesysValue = 1011,
    InheritPrimary = 1012,
    SimpleFalse = 1013,
    DuplicateExtname = 1014,
    VarExceeds32bit = 1015,
}

impl Code {
    /// Stable numeric form, as serialized in JSON output.
    pub fn value(self) -> u16 {
        self as u16
    }
}

#[cfg(test)]
mod tests {
    use super::Code;

    const ALL: &[Code] = &[
        Code::EndMissing,
        Code::ExtraHdus,
        Code::ExtraBytes,
        Code::HeaderFill,
        Code::DataFill,
        Code::UnknownXtension,
        Code::MissingKeyword,
        Code::KeywordOrder,
        Code::KeywordDuplicate,
        Code::KeywordValue,
        Code::KeywordType,
        Code::NotFixedFormat,
        Code::CardTooLong,
        Code::IllegalNameChar,
        Code::NameNotJustified,
        Code::NontextChars,
        Code::EndNotBlank,
        Code::NoValueSeparator,
        Code::UnclosedString,
        Code::BadLogicalValue,
        Code::BadNumberValue,
        Code::BadComplexValue,
        Code::LowercaseExponent,
        Code::WrongType,
        Code::NullValue,
        Code::BadTdisp,
        Code::XtensionInPrimary,
        Code::PrimaryKeyInExt,
        Code::ImageKeyInTable,
        Code::TableKeyInImage,
        Code::TableWcsInImage,
        Code::BadTform,
        Code::IndexExceedsTfields,
        Code::TscalWrongType,
        Code::TnullWrongType,
        Code::BlankWrongType,
        Code::TdimInAscii,
        Code::TbcolInBinary,
        Code::TheapNoPcount,
        Code::BadTbcol,
        Code::RowWidthMismatch,
        Code::BitNotJustified,
        Code::BadLogicalData,
        Code::NonasciiData,
        Code::NoDecimal,
        Code::EmbeddedSpace,
        Code::VarExceedsMaxlen,
        Code::VarExceedsHeap,
        Code::NonasciiTable,
        Code::AsciiGap,
        Code::WcsaxesOrder,
        Code::WcsIndex,
        Code::Reader,
        Code::Internal,
        Code::TooManyErrors,
        Code::Deprecated,
        Code::ZeroScale,
        Code::TnullRange,
        Code::RawNotMultiple,
        Code::Y2kDate,
        Code::DuplicateKeyword,
        Code::BadChecksum,
        Code::MissingLongstrn,
        Code::RandomGroups,
        Code::LegacyXtension,
        Code::TimesysValue,
        Code::InheritPrimary,
        Code::SimpleFalse,
        Code::DuplicateExtname,
        Code::VarExceeds32bit,
    ];

    #[test]
    fn numeric_values_are_unique() {
        let mut seen = std::collections::HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.value()), "value {} reused", code.value());
        }
    }

    #[test]
    fn warnings_live_in_their_range() {
        for code in ALL {
            let v = code.value();
            assert!((100..=1099).contains(&v));
        }
    }
}
