//! Typed-value assertions on parsed cards.

use crate::card::{Kind, ParsedCard};
use crate::code::Code;
use crate::state::Run;

fn kind_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Str => "string",
        Kind::Logical => "logical",
        Kind::Int => "integer",
        Kind::Float => "floating point",
        Kind::ComplexInt => "integer complex",
        Kind::ComplexFloat => "floating point complex",
        Kind::Commentary => "commentary",
        Kind::Unknown => "unknown",
    }
}

fn accepts(want: Kind, got: Kind) -> bool {
    match want {
        // An integer is a well-formed floating-point value.
        Kind::Float => matches!(got, Kind::Float | Kind::Int),
        Kind::ComplexFloat => matches!(got, Kind::ComplexFloat | Kind::ComplexInt),
        _ => want == got,
    }
}

/// Assert that `card` holds a value of kind `want`; emit `wrong-type` or
/// `null-value` otherwise. Returns whether the card passed.
pub(crate) fn require_kind(run: &mut Run, card: &ParsedCard, want: Kind) -> bool {
    if accepts(want, card.kind) {
        return true;
    }
    run.hint.keyword = Some(card.name.clone());
    if card.is_null() {
        run.err(
            Code::NullValue,
            &format!(
                "Keyword #{}, {}: the value field is blank, a {} value is required.",
                card.position,
                card.name,
                kind_name(want)
            ),
        );
        return false;
    }
    // A quoted number is the classic mistake; say so instead of hedging.
    if card.kind == Kind::Str && matches!(want, Kind::Int | Kind::Float | Kind::Logical) {
        run.hint.fix_override = Some(format!(
            "remove the quotes around the value of {}; {} values are written unquoted",
            card.name,
            kind_name(want)
        ));
    }
    run.err(
        Code::WrongType,
        &format!(
            "Keyword #{}, {}: a {} value is required, but the value '{}' is {}.",
            card.position,
            card.name,
            kind_name(want),
            card.value,
            kind_name(card.kind)
        ),
    );
    false
}
