use thiserror::Error;

/// Reasons a byte sequence fails to parse as a declared kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of input: needed {needed} more byte(s), {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    #[error("{remaining} trailing byte(s) after decoded value")]
    TrailingBytes { remaining: usize },

    #[error("invalid bool byte {0:#04x}")]
    InvalidBool(u8),

    #[error("invalid option discriminant {0:#04x}")]
    InvalidOptionDiscriminant(u8),

    #[error("invalid result discriminant {0:#04x}")]
    InvalidResultDiscriminant(u8),

    #[error("case index {index} out of range for {kind} with {cases} case(s)")]
    CaseOutOfRange {
        kind: &'static str,
        index: u32,
        cases: usize,
    },

    #[error("flags bitset sets bit {bit} but only {declared} flag(s) are declared")]
    UnknownFlag { bit: usize, declared: usize },

    #[error("LEB128 value overflows u32")]
    LengthOverflow,

    #[error("list of {len} zero-width element(s) exceeds the limit of {max}")]
    ListTooLong { len: usize, max: usize },

    #[error("invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("invalid char scalar {0:#x}")]
    InvalidChar(u32),

    #[error("expected {expected} value, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("expected {expected} element(s), found {found}")]
    ArityMismatch { expected: usize, found: usize },
}

/// Reasons a value cannot be encoded against a declared kind.
///
/// Encoding is total over conforming values; every variant here means the
/// value and the kind disagree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("value of shape {found} does not conform to kind {expected}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("{kind} expects {expected} element(s), value has {found}")]
    ArityMismatch {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("case index {index} out of range for {kind} with {cases} case(s)")]
    CaseOutOfRange {
        kind: &'static str,
        index: u32,
        cases: usize,
    },

    #[error("payload presence mismatch for case {case}: declared {declared}, value has {present}")]
    PayloadMismatch {
        case: u32,
        declared: bool,
        present: bool,
    },

    #[error("length {0} does not fit in u32")]
    LengthOverflow(usize),

    #[error("list of {len} zero-width element(s) exceeds the limit of {max}")]
    ListTooLong { len: usize, max: usize },
}
