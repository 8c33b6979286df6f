//! Wire-level type descriptors.
//!
//! A [`Kind`] describes the shape of a value on the wire. Both ends of a call
//! must agree on it exactly: field order, case order and flag order are all
//! positional and there is no name-based fallback. Names carried by records,
//! variants, enums and flags exist for diagnostics and bindings only.

use std::fmt;

/// Most elements a list of a zero-width kind may hold.
pub const MAX_ZERO_WIDTH_LIST_LEN: usize = 1 << 16;

/// A named record field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub kind: Kind,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// A named variant case with an optional payload kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Case {
    pub name: String,
    pub payload: Option<Kind>,
}

impl Case {
    pub fn new(name: impl Into<String>, payload: Option<Kind>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

/// The fixed set of value kinds the codec understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    Bool,
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
    Char,
    String,
    List(Box<Kind>),
    Record(Vec<Field>),
    Tuple(Vec<Kind>),
    Variant(Vec<Case>),
    Enum(Vec<String>),
    Flags(Vec<String>),
    Option(Box<Kind>),
    Result {
        ok: Option<Box<Kind>>,
        err: Option<Box<Kind>>,
    },
}

impl Kind {
    pub fn list(element: Kind) -> Self {
        Kind::List(Box::new(element))
    }

    pub fn option(inner: Kind) -> Self {
        Kind::Option(Box::new(inner))
    }

    pub fn result(ok: Option<Kind>, err: Option<Kind>) -> Self {
        Kind::Result {
            ok: ok.map(Box::new),
            err: err.map(Box::new),
        }
    }

    pub fn record<N, I>(fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Kind)>,
    {
        Kind::Record(
            fields
                .into_iter()
                .map(|(name, kind)| Field::new(name, kind))
                .collect(),
        )
    }

    pub fn variant<N, I>(cases: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Option<Kind>)>,
    {
        Kind::Variant(
            cases
                .into_iter()
                .map(|(name, payload)| Case::new(name, payload))
                .collect(),
        )
    }

    pub fn enumeration<N, I>(cases: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = N>,
    {
        Kind::Enum(cases.into_iter().map(Into::into).collect())
    }

    pub fn flags<N, I>(names: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = N>,
    {
        Kind::Flags(names.into_iter().map(Into::into).collect())
    }

    /// Short name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Kind::Bool => "bool",
            Kind::U8 => "u8",
            Kind::U16 => "u16",
            Kind::U32 => "u32",
            Kind::U64 => "u64",
            Kind::S8 => "s8",
            Kind::S16 => "s16",
            Kind::S32 => "s32",
            Kind::S64 => "s64",
            Kind::F32 => "f32",
            Kind::F64 => "f64",
            Kind::Char => "char",
            Kind::String => "string",
            Kind::List(_) => "list",
            Kind::Record(_) => "record",
            Kind::Tuple(_) => "tuple",
            Kind::Variant(_) => "variant",
            Kind::Enum(_) => "enum",
            Kind::Flags(_) => "flags",
            Kind::Option(_) => "option",
            Kind::Result { .. } => "result",
        }
    }

    /// Number of bytes a flags bitset with `count` names occupies.
    pub fn flags_width(count: usize) -> usize {
        count.div_ceil(8)
    }

    /// Fewest bytes any value of this kind occupies on the wire.
    ///
    /// Zero for kinds with no content: empty records and tuples, flags with
    /// no names, and aggregates of those. Lists of such kinds are capped at
    /// [`MAX_ZERO_WIDTH_LIST_LEN`] elements.
    pub fn min_width(&self) -> usize {
        match self {
            Kind::Bool | Kind::U8 | Kind::S8 => 1,
            Kind::U16 | Kind::S16 => 2,
            Kind::U32 | Kind::S32 | Kind::F32 | Kind::Char => 4,
            Kind::U64 | Kind::S64 | Kind::F64 => 8,
            // LEB128 length, case index or a discriminant byte.
            Kind::String
            | Kind::List(_)
            | Kind::Variant(_)
            | Kind::Enum(_)
            | Kind::Option(_)
            | Kind::Result { .. } => 1,
            Kind::Record(fields) => fields.iter().map(|f| f.kind.min_width()).sum(),
            Kind::Tuple(kinds) => kinds.iter().map(Kind::min_width).sum(),
            Kind::Flags(names) => Kind::flags_width(names.len()),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::List(el) => write!(f, "list<{el}>"),
            Kind::Option(inner) => write!(f, "option<{inner}>"),
            Kind::Tuple(els) => {
                f.write_str("tuple<")?;
                for (i, el) in els.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{el}")?;
                }
                f.write_str(">")
            }
            Kind::Result { ok, err } => {
                let side = |k: &Option<Box<Kind>>| match k {
                    Some(k) => k.to_string(),
                    None => "_".to_string(),
                };
                write!(f, "result<{}, {}>", side(ok), side(err))
            }
            other => f.write_str(other.name()),
        }
    }
}

/// Parameter and result kinds of one function.
///
/// Arity is fixed by the signature: a call always carries exactly
/// `params.len()` values and a successful reply exactly `results.len()`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Signature {
    pub params: Vec<Kind>,
    pub results: Vec<Kind>,
}

impl Signature {
    pub fn new(params: Vec<Kind>, results: Vec<Kind>) -> Self {
        Self { params, results }
    }
}
