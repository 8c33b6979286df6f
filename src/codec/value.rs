//! Dynamic values.
//!
//! A [`Value`] only has meaning together with the [`Kind`](super::Kind) it is
//! encoded or decoded against. Records, tuples and flags are positional;
//! variant and enum cases are identified by index.

/// A dynamically typed wire value.
///
/// Equality is structural. Floats compare with IEEE semantics, so a `NaN`
/// never equals itself.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    S8(i8),
    S16(i16),
    S32(i32),
    S64(i64),
    F32(f32),
    F64(f64),
    Char(char),
    String(String),
    List(Vec<Value>),
    /// Field values in declaration order.
    Record(Vec<Value>),
    Tuple(Vec<Value>),
    Variant {
        case: u32,
        payload: Option<Box<Value>>,
    },
    Enum(u32),
    /// One entry per declared flag, in declaration order.
    Flags(Vec<bool>),
    Option(Option<Box<Value>>),
    Result(std::result::Result<Option<Box<Value>>, Option<Box<Value>>>),
}

impl Value {
    pub fn some(value: Value) -> Self {
        Value::Option(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Value::Option(None)
    }

    pub fn ok(payload: Option<Value>) -> Self {
        Value::Result(Ok(payload.map(Box::new)))
    }

    pub fn err(payload: Option<Value>) -> Self {
        Value::Result(Err(payload.map(Box::new)))
    }

    pub fn variant(case: u32, payload: Option<Value>) -> Self {
        Value::Variant {
            case,
            payload: payload.map(Box::new),
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// Short name of the value's shape, for error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::U8(_) => "u8",
            Value::U16(_) => "u16",
            Value::U32(_) => "u32",
            Value::U64(_) => "u64",
            Value::S8(_) => "s8",
            Value::S16(_) => "s16",
            Value::S32(_) => "s32",
            Value::S64(_) => "s64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Char(_) => "char",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Tuple(_) => "tuple",
            Value::Variant { .. } => "variant",
            Value::Enum(_) => "enum",
            Value::Flags(_) => "flags",
            Value::Option(_) => "option",
            Value::Result(_) => "result",
        }
    }
}

macro_rules! impl_from_primitive {
    ($($ty:ty => $case:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$case(v)
                }
            }
        )*
    };
}

impl_from_primitive! {
    bool => Bool,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    i8 => S8,
    i16 => S16,
    i32 => S32,
    i64 => S64,
    f32 => F32,
    f64 => F64,
    char => Char,
    String => String,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}
