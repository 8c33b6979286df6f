//! Static bindings between Rust types and wire kinds.
//!
//! [`Wire`] is what generated stubs would implement for every interface
//! type; the `wire_*` macros stand in for that generator. [`WireTuple`]
//! covers the parameter and result lists of a function.

use super::{DecodeError, Kind, Signature, Value};

/// A Rust type with a fixed wire [`Kind`].
///
/// `into_value` and `from_value` must be inverse over conforming values.
/// The `payload` methods describe how the type appears as an optional
/// payload (result sides, variant cases); only `()` means "no payload".
pub trait Wire: Sized {
    fn kind() -> Kind;

    fn into_value(self) -> Value;

    /// # Errors
    ///
    /// Returns [`DecodeError::Mismatch`] when `value` has the wrong shape.
    fn from_value(value: Value) -> Result<Self, DecodeError>;

    fn payload_kind() -> Option<Kind> {
        Some(Self::kind())
    }

    fn into_payload(self) -> Option<Value> {
        Some(self.into_value())
    }

    fn from_payload(payload: Option<Value>) -> Result<Self, DecodeError> {
        match payload {
            Some(value) => Self::from_value(value),
            None => Err(DecodeError::Mismatch {
                expected: Self::kind().name(),
                found: "nothing",
            }),
        }
    }
}

/// A parameter or result list of fixed arity.
pub trait WireTuple: Sized {
    fn kinds() -> Vec<Kind>;

    fn into_values(self) -> Vec<Value>;

    fn from_values(values: Vec<Value>) -> Result<Self, DecodeError>;
}

impl Signature {
    /// Signature of a function taking `P` and returning `R`.
    pub fn of<P: WireTuple, R: WireTuple>() -> Self {
        Self::new(P::kinds(), R::kinds())
    }
}

fn mismatch(expected: &Kind, found: &Value) -> DecodeError {
    DecodeError::Mismatch {
        expected: expected.name(),
        found: found.shape(),
    }
}

macro_rules! impl_wire_scalar {
    ($($ty:ty => $case:ident),* $(,)?) => {
        $(
            impl Wire for $ty {
                fn kind() -> Kind {
                    Kind::$case
                }

                fn into_value(self) -> Value {
                    Value::$case(self)
                }

                fn from_value(value: Value) -> Result<Self, DecodeError> {
                    match value {
                        Value::$case(v) => Ok(v),
                        other => Err(mismatch(&Kind::$case, &other)),
                    }
                }
            }
        )*
    };
}

impl_wire_scalar! {
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

impl Wire for () {
    fn kind() -> Kind {
        Kind::Tuple(Vec::new())
    }

    fn into_value(self) -> Value {
        Value::Tuple(Vec::new())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Tuple(items) if items.is_empty() => Ok(()),
            other => Err(mismatch(&Self::kind(), &other)),
        }
    }

    fn payload_kind() -> Option<Kind> {
        None
    }

    fn into_payload(self) -> Option<Value> {
        None
    }

    fn from_payload(payload: Option<Value>) -> Result<Self, DecodeError> {
        match payload {
            None => Ok(()),
            Some(other) => Err(DecodeError::Mismatch {
                expected: "nothing",
                found: other.shape(),
            }),
        }
    }
}

impl<T: Wire> Wire for Vec<T> {
    fn kind() -> Kind {
        Kind::list(T::kind())
    }

    fn into_value(self) -> Value {
        Value::List(self.into_iter().map(Wire::into_value).collect())
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch(&Self::kind(), &other)),
        }
    }
}

impl<T: Wire> Wire for Option<T> {
    fn kind() -> Kind {
        Kind::option(T::kind())
    }

    fn into_value(self) -> Value {
        Value::Option(self.map(|v| Box::new(v.into_value())))
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Option(inner) => inner.map(|v| T::from_value(*v)).transpose(),
            other => Err(mismatch(&Self::kind(), &other)),
        }
    }
}

impl<T: Wire, E: Wire> Wire for Result<T, E> {
    fn kind() -> Kind {
        Kind::result(T::payload_kind(), E::payload_kind())
    }

    fn into_value(self) -> Value {
        match self {
            Ok(v) => Value::ok(v.into_payload()),
            Err(e) => Value::err(e.into_payload()),
        }
    }

    fn from_value(value: Value) -> Result<Self, DecodeError> {
        match value {
            Value::Result(Ok(payload)) => T::from_payload(payload.map(|v| *v)).map(Ok),
            Value::Result(Err(payload)) => E::from_payload(payload.map(|v| *v)).map(Err),
            other => Err(mismatch(&Self::kind(), &other)),
        }
    }
}

impl WireTuple for () {
    fn kinds() -> Vec<Kind> {
        Vec::new()
    }

    fn into_values(self) -> Vec<Value> {
        Vec::new()
    }

    fn from_values(values: Vec<Value>) -> Result<Self, DecodeError> {
        if !values.is_empty() {
            return Err(DecodeError::ArityMismatch {
                expected: 0,
                found: values.len(),
            });
        }
        Ok(())
    }
}

macro_rules! impl_wire_tuple {
    ($len:literal; $($ty:ident $var:ident),+) => {
        impl<$($ty: Wire),+> WireTuple for ($($ty,)+) {
            fn kinds() -> Vec<Kind> {
                vec![$($ty::kind()),+]
            }

            fn into_values(self) -> Vec<Value> {
                let ($($var,)+) = self;
                vec![$($var.into_value()),+]
            }

            fn from_values(values: Vec<Value>) -> Result<Self, DecodeError> {
                if values.len() != $len {
                    return Err(DecodeError::ArityMismatch {
                        expected: $len,
                        found: values.len(),
                    });
                }
                let mut values = values.into_iter();
                $(
                    let $var = values.next().ok_or(DecodeError::ArityMismatch {
                        expected: $len,
                        found: 0,
                    })?;
                )+
                Ok(($($ty::from_value($var)?,)+))
            }
        }

        impl<$($ty: Wire),+> Wire for ($($ty,)+) {
            fn kind() -> Kind {
                Kind::Tuple(<Self as WireTuple>::kinds())
            }

            fn into_value(self) -> Value {
                Value::Tuple(self.into_values())
            }

            fn from_value(value: Value) -> Result<Self, DecodeError> {
                match value {
                    Value::Tuple(items) => Self::from_values(items),
                    other => Err(mismatch(&Self::kind(), &other)),
                }
            }
        }
    };
}

impl_wire_tuple!(1; A a);
impl_wire_tuple!(2; A a, B b);
impl_wire_tuple!(3; A a, B b, C c);
impl_wire_tuple!(4; A a, B b, C c, D d);
impl_wire_tuple!(5; A a, B b, C c, D d, E e);
impl_wire_tuple!(6; A a, B b, C c, D d, E e, F f);
impl_wire_tuple!(7; A a, B b, C c, D d, E e, F f, G g);
impl_wire_tuple!(8; A a, B b, C c, D d, E e, F f, G g, H h);
impl_wire_tuple!(9; A a, B b, C c, D d, E e, F f, G g, H h, I i);
impl_wire_tuple!(10; A a, B b, C c, D d, E e, F f, G g, H h, I i, J j);
impl_wire_tuple!(11; A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k);
impl_wire_tuple!(12; A a, B b, C c, D d, E e, F f, G g, H h, I i, J j, K k, L l);
