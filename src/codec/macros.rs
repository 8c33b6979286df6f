//! Declarative stand-ins for stub-generated interface types.
//!
//! The functions in this module are support code for the exported
//! `wire_*` macros and are not part of the public API.

use super::{DecodeError, Value, Wire};

/// Generate a record struct and its [`Wire`] impl.
///
/// Fields go on the wire in declaration order.
///
/// ```
/// pubsub_rpc::wire_record! {
///     pub struct Point { pub x: i32, pub y: i32 }
/// }
/// ```
#[macro_export]
macro_rules! wire_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis struct $name {
            $($fvis $field: $ty),*
        }

        impl $crate::codec::Wire for $name {
            fn kind() -> $crate::codec::Kind {
                $crate::codec::Kind::Record(vec![
                    $($crate::codec::Field::new(
                        stringify!($field),
                        <$ty as $crate::codec::Wire>::kind(),
                    )),*
                ])
            }

            fn into_value(self) -> $crate::codec::Value {
                $crate::codec::Value::Record(vec![
                    $($crate::codec::Wire::into_value(self.$field)),*
                ])
            }

            fn from_value(
                value: $crate::codec::Value,
            ) -> ::std::result::Result<Self, $crate::codec::DecodeError> {
                const FIELDS: &[&str] = &[$(stringify!($field)),*];
                let mut fields = $crate::codec::macros::record_fields(value, FIELDS.len())?;
                Ok(Self {
                    $($field: $crate::codec::macros::next_field(&mut fields)?),*
                })
            }
        }
    };
}

/// Generate a variant enum and its [`Wire`] impl.
///
/// Case indices follow declaration order. A case carries at most one
/// payload type.
///
/// ```
/// pubsub_rpc::wire_variant! {
///     pub enum Shape { Circle(f64), Empty }
/// }
/// ```
#[macro_export]
macro_rules! wire_variant {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($case:ident $(($payload:ty))?),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq)]
        $vis enum $name {
            $($case $(($payload))?),*
        }

        impl $name {
            const CASES: &'static [&'static str] = &[$(stringify!($case)),*];
        }

        impl $crate::codec::Wire for $name {
            fn kind() -> $crate::codec::Kind {
                $crate::codec::Kind::Variant(vec![
                    $($crate::codec::Case::new(
                        stringify!($case),
                        <$crate::__wire_payload_ty!($($payload)?) as $crate::codec::Wire>::payload_kind(),
                    )),*
                ])
            }

            fn into_value(self) -> $crate::codec::Value {
                match self {
                    $(
                        Self::$case $(($crate::__wire_bind!(inner, $payload)))? => {
                            $crate::codec::Value::variant(
                                $crate::codec::macros::case_index(Self::CASES, stringify!($case)),
                                None $(.or($crate::codec::Wire::into_payload(
                                    $crate::__wire_bind!(inner, $payload),
                                )))?,
                            )
                        }
                    )*
                }
            }

            fn from_value(
                value: $crate::codec::Value,
            ) -> ::std::result::Result<Self, $crate::codec::DecodeError> {
                let (index, payload) = $crate::codec::macros::variant_parts(value)?;
                $(
                    if index == $crate::codec::macros::case_index(Self::CASES, stringify!($case)) {
                        #[allow(unused_variables)]
                        let inner = <$crate::__wire_payload_ty!($($payload)?) as $crate::codec::Wire>::from_payload(payload)?;
                        return Ok(Self::$case $(($crate::__wire_bind!(inner, $payload)))?);
                    }
                )*
                Err($crate::codec::macros::case_out_of_range("variant", index, Self::CASES))
            }
        }
    };
}

/// Generate a payload-free enum and its [`Wire`] impl.
#[macro_export]
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($case:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($case),*
        }

        impl $name {
            const CASES: &'static [&'static str] = &[$(stringify!($case)),*];
        }

        impl $crate::codec::Wire for $name {
            fn kind() -> $crate::codec::Kind {
                $crate::codec::Kind::enumeration(Self::CASES.iter().copied())
            }

            fn into_value(self) -> $crate::codec::Value {
                let name = match self {
                    $(Self::$case => stringify!($case)),*
                };
                $crate::codec::Value::Enum($crate::codec::macros::case_index(Self::CASES, name))
            }

            fn from_value(
                value: $crate::codec::Value,
            ) -> ::std::result::Result<Self, $crate::codec::DecodeError> {
                let index = $crate::codec::macros::enum_index(value)?;
                $(
                    if index == $crate::codec::macros::case_index(Self::CASES, stringify!($case)) {
                        return Ok(Self::$case);
                    }
                )*
                Err($crate::codec::macros::case_out_of_range("enum", index, Self::CASES))
            }
        }
    };
}

/// Generate a flags struct of `bool` fields and its [`Wire`] impl.
///
/// Flag `i` is bit `i` of the packed bitset, in declaration order.
#[macro_export]
macro_rules! wire_flags {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($flag:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
        $vis struct $name {
            $(pub $flag: bool),*
        }

        impl $crate::codec::Wire for $name {
            fn kind() -> $crate::codec::Kind {
                $crate::codec::Kind::Flags(vec![$(stringify!($flag).to_string()),*])
            }

            fn into_value(self) -> $crate::codec::Value {
                $crate::codec::Value::Flags(vec![$(self.$flag),*])
            }

            fn from_value(
                value: $crate::codec::Value,
            ) -> ::std::result::Result<Self, $crate::codec::DecodeError> {
                const FLAGS: &[&str] = &[$(stringify!($flag)),*];
                let mut bits = $crate::codec::macros::flag_bits(value, FLAGS.len())?;
                Ok(Self {
                    $($flag: bits.next().unwrap_or(false)),*
                })
            }
        }
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __wire_bind {
    ($binding:ident, $ty:ty) => {
        $binding
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __wire_payload_ty {
    () => {
        ()
    };
    ($ty:ty) => {
        $ty
    };
}

#[doc(hidden)]
pub fn case_index(cases: &[&str], name: &str) -> u32 {
    cases
        .iter()
        .position(|case| *case == name)
        .and_then(|i| u32::try_from(i).ok())
        .unwrap_or(u32::MAX)
}

#[doc(hidden)]
pub fn case_out_of_range(kind: &'static str, index: u32, cases: &[&str]) -> DecodeError {
    DecodeError::CaseOutOfRange {
        kind,
        index,
        cases: cases.len(),
    }
}

#[doc(hidden)]
pub fn record_fields(
    value: Value,
    expected: usize,
) -> Result<std::vec::IntoIter<Value>, DecodeError> {
    match value {
        Value::Record(fields) if fields.len() == expected => Ok(fields.into_iter()),
        Value::Record(fields) => Err(DecodeError::ArityMismatch {
            expected,
            found: fields.len(),
        }),
        other => Err(DecodeError::Mismatch {
            expected: "record",
            found: other.shape(),
        }),
    }
}

#[doc(hidden)]
pub fn next_field<T: Wire>(fields: &mut std::vec::IntoIter<Value>) -> Result<T, DecodeError> {
    let value = fields.next().ok_or(DecodeError::Mismatch {
        expected: "record field",
        found: "nothing",
    })?;
    T::from_value(value)
}

#[doc(hidden)]
pub fn variant_parts(value: Value) -> Result<(u32, Option<Value>), DecodeError> {
    match value {
        Value::Variant { case, payload } => Ok((case, payload.map(|v| *v))),
        other => Err(DecodeError::Mismatch {
            expected: "variant",
            found: other.shape(),
        }),
    }
}

#[doc(hidden)]
pub fn enum_index(value: Value) -> Result<u32, DecodeError> {
    match value {
        Value::Enum(index) => Ok(index),
        other => Err(DecodeError::Mismatch {
            expected: "enum",
            found: other.shape(),
        }),
    }
}

#[doc(hidden)]
pub fn flag_bits(value: Value, expected: usize) -> Result<std::vec::IntoIter<bool>, DecodeError> {
    match value {
        Value::Flags(bits) if bits.len() == expected => Ok(bits.into_iter()),
        Value::Flags(bits) => Err(DecodeError::ArityMismatch {
            expected,
            found: bits.len(),
        }),
        other => Err(DecodeError::Mismatch {
            expected: "flags",
            found: other.shape(),
        }),
    }
}
