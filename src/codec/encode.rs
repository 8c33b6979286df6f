use bytes::{BufMut, Bytes, BytesMut};

use super::{leb128, EncodeError, Kind, Value, MAX_ZERO_WIDTH_LIST_LEN};

/// Encode `value` as `kind`.
///
/// Deterministic: the same logical value always yields the same bytes for a
/// given kind.
///
/// # Errors
///
/// Returns an [`EncodeError`] when the value does not conform to the kind.
pub fn encode(value: &Value, kind: &Kind) -> Result<Bytes, EncodeError> {
    let mut buf = BytesMut::new();
    encode_into(value, kind, &mut buf)?;
    Ok(buf.freeze())
}

/// Encode a parameter or result tuple.
///
/// Elements are written back-to-back; the arity lives in the signature, not
/// on the wire.
pub fn encode_tuple(values: &[Value], kinds: &[Kind]) -> Result<Bytes, EncodeError> {
    if values.len() != kinds.len() {
        return Err(EncodeError::ArityMismatch {
            kind: "tuple",
            expected: kinds.len(),
            found: values.len(),
        });
    }
    let mut buf = BytesMut::new();
    for (value, kind) in values.iter().zip(kinds) {
        encode_into(value, kind, &mut buf)?;
    }
    Ok(buf.freeze())
}

/// Append the encoding of `value` as `kind` to `buf`.
pub fn encode_into(value: &Value, kind: &Kind, buf: &mut BytesMut) -> Result<(), EncodeError> {
    match (kind, value) {
        (Kind::Bool, Value::Bool(v)) => buf.put_u8(u8::from(*v)),
        (Kind::U8, Value::U8(v)) => buf.put_u8(*v),
        (Kind::U16, Value::U16(v)) => buf.put_u16_le(*v),
        (Kind::U32, Value::U32(v)) => buf.put_u32_le(*v),
        (Kind::U64, Value::U64(v)) => buf.put_u64_le(*v),
        (Kind::S8, Value::S8(v)) => buf.put_i8(*v),
        (Kind::S16, Value::S16(v)) => buf.put_i16_le(*v),
        (Kind::S32, Value::S32(v)) => buf.put_i32_le(*v),
        (Kind::S64, Value::S64(v)) => buf.put_i64_le(*v),
        (Kind::F32, Value::F32(v)) => buf.put_f32_le(*v),
        (Kind::F64, Value::F64(v)) => buf.put_f64_le(*v),
        (Kind::Char, Value::Char(v)) => buf.put_u32_le(u32::from(*v)),
        (Kind::String, Value::String(s)) => {
            put_len(buf, s.len())?;
            buf.put_slice(s.as_bytes());
        }
        (Kind::List(element), Value::List(items)) => {
            if element.min_width() == 0 && items.len() > MAX_ZERO_WIDTH_LIST_LEN {
                return Err(EncodeError::ListTooLong {
                    len: items.len(),
                    max: MAX_ZERO_WIDTH_LIST_LEN,
                });
            }
            put_len(buf, items.len())?;
            for item in items {
                encode_into(item, element, buf)?;
            }
        }
        (Kind::Record(fields), Value::Record(values)) => {
            check_arity("record", fields.len(), values.len())?;
            for (field, value) in fields.iter().zip(values) {
                encode_into(value, &field.kind, buf)?;
            }
        }
        (Kind::Tuple(kinds), Value::Tuple(values)) => {
            check_arity("tuple", kinds.len(), values.len())?;
            for (kind, value) in kinds.iter().zip(values) {
                encode_into(value, kind, buf)?;
            }
        }
        (Kind::Variant(cases), Value::Variant { case, payload }) => {
            let declared = usize::try_from(*case)
                .ok()
                .and_then(|i| cases.get(i))
                .ok_or(EncodeError::CaseOutOfRange {
                    kind: "variant",
                    index: *case,
                    cases: cases.len(),
                })?;
            leb128::put_u32(buf, *case);
            match (&declared.payload, payload) {
                (Some(kind), Some(value)) => encode_into(value, kind, buf)?,
                (None, None) => {}
                (declared, present) => {
                    return Err(EncodeError::PayloadMismatch {
                        case: *case,
                        declared: declared.is_some(),
                        present: present.is_some(),
                    })
                }
            }
        }
        (Kind::Enum(cases), Value::Enum(case)) => {
            if usize::try_from(*case).map_or(true, |i| i >= cases.len()) {
                return Err(EncodeError::CaseOutOfRange {
                    kind: "enum",
                    index: *case,
                    cases: cases.len(),
                });
            }
            leb128::put_u32(buf, *case);
        }
        (Kind::Flags(names), Value::Flags(bits)) => {
            check_arity("flags", names.len(), bits.len())?;
            let mut packed = vec![0u8; Kind::flags_width(names.len())];
            for (i, set) in bits.iter().enumerate() {
                if *set {
                    packed[i / 8] |= 1 << (i % 8);
                }
            }
            buf.put_slice(&packed);
        }
        (Kind::Option(inner), Value::Option(v)) => match v {
            None => buf.put_u8(0),
            Some(v) => {
                buf.put_u8(1);
                encode_into(v, inner, buf)?;
            }
        },
        (Kind::Result { ok, err }, Value::Result(v)) => {
            let (discriminant, kind, payload) = match v {
                Ok(payload) => (0u8, ok, payload),
                Err(payload) => (1u8, err, payload),
            };
            buf.put_u8(discriminant);
            match (kind, payload) {
                (Some(kind), Some(value)) => encode_into(value, kind, buf)?,
                (None, None) => {}
                (kind, payload) => {
                    return Err(EncodeError::PayloadMismatch {
                        case: u32::from(discriminant),
                        declared: kind.is_some(),
                        present: payload.is_some(),
                    })
                }
            }
        }
        (kind, value) => {
            return Err(EncodeError::Mismatch {
                expected: kind.name(),
                found: value.shape(),
            })
        }
    }
    Ok(())
}

fn put_len(buf: &mut BytesMut, len: usize) -> Result<(), EncodeError> {
    let len32 = u32::try_from(len).map_err(|_| EncodeError::LengthOverflow(len))?;
    leb128::put_u32(buf, len32);
    Ok(())
}

fn check_arity(kind: &'static str, expected: usize, found: usize) -> Result<(), EncodeError> {
    if expected != found {
        return Err(EncodeError::ArityMismatch {
            kind,
            expected,
            found,
        });
    }
    Ok(())
}
