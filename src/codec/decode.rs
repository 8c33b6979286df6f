use bytes::Buf;

use super::{leb128, DecodeError, Kind, Value, MAX_ZERO_WIDTH_LIST_LEN};

/// Decode a complete message of `kind`.
///
/// # Errors
///
/// Fails on truncated input, invalid discriminants, out-of-range case
/// indices, unknown flag bits, malformed strings, or trailing bytes.
pub fn decode(mut bytes: &[u8], kind: &Kind) -> Result<Value, DecodeError> {
    let value = decode_from(&mut bytes, kind)?;
    ensure_consumed(bytes)?;
    Ok(value)
}

/// Decode a parameter or result tuple with the arity given by `kinds`.
pub fn decode_tuple(mut bytes: &[u8], kinds: &[Kind]) -> Result<Vec<Value>, DecodeError> {
    let mut values = Vec::with_capacity(kinds.len());
    for kind in kinds {
        values.push(decode_from(&mut bytes, kind)?);
    }
    ensure_consumed(bytes)?;
    Ok(values)
}

/// Decode one value of `kind` from the front of `buf`, advancing it.
pub fn decode_from(buf: &mut &[u8], kind: &Kind) -> Result<Value, DecodeError> {
    let value = match kind {
        Kind::Bool => {
            need(buf, 1)?;
            match buf.get_u8() {
                0 => Value::Bool(false),
                1 => Value::Bool(true),
                other => return Err(DecodeError::InvalidBool(other)),
            }
        }
        Kind::U8 => {
            need(buf, 1)?;
            Value::U8(buf.get_u8())
        }
        Kind::U16 => {
            need(buf, 2)?;
            Value::U16(buf.get_u16_le())
        }
        Kind::U32 => {
            need(buf, 4)?;
            Value::U32(buf.get_u32_le())
        }
        Kind::U64 => {
            need(buf, 8)?;
            Value::U64(buf.get_u64_le())
        }
        Kind::S8 => {
            need(buf, 1)?;
            Value::S8(buf.get_i8())
        }
        Kind::S16 => {
            need(buf, 2)?;
            Value::S16(buf.get_i16_le())
        }
        Kind::S32 => {
            need(buf, 4)?;
            Value::S32(buf.get_i32_le())
        }
        Kind::S64 => {
            need(buf, 8)?;
            Value::S64(buf.get_i64_le())
        }
        Kind::F32 => {
            need(buf, 4)?;
            Value::F32(buf.get_f32_le())
        }
        Kind::F64 => {
            need(buf, 8)?;
            Value::F64(buf.get_f64_le())
        }
        Kind::Char => {
            need(buf, 4)?;
            let scalar = buf.get_u32_le();
            Value::Char(char::from_u32(scalar).ok_or(DecodeError::InvalidChar(scalar))?)
        }
        Kind::String => {
            let len = get_len(buf)?;
            need(buf, len)?;
            let rest: &[u8] = *buf;
            let (head, tail) = rest.split_at(len);
            let s = std::str::from_utf8(head).map_err(|_| DecodeError::InvalidUtf8)?;
            let value = Value::String(s.to_owned());
            *buf = tail;
            value
        }
        Kind::List(element) => {
            let len = get_len(buf)?;
            let width = element.min_width();
            if width == 0 {
                if len > MAX_ZERO_WIDTH_LIST_LEN {
                    return Err(DecodeError::ListTooLong {
                        len,
                        max: MAX_ZERO_WIDTH_LIST_LEN,
                    });
                }
            } else {
                need(buf, len.saturating_mul(width))?;
            }
            let mut items = Vec::with_capacity(len);
            for _ in 0..len {
                items.push(decode_from(buf, element)?);
            }
            Value::List(items)
        }
        Kind::Record(fields) => {
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                values.push(decode_from(buf, &field.kind)?);
            }
            Value::Record(values)
        }
        Kind::Tuple(kinds) => {
            let mut values = Vec::with_capacity(kinds.len());
            for kind in kinds {
                values.push(decode_from(buf, kind)?);
            }
            Value::Tuple(values)
        }
        Kind::Variant(cases) => {
            let index = leb128::get_u32(buf)?;
            let case = usize::try_from(index)
                .ok()
                .and_then(|i| cases.get(i))
                .ok_or(DecodeError::CaseOutOfRange {
                    kind: "variant",
                    index,
                    cases: cases.len(),
                })?;
            let payload = match &case.payload {
                Some(kind) => Some(Box::new(decode_from(buf, kind)?)),
                None => None,
            };
            Value::Variant {
                case: index,
                payload,
            }
        }
        Kind::Enum(cases) => {
            let index = leb128::get_u32(buf)?;
            if usize::try_from(index).map_or(true, |i| i >= cases.len()) {
                return Err(DecodeError::CaseOutOfRange {
                    kind: "enum",
                    index,
                    cases: cases.len(),
                });
            }
            Value::Enum(index)
        }
        Kind::Flags(names) => {
            let width = Kind::flags_width(names.len());
            need(buf, width)?;
            let rest: &[u8] = *buf;
            let (packed, tail) = rest.split_at(width);
            let mut bits = Vec::with_capacity(names.len());
            for bit in 0..width * 8 {
                let set = packed[bit / 8] & (1 << (bit % 8)) != 0;
                if bit < names.len() {
                    bits.push(set);
                } else if set {
                    return Err(DecodeError::UnknownFlag {
                        bit,
                        declared: names.len(),
                    });
                }
            }
            *buf = tail;
            Value::Flags(bits)
        }
        Kind::Option(inner) => {
            need(buf, 1)?;
            match buf.get_u8() {
                0 => Value::Option(None),
                1 => Value::Option(Some(Box::new(decode_from(buf, inner)?))),
                other => return Err(DecodeError::InvalidOptionDiscriminant(other)),
            }
        }
        Kind::Result { ok, err } => {
            need(buf, 1)?;
            match buf.get_u8() {
                0 => Value::Result(Ok(decode_payload(buf, ok.as_deref())?)),
                1 => Value::Result(Err(decode_payload(buf, err.as_deref())?)),
                other => return Err(DecodeError::InvalidResultDiscriminant(other)),
            }
        }
    };
    Ok(value)
}

fn decode_payload(buf: &mut &[u8], kind: Option<&Kind>) -> Result<Option<Box<Value>>, DecodeError> {
    match kind {
        Some(kind) => Ok(Some(Box::new(decode_from(buf, kind)?))),
        None => Ok(None),
    }
}

fn need(buf: &[u8], n: usize) -> Result<(), DecodeError> {
    if buf.len() < n {
        return Err(DecodeError::Truncated {
            needed: n - buf.len(),
            remaining: buf.len(),
        });
    }
    Ok(())
}

fn get_len(buf: &mut &[u8]) -> Result<usize, DecodeError> {
    let len = leb128::get_u32(buf)?;
    usize::try_from(len).map_err(|_| DecodeError::LengthOverflow)
}

fn ensure_consumed(rest: &[u8]) -> Result<(), DecodeError> {
    if !rest.is_empty() {
        return Err(DecodeError::TrailingBytes {
            remaining: rest.len(),
        });
    }
    Ok(())
}
