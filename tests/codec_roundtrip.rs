// tests/codec_roundtrip.rs

//! Property tests: any value conforming to any kind survives
//! encode/decode unchanged, and re-encoding is byte-stable.

use proptest::collection::vec;
use proptest::prelude::*;

use pubsub_rpc::codec::{decode, decode_tuple, encode, encode_tuple, Case, Field, Kind, Value};

fn arb_leaf_kind() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::Bool),
        Just(Kind::U8),
        Just(Kind::U16),
        Just(Kind::U32),
        Just(Kind::U64),
        Just(Kind::S8),
        Just(Kind::S16),
        Just(Kind::S32),
        Just(Kind::S64),
        Just(Kind::F32),
        Just(Kind::F64),
        Just(Kind::Char),
        Just(Kind::String),
        (1usize..5).prop_map(|n| Kind::enumeration((0..n).map(|i| format!("e{i}")))),
        (0usize..20).prop_map(|n| Kind::flags((0..n).map(|i| format!("f{i}")))),
    ]
}

fn arb_kind() -> impl Strategy<Value = Kind> {
    arb_leaf_kind().prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(Kind::list),
            inner.clone().prop_map(Kind::option),
            (
                proptest::option::of(inner.clone()),
                proptest::option::of(inner.clone())
            )
                .prop_map(|(ok, err)| Kind::result(ok, err)),
            vec(inner.clone(), 0..4).prop_map(|kinds| {
                Kind::Record(
                    kinds
                        .into_iter()
                        .enumerate()
                        .map(|(i, kind)| Field::new(format!("field{i}"), kind))
                        .collect(),
                )
            }),
            vec(inner.clone(), 0..4).prop_map(Kind::Tuple),
            vec(proptest::option::of(inner), 1..4).prop_map(|payloads| {
                Kind::Variant(
                    payloads
                        .into_iter()
                        .enumerate()
                        .map(|(i, payload)| Case::new(format!("case{i}"), payload))
                        .collect(),
                )
            }),
        ]
    })
}

/// Values conforming to `kind`. Floats exclude NaN, which never equals itself.
fn arb_value(kind: &Kind) -> BoxedStrategy<Value> {
    match kind {
        Kind::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        Kind::U8 => any::<u8>().prop_map(Value::U8).boxed(),
        Kind::U16 => any::<u16>().prop_map(Value::U16).boxed(),
        Kind::U32 => any::<u32>().prop_map(Value::U32).boxed(),
        Kind::U64 => any::<u64>().prop_map(Value::U64).boxed(),
        Kind::S8 => any::<i8>().prop_map(Value::S8).boxed(),
        Kind::S16 => any::<i16>().prop_map(Value::S16).boxed(),
        Kind::S32 => any::<i32>().prop_map(Value::S32).boxed(),
        Kind::S64 => any::<i64>().prop_map(Value::S64).boxed(),
        Kind::F32 => any::<f32>()
            .prop_filter("NaN", |f| !f.is_nan())
            .prop_map(Value::F32)
            .boxed(),
        Kind::F64 => any::<f64>()
            .prop_filter("NaN", |f| !f.is_nan())
            .prop_map(Value::F64)
            .boxed(),
        Kind::Char => any::<char>().prop_map(Value::Char).boxed(),
        Kind::String => ".{0,24}".prop_map(Value::String).boxed(),
        Kind::List(element) => vec(arb_value(element), 0..5).prop_map(Value::List).boxed(),
        Kind::Record(fields) => fields
            .iter()
            .map(|field| arb_value(&field.kind))
            .collect::<Vec<_>>()
            .prop_map(Value::Record)
            .boxed(),
        Kind::Tuple(kinds) => kinds
            .iter()
            .map(arb_value)
            .collect::<Vec<_>>()
            .prop_map(Value::Tuple)
            .boxed(),
        Kind::Variant(cases) => {
            let arms = cases
                .iter()
                .enumerate()
                .map(|(i, case)| {
                    let index = i as u32;
                    optional_payload(case.payload.as_ref())
                        .prop_map(move |payload| Value::variant(index, payload))
                        .boxed()
                })
                .collect::<Vec<_>>();
            proptest::strategy::Union::new(arms).boxed()
        }
        Kind::Enum(cases) => (0..cases.len() as u32).prop_map(Value::Enum).boxed(),
        Kind::Flags(names) => vec(any::<bool>(), names.len()).prop_map(Value::Flags).boxed(),
        Kind::Option(inner) => proptest::option::of(arb_value(inner))
            .prop_map(|inner| Value::Option(inner.map(Box::new)))
            .boxed(),
        Kind::Result { ok, err } => prop_oneof![
            optional_payload(ok.as_deref()).prop_map(Value::ok),
            optional_payload(err.as_deref()).prop_map(Value::err),
        ]
        .boxed(),
    }
}

fn optional_payload(kind: Option<&Kind>) -> BoxedStrategy<Option<Value>> {
    match kind {
        Some(kind) => arb_value(kind).prop_map(Some).boxed(),
        None => Just(None).boxed(),
    }
}

fn arb_kind_and_value() -> impl Strategy<Value = (Kind, Value)> {
    arb_kind().prop_flat_map(|kind| {
        let values = arb_value(&kind);
        (Just(kind), values)
    })
}

proptest! {
    #[test]
    fn roundtrip_any_kind((kind, value) in arb_kind_and_value()) {
        let bytes = encode(&value, &kind).unwrap();
        let back = decode(&bytes, &kind).unwrap();
        prop_assert_eq!(&back, &value);

        let again = encode(&back, &kind).unwrap();
        prop_assert_eq!(again, bytes);
    }

    #[test]
    fn roundtrip_parameter_lists(pairs in vec(arb_kind_and_value(), 0..6)) {
        let (kinds, values): (Vec<Kind>, Vec<Value>) = pairs.into_iter().unzip();
        let bytes = encode_tuple(&values, &kinds).unwrap();
        let back = decode_tuple(&bytes, &kinds).unwrap();
        prop_assert_eq!(back.len(), kinds.len());
        prop_assert_eq!(back, values);
    }

    #[test]
    fn truncated_input_never_panics((kind, value) in arb_kind_and_value(), cut in any::<prop::sample::Index>()) {
        let bytes = encode(&value, &kind).unwrap();
        if !bytes.is_empty() {
            let cut = cut.index(bytes.len());
            // Shorter input either fails or, for nested zero-width tails,
            // decodes to something; it must not panic.
            let _ = decode(&bytes[..cut], &kind);
        }
    }

    #[test]
    fn trailing_bytes_are_rejected((kind, value) in arb_kind_and_value(), extra in 1u8..=255) {
        let mut bytes = encode(&value, &kind).unwrap().to_vec();
        bytes.push(extra);
        prop_assert!(decode(&bytes, &kind).is_err());
    }
}
