//! Layout engine: wire format, round trips, schema errors.

mod common;

use std::sync::Arc;

use borsh::BorshSerialize;
use idl_coder_core::coder::Coder;
use idl_coder_core::error::{DecodeError, EncodeError, SchemaError};
use idl_coder_core::idl::{
    Idl, IdlDefinedFields, IdlEnumVariant, IdlField, IdlGenericArg, IdlType, IdlTypeDef,
    IdlTypeDefTy,
};
use idl_coder_core::layout::{Layout, LayoutEngine, MAX_RECURSION_DEPTH};
use idl_coder_core::value::{Fields, Value};
use num_bigint::BigInt;
use pretty_assertions::assert_eq;

fn engine() -> LayoutEngine {
    LayoutEngine::new(Arc::new(common::counter_idl()))
}

fn build(ty: IdlType) -> Layout {
    engine().build(&ty).unwrap()
}

fn roundtrip(layout: &Layout, value: &Value) -> Vec<u8> {
    let bytes = layout.encode_to_vec(value).unwrap();
    let (decoded, consumed) = layout.decode_with_len(&bytes).unwrap();
    assert_eq!(&decoded, value);
    assert_eq!(consumed, bytes.len());
    bytes
}

/// Every strict prefix of a valid encoding must fail to decode.
fn assert_truncation_fails(layout: &Layout, bytes: &[u8]) {
    for len in 0..bytes.len() {
        assert!(
            layout.decode(&bytes[..len]).is_err(),
            "prefix of {} byte(s) decoded: {:?}",
            len,
            layout.decode(&bytes[..len])
        );
    }
}

#[test]
fn test_empty_vec_is_length_prefix_only() {
    let bytes = roundtrip(&build(IdlType::vec(IdlType::U8)), &Value::List(vec![]));
    assert_eq!(bytes, vec![0, 0, 0, 0]);
    assert_eq!(bytes, borsh::to_vec(&Vec::<u8>::new()).unwrap());
    let bytes = roundtrip(
        &build(IdlType::vec(IdlType::defined("Counter"))),
        &Value::List(vec![]),
    );
    assert_eq!(bytes, vec![0, 0, 0, 0]);
}

#[test]
fn test_option_u8_encoding() {
    let layout = build(IdlType::option(IdlType::U8));
    assert_eq!(roundtrip(&layout, &Value::none()), vec![0x00]);
    assert_eq!(roundtrip(&layout, &Value::some(5u8)), vec![0x01, 0x05]);
    assert_eq!(
        layout.decode(&[2, 5]),
        Err(DecodeError::InvalidOptionTag { offset: 0, tag: 2 })
    );
}

#[test]
fn test_unit_enum_tags() {
    let layout = engine().build_defined("Mode").unwrap();
    assert_eq!(layout.decode(&[1]).unwrap(), Value::unit_variant("usdc"));
    assert_eq!(
        layout.decode(&[1]).unwrap().to_json(),
        serde_json::json!({ "usdc": {} })
    );
    assert_eq!(
        layout.decode(&[2]),
        Err(DecodeError::InvalidVariant {
            offset: 0,
            tag: 2,
            count: 2
        })
    );
}

#[test]
fn test_mixed_enum_variants_roundtrip() {
    let layout = engine().build_defined("Shape").unwrap();
    let circle = Value::variant("Circle", Fields::new().with("radius", 9u32));
    let rect = Value::variant("Rect", Fields::new().with("0", 3u16).with("1", 4u16));
    let empty = Value::unit_variant("Empty");

    assert_eq!(roundtrip(&layout, &circle), vec![0, 9, 0, 0, 0]);
    assert_eq!(roundtrip(&layout, &rect), vec![1, 3, 0, 4, 0]);
    assert_eq!(roundtrip(&layout, &empty), vec![2]);

    let err = layout
        .encode_to_vec(&Value::unit_variant("Triangle"))
        .unwrap_err();
    assert_eq!(
        err,
        EncodeError::UnknownVariant {
            variant: "Triangle".to_string()
        }
    );
}

#[test]
fn test_integer_extremes_roundtrip() {
    let cases: Vec<(IdlType, BigInt, BigInt)> = vec![
        (IdlType::U8, 0.into(), u8::MAX.into()),
        (IdlType::I8, i8::MIN.into(), i8::MAX.into()),
        (IdlType::U16, 0.into(), u16::MAX.into()),
        (IdlType::I16, i16::MIN.into(), i16::MAX.into()),
        (IdlType::U32, 0.into(), u32::MAX.into()),
        (IdlType::I32, i32::MIN.into(), i32::MAX.into()),
        (IdlType::U64, 0.into(), u64::MAX.into()),
        (IdlType::I64, i64::MIN.into(), i64::MAX.into()),
        (IdlType::U128, 0.into(), u128::MAX.into()),
        (IdlType::I128, i128::MIN.into(), i128::MAX.into()),
        (
            IdlType::U256,
            0.into(),
            (BigInt::from(1) << 256usize) - 1,
        ),
        (
            IdlType::I256,
            -(BigInt::from(1) << 255usize),
            (BigInt::from(1) << 255usize) - 1,
        ),
    ];

    for (ty, min, max) in cases {
        let layout = build(ty.clone());
        let size = layout.size_hint();
        for v in [&min, &max] {
            let bytes = roundtrip(&layout, &Value::Int(v.clone()));
            assert_eq!(bytes.len(), size, "{}", ty);
            assert_truncation_fails(&layout, &bytes);
        }
        let below = Value::Int(&min - 1);
        let above = Value::Int(&max + 1);
        assert!(
            matches!(layout.encode_to_vec(&below), Err(EncodeError::IntegerOutOfRange { .. })),
            "{} accepted {}",
            ty,
            below
        );
        assert!(
            matches!(layout.encode_to_vec(&above), Err(EncodeError::IntegerOutOfRange { .. })),
            "{} accepted {}",
            ty,
            above
        );
    }
}

#[test]
fn test_u256_byte_order() {
    let layout = build(IdlType::U256);
    let bytes = layout.encode_to_vec(&Value::int(0x0102u32)).unwrap();
    let mut expected = vec![0u8; 32];
    expected[0] = 0x02;
    expected[1] = 0x01;
    assert_eq!(bytes, expected);

    let minus_one = build(IdlType::I256)
        .encode_to_vec(&Value::int(-1))
        .unwrap();
    assert_eq!(minus_one, vec![0xff; 32]);
}

#[test]
fn test_strings_and_bytes() {
    let layout = build(IdlType::String);
    assert_eq!(
        roundtrip(&layout, &Value::from("hé")),
        vec![3, 0, 0, 0, b'h', 0xc3, 0xa9]
    );
    assert_eq!(roundtrip(&layout, &Value::from("")), vec![0, 0, 0, 0]);
    assert_eq!(
        layout.decode(&[2, 0, 0, 0, 0xff, 0xfe]),
        Err(DecodeError::InvalidUtf8 { offset: 4 })
    );

    let bytes = roundtrip(&build(IdlType::Bytes), &Value::Bytes(vec![9, 8, 7]));
    assert_eq!(bytes, vec![3, 0, 0, 0, 9, 8, 7]);
}

#[test]
fn test_length_prefix_beyond_buffer() {
    let layout = build(IdlType::vec(IdlType::U64));
    assert!(matches!(
        layout.decode(&[2, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]),
        Err(DecodeError::LengthOverflow { offset: 0, len: 2, .. })
    ));
    assert!(matches!(
        build(IdlType::Bytes).decode(&[0xff, 0xff, 0xff, 0x7f]),
        Err(DecodeError::LengthOverflow { .. })
    ));
}

#[test]
fn test_array_length_is_enforced() {
    let layout = build(IdlType::array(IdlType::U16, 3));
    let value = Value::List(vec![Value::int(1), Value::int(2), Value::int(3)]);
    assert_eq!(roundtrip(&layout, &value), vec![1, 0, 2, 0, 3, 0]);
    assert_eq!(
        layout
            .encode_to_vec(&Value::List(vec![Value::int(1)]))
            .unwrap_err(),
        EncodeError::ArrayLength {
            expected: 3,
            actual: 1
        }
    );
}

#[test]
fn test_zero_length_array_is_a_schema_error() {
    let err = engine()
        .build(&IdlType::array(IdlType::U8, 0))
        .unwrap_err();
    assert_eq!(
        err,
        SchemaError::ZeroLengthArray {
            ty: "u8".to_string()
        }
    );
}

#[test]
fn test_coption_and_option_are_distinct() {
    let option = build(IdlType::option(IdlType::Pubkey));
    let coption = build(IdlType::coption(IdlType::Pubkey));
    let key = Value::Pubkey(common::key(4));

    let a = roundtrip(&option, &key_some(&key));
    let b = roundtrip(&coption, &key_some(&key));
    assert_eq!(a.len(), 33);
    assert_eq!(b.len(), 36);
    assert_eq!(&b[..4], &[1, 0, 0, 0]);
    assert_eq!(roundtrip(&coption, &Value::none()), vec![0, 0, 0, 0]);
    assert_truncation_fails(&coption, &b);
}

fn key_some(key: &Value) -> Value {
    Value::Option(Some(Box::new(key.clone())))
}

#[test]
fn test_struct_roundtrip_and_truncation() {
    let layout = engine().build_defined("Registry").unwrap();
    let value = Value::Struct(
        Fields::new()
            .with(
                "names",
                Value::List(vec![Value::from("alpha"), Value::from("")]),
            )
            .with("owner", Value::some(common::key(9)))
            .with("mode", Value::unit_variant("sol"))
            .with(
                "slots",
                Value::List(vec![Value::int(1), Value::int(2), Value::int(65535)]),
            ),
    );
    let bytes = roundtrip(&layout, &value);
    assert_eq!(bytes.len(), 4 + (4 + 5) + 4 + 33 + 1 + 6);
    assert_truncation_fails(&layout, &bytes);

    let missing = Value::Struct(Fields::new().with("names", Value::List(vec![])));
    assert_eq!(
        layout.encode_to_vec(&missing).unwrap_err(),
        EncodeError::MissingField {
            field: "owner".to_string()
        }
    );
}

#[test]
fn test_trailing_bytes_are_ignored() {
    let layout = build(IdlType::U16);
    let (value, consumed) = layout.decode_with_len(&[1, 0, 0xaa, 0xbb]).unwrap();
    assert_eq!(value, Value::int(1));
    assert_eq!(consumed, 2);
}

#[test]
fn test_recursive_type_roundtrip() {
    let engine = engine();
    let layout = engine.build_defined("Node").unwrap();
    let leaf = |v: u8| {
        Value::Struct(
            Fields::new()
                .with("value", v)
                .with("children", Value::List(vec![])),
        )
    };
    let tree = Value::Struct(
        Fields::new().with("value", 1u8).with(
            "children",
            Value::List(vec![
                leaf(2),
                Value::Struct(
                    Fields::new()
                        .with("value", 3u8)
                        .with("children", Value::List(vec![leaf(4)])),
                ),
            ]),
        ),
    );
    let bytes = roundtrip(&layout, &tree);
    assert_eq!(
        bytes,
        vec![
            1, 2, 0, 0, 0, // root, two children
            2, 0, 0, 0, 0, // leaf 2
            3, 1, 0, 0, 0, // node 3, one child
            4, 0, 0, 0, 0, // leaf 4
        ]
    );
    assert_truncation_fails(&layout, &bytes);
    assert_eq!(engine.cached_len(), 1);
}

#[test]
fn test_mutually_recursive_types() {
    let mut idl = Idl::new("mutual");
    idl.types.push(struct_def(
        "Expr",
        vec![IdlField::new("terms", IdlType::vec(IdlType::defined("Term")))],
    ));
    idl.types.push(IdlTypeDef {
        name: "Term".to_string(),
        docs: vec![],
        serialization: Default::default(),
        generics: vec![],
        ty: IdlTypeDefTy::Enum {
            variants: vec![
                IdlEnumVariant {
                    name: "Lit".to_string(),
                    fields: Some(IdlDefinedFields::Tuple(vec![IdlType::I32])),
                },
                IdlEnumVariant {
                    name: "Group".to_string(),
                    fields: Some(IdlDefinedFields::Tuple(vec![IdlType::defined("Expr")])),
                },
            ],
        },
    });
    let engine = LayoutEngine::new(Arc::new(idl));
    let layout = engine.build_defined("Term").unwrap();

    let value = Value::variant(
        "Group",
        Fields::new().with(
            "0",
            Fields::new().with(
                "terms",
                Value::List(vec![Value::variant("Lit", Fields::new().with("0", -1i32))]),
            ),
        ),
    );
    let bytes = roundtrip(&layout, &value);
    assert_eq!(bytes, vec![1, 1, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
}

#[test]
fn test_generic_instantiation() {
    let engine = engine();
    let holder = engine.build_defined("Holder").unwrap();
    let value = Value::Struct(Fields::new().with(
        "pair",
        Fields::new()
            .with("first", 1u8)
            .with("rest", Value::List(vec![Value::int(2), Value::int(3)])),
    ));
    assert_eq!(roundtrip(&holder, &value), vec![1, 2, 3]);

    let wide = engine
        .build(&IdlType::Defined {
            name: "Pair".to_string(),
            generics: vec![
                IdlGenericArg::Type { ty: IdlType::U16 },
                IdlGenericArg::Const {
                    value: "1".to_string(),
                },
            ],
        })
        .unwrap();
    assert_eq!(wide.type_name(), "Pair<u16, 1>");
    assert_eq!(wide.size_hint(), 4);
}

#[test]
fn test_generic_errors() {
    let engine = engine();
    assert_eq!(
        engine.build_defined("Pair").unwrap_err(),
        SchemaError::GenericArity {
            name: "Pair".to_string(),
            expected: 2,
            actual: 0
        }
    );
    let swapped = IdlType::Defined {
        name: "Pair".to_string(),
        generics: vec![
            IdlGenericArg::Const {
                value: "1".to_string(),
            },
            IdlGenericArg::Type { ty: IdlType::U8 },
        ],
    };
    assert_eq!(
        engine.build(&swapped).unwrap_err(),
        SchemaError::GenericKind {
            name: "T".to_string(),
            expected: "type"
        }
    );
    assert_eq!(
        engine.build(&IdlType::Generic("T".to_string())).unwrap_err(),
        SchemaError::UnboundGeneric {
            name: "T".to_string()
        }
    );
}

#[test]
fn test_schema_errors() {
    let engine = engine();
    assert_eq!(
        engine.build_defined("Missing").unwrap_err(),
        SchemaError::TypeNotFound {
            name: "Missing".to_string()
        }
    );

    let mut idl = Idl::new("broken");
    idl.types.push(struct_def(
        "Dup",
        vec![
            IdlField::new("a", IdlType::U8),
            IdlField::new("a", IdlType::U16),
        ],
    ));
    idl.types.push(IdlTypeDef {
        name: "Wide".to_string(),
        docs: vec![],
        serialization: Default::default(),
        generics: vec![],
        ty: IdlTypeDefTy::Enum {
            variants: (0..257)
                .map(|i| IdlEnumVariant {
                    name: format!("V{}", i),
                    fields: None,
                })
                .collect(),
        },
    });
    idl.types.push(struct_def("Twice", vec![]));
    idl.types.push(struct_def("Twice", vec![]));
    let engine = LayoutEngine::new(Arc::new(idl));

    assert_eq!(
        engine.build_defined("Dup").unwrap_err(),
        SchemaError::DuplicateField {
            name: "Dup".to_string(),
            field: "a".to_string()
        }
    );
    assert_eq!(
        engine.build_defined("Wide").unwrap_err(),
        SchemaError::TooManyVariants {
            name: "Wide".to_string(),
            count: 257
        }
    );
    assert_eq!(
        engine.build_defined("Twice").unwrap_err(),
        SchemaError::AmbiguousType {
            name: "Twice".to_string(),
            count: 2
        }
    );
    assert_eq!(engine.cached_len(), 0);
}

#[test]
fn test_alias_encodes_as_target() {
    let layout = engine().build_defined("Amount").unwrap();
    let bytes = roundtrip(&layout, &Value::from(u128::MAX));
    assert_eq!(bytes, vec![0xff; 16]);
}

#[test]
fn test_matches_borsh_derive_output() {
    #[derive(BorshSerialize)]
    enum Shape {
        Circle { radius: u32 },
        Rect(u16, u16),
        Empty,
    }

    #[derive(BorshSerialize)]
    struct Sample {
        flag: bool,
        delta: i64,
        big: u128,
        label: String,
        tags: Vec<u8>,
        maybe: Option<u32>,
        grid: [i16; 2],
        shapes: Vec<Shape>,
    }

    let native = Sample {
        flag: true,
        delta: -42,
        big: u128::MAX - 7,
        label: "borsh".to_string(),
        tags: vec![1, 2, 3],
        maybe: Some(77),
        grid: [-1, 300],
        shapes: vec![Shape::Rect(5, 6), Shape::Empty, Shape::Circle { radius: 12 }],
    };
    let expected = borsh::to_vec(&native).unwrap();

    let mut idl = common::counter_idl();
    idl.types.push(struct_def(
        "Sample",
        vec![
            IdlField::new("flag", IdlType::Bool),
            IdlField::new("delta", IdlType::I64),
            IdlField::new("big", IdlType::U128),
            IdlField::new("label", IdlType::String),
            IdlField::new("tags", IdlType::vec(IdlType::U8)),
            IdlField::new("maybe", IdlType::option(IdlType::U32)),
            IdlField::new("grid", IdlType::array(IdlType::I16, 2)),
            IdlField::new("shapes", IdlType::vec(IdlType::defined("Shape"))),
        ],
    ));
    let engine = LayoutEngine::new(Arc::new(idl));
    let layout = engine.build_defined("Sample").unwrap();

    let value = Value::Struct(
        Fields::new()
            .with("flag", true)
            .with("delta", -42i64)
            .with("big", u128::MAX - 7)
            .with("label", "borsh")
            .with(
                "tags",
                Value::List(vec![Value::int(1), Value::int(2), Value::int(3)]),
            )
            .with("maybe", Value::some(77u32))
            .with("grid", Value::List(vec![Value::int(-1), Value::int(300)]))
            .with(
                "shapes",
                Value::List(vec![
                    Value::variant("Rect", Fields::new().with("0", 5u16).with("1", 6u16)),
                    Value::unit_variant("Empty"),
                    Value::variant("Circle", Fields::new().with("radius", 12u32)),
                ]),
            ),
    );
    assert_eq!(layout.encode_to_vec(&value).unwrap(), expected);
    assert_eq!(layout.decode(&expected).unwrap(), value);
}

#[test]
fn test_value_from_json() {
    let layout = engine().build_defined("Registry").unwrap();
    let json = serde_json::json!({
        "names": ["a"],
        "owner": null,
        "mode": "usdc",
        "slots": [1, "2", 3],
    });
    let value = layout.value_from_json(&json).unwrap();
    assert_eq!(value.get("mode"), Some(&Value::unit_variant("usdc")));
    assert_eq!(value.get("owner"), Some(&Value::none()));
    let bytes = layout.encode_to_vec(&value).unwrap();
    assert_eq!(
        bytes,
        vec![1, 0, 0, 0, 1, 0, 0, 0, b'a', 0, 1, 1, 0, 2, 0, 3, 0]
    );
}

fn struct_def(name: &str, fields: Vec<IdlField>) -> IdlTypeDef {
    IdlTypeDef {
        name: name.to_string(),
        docs: vec![],
        serialization: Default::default(),
        generics: vec![],
        ty: IdlTypeDefTy::Struct {
            fields: Some(IdlDefinedFields::Named(fields)),
        },
    }
}

fn linked_list_engine() -> LayoutEngine {
    let mut idl = Idl::new("list");
    idl.types.push(struct_def(
        "List",
        vec![IdlField::new("next", IdlType::option(IdlType::defined("List")))],
    ));
    LayoutEngine::new(Arc::new(idl))
}

#[test]
fn test_deep_input_hits_recursion_limit() {
    let layout = linked_list_engine().build_defined("List").unwrap();

    let short = layout.decode(&[1, 1, 0]).unwrap();
    let end = Value::Struct(Fields::new().with("next", Value::none()));
    let middle = Value::Struct(Fields::new().with("next", Value::some(end)));
    assert_eq!(
        short,
        Value::Struct(Fields::new().with("next", Value::some(middle)))
    );

    let mut within = vec![1u8; 50];
    within.push(0);
    assert!(layout.decode(&within).is_ok());

    let err = layout.decode(&vec![1u8; 2_000_000]).unwrap_err();
    assert!(
        matches!(err, DecodeError::RecursionLimit { limit: MAX_RECURSION_DEPTH, .. }),
        "{:?}",
        err
    );
}

#[test]
fn test_deep_tree_hits_recursion_limit() {
    let layout = engine().build_defined("Node").unwrap();
    // Every node holds a value byte and exactly one child.
    let bytes: Vec<u8> = std::iter::repeat([7u8, 1, 0, 0, 0])
        .take(200_000)
        .flatten()
        .collect();
    assert!(matches!(
        layout.decode(&bytes),
        Err(DecodeError::RecursionLimit { .. })
    ));
}

#[test]
fn test_self_containing_types_are_rejected() {
    let mut idl = Idl::new("loops");
    idl.types.push(struct_def(
        "Loop",
        vec![IdlField::new("next", IdlType::defined("Loop"))],
    ));
    idl.types.push(struct_def("A", vec![IdlField::new("b", IdlType::defined("B"))]));
    idl.types.push(struct_def("B", vec![IdlField::new("a", IdlType::defined("A"))]));
    idl.types.push(IdlTypeDef {
        name: "Same".to_string(),
        docs: vec![],
        serialization: Default::default(),
        generics: vec![],
        ty: IdlTypeDefTy::Alias {
            alias: IdlType::defined("Same"),
        },
    });
    let engine = LayoutEngine::new(Arc::new(idl.clone()));

    assert_eq!(
        engine.build_defined("Loop").unwrap_err(),
        SchemaError::InfiniteType {
            name: "Loop".to_string()
        }
    );
    assert_eq!(
        engine.build_defined("A").unwrap_err(),
        SchemaError::InfiniteType {
            name: "A".to_string()
        }
    );
    assert_eq!(
        engine.build_defined("Same").unwrap_err(),
        SchemaError::InfiniteType {
            name: "Same".to_string()
        }
    );
    assert_eq!(engine.cached_len(), 0);

    assert_eq!(
        Coder::new(idl).unwrap_err(),
        SchemaError::InfiniteType {
            name: "Loop".to_string()
        }
    );
    // Under an option the same shape is a plain linked list.
    assert!(linked_list_engine().build_defined("List").is_ok());
}

#[test]
fn test_huge_array_fails_without_allocating() {
    const LEN: usize = 1_000_000_000_000_000;
    let layout = build(IdlType::array(IdlType::U64, LEN));
    assert_eq!(layout.size_hint(), 8 * LEN);
    assert_eq!(
        layout.decode(&[9, 0, 0]),
        Err(DecodeError::UnexpectedEof {
            offset: 0,
            needed: 8 * LEN,
            remaining: 3
        })
    );
    assert_eq!(
        layout.encode_to_vec(&Value::List(vec![])),
        Err(EncodeError::ArrayLength {
            expected: LEN,
            actual: 0
        })
    );

    let nested = build(IdlType::array(IdlType::array(IdlType::U64, LEN), LEN));
    assert_eq!(nested.size_hint(), usize::MAX);
    assert_eq!(nested.min_size(), usize::MAX);
    assert!(matches!(
        nested.decode(&[]),
        Err(DecodeError::UnexpectedEof {
            needed: usize::MAX,
            ..
        })
    ));
    assert_eq!(
        build(IdlType::option(IdlType::array(IdlType::array(IdlType::U8, LEN), LEN))).size_hint(),
        usize::MAX
    );
}

#[test]
fn test_f32_out_of_range() {
    let layout = build(IdlType::F32);
    assert!(matches!(
        layout.encode_to_vec(&Value::Float(1e300)),
        Err(EncodeError::FloatOutOfRange { .. })
    ));
    assert!(matches!(
        layout.encode_to_vec(&Value::Float(-1e39)),
        Err(EncodeError::FloatOutOfRange { .. })
    ));
    assert_eq!(
        layout.encode_to_vec(&Value::Float(f64::NEG_INFINITY)).unwrap(),
        f32::NEG_INFINITY.to_le_bytes().to_vec()
    );
    assert!(layout.encode_to_vec(&Value::Float(f64::NAN)).is_ok());
    assert_eq!(roundtrip(&layout, &Value::Float(1.5)), 1.5f32.to_le_bytes().to_vec());
    // Still representable after rounding.
    assert!(layout.encode_to_vec(&Value::Float(f32::MAX as f64)).is_ok());
}
