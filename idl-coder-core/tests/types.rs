//! Types codec: user-defined types without discriminators.

mod common;

use idl_coder_core::error::{CoderError, ErrorKind};
use idl_coder_core::value::{Fields, Value};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_shape_variants() {
    let coder = common::counter_coder();
    let types = coder.types();

    let cases = [
        (
            Value::variant("Circle", Fields::new().with("radius", 300u32)),
            vec![0, 0x2c, 0x01, 0, 0],
        ),
        (
            Value::variant("Rect", Fields::new().with("0", 1u16).with("1", 2u16)),
            vec![1, 1, 0, 2, 0],
        ),
        (Value::unit_variant("Empty"), vec![2]),
    ];
    for (value, bytes) in cases {
        assert_eq!(types.encode("Shape", &value).unwrap(), bytes);
        assert_eq!(types.decode("Shape", &bytes).unwrap(), value);
    }
    assert_eq!(types.size("Shape").unwrap(), 1 + 4);
}

#[test]
fn test_encode_json() {
    let coder = common::counter_coder();
    let bytes = coder
        .types()
        .encode_json("Shape", &json!({ "Circle": { "radius": 7 } }))
        .unwrap();
    assert_eq!(bytes, vec![0, 7, 0, 0, 0]);
    assert_eq!(
        coder.types().encode_json("Mode", &json!("sol")).unwrap(),
        vec![0]
    );
}

#[test]
fn test_alias_and_recursive_types() {
    let coder = common::counter_coder();
    assert_eq!(coder.types().size("Amount").unwrap(), 16);

    let node = Value::Struct(
        Fields::new().with("value", 9u8).with(
            "children",
            Value::List(vec![Value::Struct(
                Fields::new()
                    .with("value", 8u8)
                    .with("children", Value::List(vec![])),
            )]),
        ),
    );
    let bytes = coder.types().encode("Node", &node).unwrap();
    assert_eq!(bytes, vec![9, 1, 0, 0, 0, 8, 0, 0, 0, 0]);
    assert_eq!(coder.types().decode("Node", &bytes).unwrap(), node);
}

#[test]
fn test_generic_holder() {
    let coder = common::counter_coder();
    let value = Value::Struct(Fields::new().with(
        "pair",
        Fields::new()
            .with("first", 4u8)
            .with("rest", Value::Bytes(vec![5, 6])),
    ));
    let bytes = coder.types().encode("Holder", &value).unwrap();
    assert_eq!(bytes, vec![4, 5, 6]);
    assert_eq!(coder.types().size("Holder").unwrap(), 3);
}

#[test]
fn test_names_that_are_not_plain_types() {
    let coder = common::counter_coder();
    let types = coder.types();

    let err = types.encode("Counter", &Value::Struct(Fields::new())).unwrap_err();
    assert_eq!(
        err,
        CoderError::AccountAsType {
            name: "Counter".to_string()
        }
    );
    assert_eq!(err.kind(), ErrorKind::Usage);

    assert_eq!(
        types.size("Pair").unwrap_err(),
        CoderError::GenericType {
            name: "Pair".to_string()
        }
    );
    assert_eq!(
        types.decode("Missing", &[]).unwrap_err(),
        CoderError::UnknownType {
            name: "Missing".to_string()
        }
    );
}

#[test]
fn test_decode_errors_are_classified() {
    let coder = common::counter_coder();
    let err = coder.types().decode("Shape", &[7]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decode);
    let err = coder
        .types()
        .encode("Shape", &Value::unit_variant("Hexagon"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Encode);
}
