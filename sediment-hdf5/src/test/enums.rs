use sediment_base::ErrorKind;
use test_log::test;

use crate::enums::{EnumArray, EnumType, EnumValue};

fn color() -> EnumType {
    EnumType::new("Color", &["RED", "GREEN", "BLUE"]).unwrap()
}

fn wide(n: usize) -> EnumType {
    let names: Vec<String> = (0..n).map(|i| format!("V{i}")).collect();
    let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    EnumType::new("Wide", &refs).unwrap()
}

#[test]
fn test_scalar_value_round_trip() {
    let v = EnumValue::from_name(color(), "GREEN").unwrap();
    assert_eq!(v.ordinal(), 1);
    assert_eq!(v.as_str(), "GREEN");
    let v = EnumValue::new(color(), 2).unwrap();
    assert_eq!(v.as_str(), "BLUE");
}

#[test]
fn test_scalar_validation() {
    let e = EnumValue::new(color(), 3).unwrap_err();
    assert!(matches!(
        e.kind(),
        ErrorKind::OrdinalOutOfRange {
            ordinal: 3,
            cardinality: 3
        }
    ));
    let e = EnumValue::from_name(color(), "PINK").unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::UnknownEnumValue(v) if v == "PINK"));
}

#[test]
fn test_storage_width_tracks_cardinality() {
    assert_eq!(wide(127).storage_width(), 1);
    assert_eq!(wide(128).storage_width(), 2);
    assert_eq!(wide(32_768).storage_width(), 4);
    let arr = EnumArray::from_ordinals(wide(128), vec![2], &[0, 127]).unwrap();
    assert_eq!(arr.storage_width(), 2);
}

#[test]
fn test_array_from_names_and_back() {
    let arr = EnumArray::from_names(color(), vec![2, 2], &["RED", "BLUE", "GREEN", "RED"]).unwrap();
    assert_eq!(arr.storage_width(), 1);
    assert_eq!(arr.ordinals(), vec![0, 2, 1, 0]);
    assert_eq!(arr.names(), vec!["RED", "BLUE", "GREEN", "RED"]);
}

#[test]
fn test_array_validates_every_ordinal() {
    let e = EnumArray::from_ordinals(color(), vec![3], &[0, 1, 5]).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::OrdinalOutOfRange { ordinal: 5, .. }));
    let e = EnumArray::from_ordinals(color(), vec![2], &[0]).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::ShapeMismatch(_)));
}

#[test]
fn test_widen_then_narrow_round_trips() {
    let arr = EnumArray::from_ordinals(color(), vec![3], &[0, 1, 2]).unwrap();
    let wide4 = arr.clone().with_storage_width(4).unwrap();
    assert_eq!(wide4.storage_width(), 4);
    let back = wide4.with_storage_width(1).unwrap();
    assert_eq!(back.ordinals(), arr.ordinals());
    assert_eq!(back.storage_width(), 1);
}

#[test]
fn test_narrowing_overflow() {
    let arr = EnumArray::from_ordinals(wide(200), vec![1], &[180]).unwrap();
    let e = arr.with_storage_width(1).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::NarrowingOverflow(180)));
}
