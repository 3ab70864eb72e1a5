//! Tests for caseflow-model types.

use std::cmp::Ordering;

use caseflow_model::{Case, CaseMap, Dictionary, Value, VarKind, compare_keys};
use proptest::prelude::*;

fn survey_dict() -> Dictionary {
    let mut dict = Dictionary::from_vars([
        ("REGION", VarKind::String(4)),
        ("ID", VarKind::Numeric),
        ("INCOME", VarKind::Numeric),
    ])
    .unwrap();
    dict.set_split_vars(&["REGION"]).unwrap();
    dict.set_label("INCOME", Some("Household income")).unwrap();
    dict
}

#[test]
fn dictionary_serializes() {
    let dict = survey_dict();
    let json = serde_json::to_string(&dict).expect("serialize dictionary");
    let round: Dictionary = serde_json::from_str(&json).expect("deserialize dictionary");
    assert_eq!(round, dict);
    assert_eq!(round.split_positions(), vec![0]);
    assert_eq!(round.lookup("income").unwrap().label(), Some("Household income"));
}

#[test]
fn var_kind_json_shape() {
    let json = serde_json::to_string(&VarKind::String(8)).unwrap();
    assert_eq!(json, r#"{"type":"string","width":8}"#);
    let json = serde_json::to_string(&VarKind::Numeric).unwrap();
    assert_eq!(json, r#"{"type":"numeric"}"#);
}

#[test]
fn keep_then_map_existing_cases() {
    let src = survey_dict();
    let mut dst = src.clone();
    dst.keep_vars(&["INCOME", "REGION"]).unwrap();

    let map = CaseMap::between(&src, &dst).unwrap();
    let case = Case::new(vec![
        Value::string("EAST", 4),
        Value::number(7.0),
        Value::number(52_000.0),
    ]);
    let out = map.apply(case);
    assert!(dst.check_case(&out).is_ok());
    assert_eq!(out[0], Value::number(52_000.0));
    assert_eq!(out[1].to_string(), "EAST");
    assert_eq!(dst.split_positions(), vec![1]);
}

proptest! {
    #[test]
    fn numeric_compare_agrees_with_f64(a in -1e9f64..1e9, b in -1e9f64..1e9) {
        let ord = Value::number(a).compare(&Value::number(b));
        prop_assert_eq!(ord, a.partial_cmp(&b).unwrap());
    }

    #[test]
    fn key_compare_is_antisymmetric(a in proptest::collection::vec(0u8..4, 0..4),
                                    b in proptest::collection::vec(0u8..4, 0..4)) {
        let ka: Vec<Value> = a.iter().map(|&x| Value::number(f64::from(x))).collect();
        let kb: Vec<Value> = b.iter().map(|&x| Value::number(f64::from(x))).collect();
        let forward = compare_keys(&ka, &kb);
        let backward = compare_keys(&kb, &ka);
        prop_assert_eq!(forward, backward.reverse());
        if a == b {
            prop_assert_eq!(forward, Ordering::Equal);
        }
    }
}
