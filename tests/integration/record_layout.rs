#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Once;

use graph_record::kv::{KvStore, MemKv};
use graph_record::storage::{FieldData, FieldSpec, FieldType, Schema, TemporalOrder};
use graph_record::telemetry;
use graph_record::{GraphRecordError, LabelId, LayoutKind, Result, StoreOptions};
use proptest::prelude::*;

const LAYOUTS: [LayoutKind; 2] = [LayoutKind::Eager, LayoutKind::SelfDescribing];

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| telemetry::init_tracing_from_env("graph_record=debug"));
}

fn schema(options: StoreOptions, fields: Vec<FieldSpec>) -> Result<Schema> {
    let mut s = Schema::new("person", LabelId(1), true, options)?;
    s.set_schema(true, fields, None, None, TemporalOrder::Ascending, Vec::new())?;
    Ok(s)
}

fn name_age(layout: LayoutKind) -> Result<Schema> {
    schema(
        StoreOptions::default().layout(layout),
        vec![
            FieldSpec::new("name", FieldType::String),
            FieldSpec::optional("age", FieldType::Int32),
        ],
    )
}

#[test]
fn name_and_age_roundtrip() -> Result<()> {
    init_tracing();
    for layout in LAYOUTS {
        let s = name_age(layout)?;
        let mut rec = s.create_empty_record(32)?;
        assert_eq!(s.get_field_data(&rec, "age")?, FieldData::Null);
        assert_eq!(s.get_field_data(&rec, "name")?, FieldData::String(String::new()));

        s.parse_and_set_str(&mut rec, "age", "42")?;
        s.parse_and_set(&mut rec, "name", &"alice".into())?;
        assert_eq!(s.get_field_data(&rec, "age")?, FieldData::Int32(42));
        assert_eq!(s.get_field_data(&rec, "name")?, FieldData::String("alice".into()));
        let expected = match layout {
            LayoutKind::Eager => "{age=42, name=alice}",
            LayoutKind::SelfDescribing => "{name=alice, age=42}",
        };
        assert_eq!(s.dump_record(&rec)?, expected);

        s.parse_and_set(&mut rec, "age", &FieldData::Null)?;
        assert!(s.get_field_extractor("age")?.get_is_null(&rec)?);
        assert_eq!(s.get_field_data(&rec, "name")?, FieldData::String("alice".into()));

        let err = s.parse_and_set(&mut rec, "name", &FieldData::Null).unwrap_err();
        assert!(matches!(err, GraphRecordError::FieldCannotBeNull(ref n) if n == "name"));
        assert!(!s.get_field_extractor("name")?.get_is_null(&rec)?);
    }
    Ok(())
}

#[test]
fn parse_errors_name_field_and_type() -> Result<()> {
    let s = name_age(LayoutKind::Eager)?;
    let mut rec = s.create_empty_record(0)?;
    let err = s.parse_and_set_str(&mut rec, "age", "forty").unwrap_err();
    assert_eq!(
        err.to_string(),
        "Failed to set field [age]: Failed to parse string into type [INT32], string is:forty"
    );
    let err = s.parse_and_set_str(&mut rec, "missing", "1").unwrap_err();
    assert_eq!(err.to_string(), "Field [missing] does not exist.");
    Ok(())
}

#[test]
fn size_limits_are_enforced() -> Result<()> {
    let fields = || {
        vec![
            FieldSpec::new("a", FieldType::String),
            FieldSpec::new("b", FieldType::String),
        ]
    };
    for layout in LAYOUTS {
        let base = schema(StoreOptions::default().layout(layout), fields())?
            .create_empty_record(0)?
            .len();
        let s = schema(
            StoreOptions::default()
                .layout(layout)
                .max_field_size(16)
                .max_record_size(base + 20),
            fields(),
        )?;
        let mut rec = s.create_empty_record(0)?;
        let err = s.parse_and_set_str(&mut rec, "a", &"x".repeat(17)).unwrap_err();
        assert!(matches!(err, GraphRecordError::DataSizeTooLarge { max: 16, given: 17 }));

        s.parse_and_set_str(&mut rec, "a", &"x".repeat(16))?;
        assert_eq!(rec.len(), base + 16);
        let err = s.parse_and_set_str(&mut rec, "b", &"y".repeat(16)).unwrap_err();
        match err {
            GraphRecordError::RecordSizeLimitExceeded { max, given } => {
                assert_eq!(max, base + 20);
                assert!(given > max);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(rec.len(), base + 16);
        assert_eq!(s.get_field_data(&rec, "a")?, FieldData::String("x".repeat(16)));
        assert_eq!(s.get_field_data(&rec, "b")?, FieldData::String(String::new()));
    }
    Ok(())
}

#[test]
fn added_field_reads_default_on_old_self_describing_records() -> Result<()> {
    init_tracing();
    let mut s = name_age(LayoutKind::SelfDescribing)?;
    let mut old = s.create_empty_record(0)?;
    s.parse_and_set_str(&mut old, "name", "alice")?;
    s.parse_and_set_str(&mut old, "age", "42")?;

    s.add_fields(vec![
        FieldSpec::new("score", FieldType::Double).with_default(FieldData::Double(0.0)),
        FieldSpec::optional("nick", FieldType::String),
    ])?;
    let score = s.get_field_extractor("score")?;
    assert!(!score.data_in_record(&old)?);
    assert!(!score.get_is_null(&old)?);
    assert_eq!(s.get_field_data(&old, "score")?, FieldData::Double(0.0));
    assert_eq!(s.get_field_data(&old, "nick")?, FieldData::Null);

    let mut upgraded = old.clone();
    s.parse_and_set(&mut upgraded, "score", &FieldData::Double(1.5))?;
    assert!(s.get_field_extractor("score")?.data_in_record(&upgraded)?);
    assert!(upgraded.len() > old.len());
    assert_eq!(s.get_field_data(&upgraded, "score")?, FieldData::Double(1.5));
    assert_eq!(s.get_field_data(&upgraded, "name")?, FieldData::String("alice".into()));
    assert_eq!(s.get_field_data(&upgraded, "age")?, FieldData::Int32(42));
    assert_eq!(s.get_field_data(&upgraded, "nick")?, FieldData::Null);
    Ok(())
}

#[test]
fn retyped_self_describing_field_converts_on_read() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = name_age(LayoutKind::SelfDescribing)?;
    let mut rec = s.create_empty_record(0)?;
    s.parse_and_set_str(&mut rec, "age", "-70000")?;

    s.mod_fields(&mut txn, vec![FieldSpec::optional("age", FieldType::Int16)])?;
    assert_eq!(s.get_field_data(&rec, "age")?, FieldData::Int16(i16::MIN));
    s.mod_fields(&mut txn, vec![FieldSpec::optional("age", FieldType::Int64)])?;
    assert_eq!(s.get_field_data(&rec, "age")?, FieldData::Int64(-70000));

    s.parse_and_set_str(&mut rec, "name", "bo")?;
    s.parse_and_set(&mut rec, "age", &FieldData::Int64(i64::MAX))?;
    assert_eq!(s.get_field_data(&rec, "age")?, FieldData::Int64(i64::MAX));
    assert_eq!(s.get_field_data(&rec, "name")?, FieldData::String("bo".into()));
    Ok(())
}

#[test]
fn deleted_self_describing_field_keeps_record_readable() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = schema(
        StoreOptions::default().layout(LayoutKind::SelfDescribing),
        vec![
            FieldSpec::new("a", FieldType::String),
            FieldSpec::new("b", FieldType::String),
            FieldSpec::new("c", FieldType::Int64),
        ],
    )?;
    let rec = s.build_record(&[
        ("a", "first".into()),
        ("b", "second".into()),
        ("c", FieldData::Int64(3)),
    ])?;
    s.del_fields(&mut txn, &["b"])?;
    assert_eq!(s.num_fields(), 2);
    assert_eq!(s.get_field_specs().len(), 3);
    assert_eq!(s.get_alive_field_specs().len(), 2);
    assert_eq!(s.get_field_id("c")?, 2);
    assert_eq!(s.get_field_data(&rec, "a")?, FieldData::String("first".into()));
    assert_eq!(s.get_field_data(&rec, "c")?, FieldData::Int64(3));
    assert_eq!(s.dump_record(&rec)?, "{a=first, c=3}");

    s.add_fields(vec![FieldSpec::optional("b", FieldType::Int8)])?;
    assert_eq!(s.get_field_id("b")?, 3);
    assert_eq!(s.get_field_data(&rec, "b")?, FieldData::Null);
    Ok(())
}

#[derive(Debug, Clone)]
enum Write {
    Set(usize, String),
    Clear(usize),
    Int(i64),
}

fn arb_write() -> impl Strategy<Value = Write> {
    prop_oneof![
        (0usize..3, "[a-z]{0,40}").prop_map(|(f, s)| Write::Set(f, s)),
        (0usize..3).prop_map(Write::Clear),
        any::<i64>().prop_map(Write::Int),
    ]
}

proptest! {
    #[test]
    fn variable_writes_keep_every_field_intact(
        eager in any::<bool>(),
        writes in prop::collection::vec(arb_write(), 1..60),
    ) {
        let layout = if eager { LayoutKind::Eager } else { LayoutKind::SelfDescribing };
        let s = schema(
            StoreOptions::default().layout(layout),
            vec![
                FieldSpec::optional("s0", FieldType::String),
                FieldSpec::new("n", FieldType::Int64),
                FieldSpec::optional("s1", FieldType::String),
                FieldSpec::optional("s2", FieldType::Blob),
            ],
        )
        .unwrap();
        let names = ["s0", "s1", "s2"];
        let mut model: HashMap<&str, Option<Vec<u8>>> = names.iter().map(|n| (*n, None)).collect();
        let mut number = 0i64;
        let mut rec = s.create_empty_record(0).unwrap();

        for w in writes {
            match w {
                Write::Set(f, text) => {
                    let data = if names[f] == "s2" {
                        FieldData::Blob(text.clone().into_bytes())
                    } else {
                        FieldData::String(text.clone())
                    };
                    s.parse_and_set(&mut rec, names[f], &data).unwrap();
                    model.insert(names[f], Some(text.into_bytes()));
                }
                Write::Clear(f) => {
                    s.parse_and_set(&mut rec, names[f], &FieldData::Null).unwrap();
                    model.insert(names[f], None);
                }
                Write::Int(v) => {
                    s.parse_and_set(&mut rec, "n", &FieldData::Int64(v)).unwrap();
                    number = v;
                }
            }
            for name in names {
                let field = s.get_field_extractor(name).unwrap();
                let got = if field.get_is_null(&rec).unwrap() {
                    None
                } else {
                    Some(field.get_const_ref(&rec).unwrap().into_owned())
                };
                prop_assert_eq!(&got, &model[name]);
            }
            prop_assert_eq!(s.get_field_data(&rec, "n").unwrap(), FieldData::Int64(number));
        }
    }
}
