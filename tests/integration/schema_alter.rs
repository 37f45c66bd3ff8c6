#![allow(missing_docs)]

use std::sync::Once;

use graph_record::kv::{KvStore, KvTransaction, MemKv};
use graph_record::storage::{
    EdgeConstraint, FieldData, FieldSpec, FieldType, FullTextEntry, IndexUniqueness, Record,
    Schema, TemporalOrder,
};
use graph_record::telemetry;
use graph_record::{
    EdgeUid, GraphRecordError, LabelId, LayoutKind, Result, StoreOptions, VertexId,
};

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| telemetry::init_tracing_from_env("graph_record=debug"));
}

fn movie(options: StoreOptions, txn: &mut dyn KvTransaction) -> Result<Schema> {
    let mut s = Schema::new("movie", LabelId(4), true, options)?;
    s.set_schema(
        true,
        vec![
            FieldSpec::new("title", FieldType::String),
            FieldSpec::new("mid", FieldType::Int64),
            FieldSpec::optional("year", FieldType::Int16),
            FieldSpec::optional("rating", FieldType::Float),
            FieldSpec::optional("plot", FieldType::String),
        ],
        Some("mid"),
        None,
        TemporalOrder::Ascending,
        Vec::new(),
    )?;
    s.add_vertex_index(txn, "mid", IndexUniqueness::GlobalUnique)?;
    s.add_vertex_index(txn, "year", IndexUniqueness::NonUnique)?;
    s.add_composite_index(txn, &["year", "title"], false)?;
    Ok(s)
}

fn film(s: &Schema, mid: i64, title: &str, year: i16) -> Result<Record> {
    s.build_record(&[
        ("mid", FieldData::Int64(mid)),
        ("title", title.into()),
        ("year", FieldData::Int16(year)),
        ("rating", FieldData::Float(7.5)),
    ])
}

fn index_all(s: &Schema, txn: &mut dyn KvTransaction, vid: u64, rec: &Record) -> Result<()> {
    s.add_vertex_to_index(txn, VertexId(vid), rec)?;
    s.add_vertex_to_composite_index(txn, VertexId(vid), rec)
}

#[test]
fn eager_records_migrate_across_alterations() -> Result<()> {
    init_tracing();
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let v1 = movie(StoreOptions::default(), &mut txn)?;
    let rec = film(&v1, 1, "Alien", 1979)?;
    index_all(&v1, &mut txn, 1, &rec)?;

    let blob = v1.store_schema()?;
    let mut v2 = Schema::load_schema(&mut txn, &blob, StoreOptions::default())?;
    v2.del_fields(&mut txn, &["plot"])?;
    v2.add_fields(vec![
        FieldSpec::new("runtime", FieldType::Int32).with_default(FieldData::Int32(90)),
        FieldSpec::optional("tagline", FieldType::String),
    ])?;
    v2.mod_fields(&mut txn, vec![FieldSpec::optional("rating", FieldType::Double)])?;

    let migrated = v2.migrate_record(&v1, &rec)?;
    assert_eq!(v2.get_field_data(&migrated, "title")?, FieldData::String("Alien".into()));
    assert_eq!(v2.get_field_data(&migrated, "runtime")?, FieldData::Int32(90));
    assert_eq!(v2.get_field_data(&migrated, "rating")?, FieldData::Double(7.5));
    assert_eq!(v2.get_field_data(&migrated, "tagline")?, FieldData::Null);
    assert!(v2.get_field_extractor("plot").is_err());
    assert!(v2.get_vertex_index("year").is_some());

    let year = v2.get_vertex_index("year").ok_or(GraphRecordError::NotFound)?;
    assert_eq!(year.lookup(&txn, &1979i16.to_le_bytes())?, vec![VertexId(1)]);
    Ok(())
}

#[test]
fn altering_fields_drops_their_indexes() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = movie(StoreOptions::default(), &mut txn)?;
    let rec = film(&s, 1, "Heat", 1995)?;
    index_all(&s, &mut txn, 1, &rec)?;

    let err = s.del_fields(&mut txn, &["mid"]).unwrap_err();
    assert_eq!(err.to_string(), "Field [mid] cannot be deleted.");
    let err = s
        .mod_fields(&mut txn, vec![FieldSpec::new("mid", FieldType::Int32)])
        .unwrap_err();
    assert!(matches!(err, GraphRecordError::InputError(_)));

    s.mod_fields(&mut txn, vec![FieldSpec::optional("year", FieldType::Int32)])?;
    assert!(s.get_vertex_index("year").is_none());
    assert!(s.get_composite_index(&["year", "title"]).is_none());
    assert!(txn.open_table("movie:vidx:year", false).is_err());
    assert!(txn.open_table("movie:cidx:year+title", false).is_err());
    assert!(s.get_vertex_index("mid").is_some());

    assert!(s.drop_index(&mut txn, "mid")?);
    s.mod_fields(&mut txn, vec![FieldSpec::new("mid", FieldType::Int32)])?;
    assert_eq!(s.get_field_extractor("mid")?.ty(), FieldType::Int32);
    Ok(())
}

#[test]
fn composite_prefix_scan_through_schema() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let s = movie(StoreOptions::default(), &mut txn)?;
    for (vid, title, year) in [(1, "Heat", 1995), (2, "Casino", 1995), (3, "Ronin", 1998)] {
        let rec = film(&s, vid, title, year)?;
        index_all(&s, &mut txn, vid as u64, &rec)?;
    }
    let untitled =
        s.build_record(&[("mid", FieldData::Int64(4)), ("year", FieldData::Int16(1995))])?;
    index_all(&s, &mut txn, 4, &untitled)?;

    let combo = s
        .get_composite_index(&["year", "title"])
        .ok_or(GraphRecordError::NotFound)?;
    let y1995 = 1995i16.to_le_bytes();
    let hits: Vec<u64> = combo
        .scan_prefix(&txn, &[&y1995[..]])?
        .map(|r| r.map(|(_, v)| v.0))
        .collect::<Result<_>>()?;
    assert_eq!(hits, vec![4, 2, 1], "empty title sorts first, then Casino, Heat");

    let rec = film(&s, 5, "Heat", 1995)?;
    assert!(!s.vertex_unique_index_conflict(&txn, &rec)?);
    let dup_mid = film(&s, 3, "Other", 2001)?;
    assert!(s.vertex_unique_index_conflict(&txn, &dup_mid)?);
    Ok(())
}

#[test]
fn edge_constraints_and_temporal_metadata() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = Schema::new("acted_in", LabelId(5), false, StoreOptions::default())?;
    let err = s
        .set_schema(
            false,
            vec![FieldSpec::new("role", FieldType::String)],
            None,
            Some("role"),
            TemporalOrder::Ascending,
            Vec::new(),
        )
        .unwrap_err();
    assert!(matches!(err, GraphRecordError::InputError(_)));

    s.set_schema(
        false,
        vec![
            FieldSpec::new("at", FieldType::DateTime),
            FieldSpec::optional("role", FieldType::String),
        ],
        None,
        Some("at"),
        TemporalOrder::Descending,
        vec![EdgeConstraint::new("person", "movie")],
    )?;
    assert_eq!(s.temporal_field(), Some("at"));
    assert_eq!(s.temporal_order(), TemporalOrder::Descending);
    assert!(s.edge_allowed("person", "movie"));
    assert!(!s.edge_allowed("movie", "person"));
    assert!(s.add_composite_index(&mut txn, &["at", "role"], false).is_err());

    s.persist(&mut txn)?;
    let back = Schema::restore(&mut txn, "acted_in", StoreOptions::default())?
        .ok_or(GraphRecordError::NotFound)?;
    assert_eq!(back.edge_constraints(), s.edge_constraints());
    assert_eq!(back.temporal_order(), TemporalOrder::Descending);
    assert!(!back.is_vertex());
    Ok(())
}

#[test]
fn options_from_json_drive_layout() -> Result<()> {
    let opts = StoreOptions::from_json(
        r#"{"layout":"self_describing","label_in_record":false,"max_field_size":8}"#,
    )?;
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = movie(opts, &mut txn)?;
    assert_eq!(s.layout(), LayoutKind::SelfDescribing);

    let mut rec = s.create_empty_record(0)?;
    assert!(s.record_label(&rec).is_err());
    assert!(matches!(
        s.parse_and_set_str(&mut rec, "title", "The Godfather"),
        Err(GraphRecordError::DataSizeTooLarge { max: 8, given: 13 })
    ));

    s.mark_fulltext("plot", true)?;
    s.parse_and_set_str(&mut rec, "plot", "heist")?;
    let mut buffers = Vec::new();
    s.add_vertex_to_fulltext_index(VertexId(3), &rec, &mut buffers)?;
    s.delete_vertex_fulltext_index(VertexId(3), &mut buffers);
    assert_eq!(
        buffers,
        vec![
            FullTextEntry::AddVertex {
                vid: VertexId(3),
                lid: LabelId(4),
                kvs: vec![("plot".into(), "heist".into())],
            },
            FullTextEntry::DeleteVertex { vid: VertexId(3) },
        ]
    );
    Ok(())
}

#[test]
fn edge_updates_move_only_changed_keys() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = Schema::new("rated", LabelId(6), false, StoreOptions::default())?;
    s.set_schema(
        false,
        vec![
            FieldSpec::new("stars", FieldType::Int8),
            FieldSpec::optional("note", FieldType::String),
        ],
        None,
        None,
        TemporalOrder::Ascending,
        Vec::new(),
    )?;
    s.add_edge_index(&mut txn, "stars", IndexUniqueness::NonUnique)?;
    s.add_edge_index(&mut txn, "note", IndexUniqueness::NonUnique)?;
    assert_eq!(s.indexed_fields().collect::<Vec<_>>(), vec!["note", "stars"]);

    let ids = s.get_field_ids(&["stars", "note"])?;
    for (id, name) in ids.iter().zip(["stars", "note"]) {
        assert_eq!(s.get_field_extractor_by_id(*id)?.name(), name);
    }

    let euid = EdgeUid::new(10, 20, 6, 0, 0);
    let old = s.build_record(&[("stars", FieldData::Int8(3)), ("note", "fine".into())])?;
    s.add_edge_to_index(&mut txn, euid, &old)?;
    let mut new = old.clone();
    s.parse_and_set(&mut new, "stars", &FieldData::Int8(5))?;
    s.update_edge_index(&mut txn, euid, &old, &new)?;
    kv.commit(txn)?;

    let read = kv.begin_read()?;
    assert!(read.is_read_only());
    let stars = s.get_edge_index("stars").ok_or(GraphRecordError::NotFound)?;
    assert!(stars.lookup(&read, &3i8.to_le_bytes())?.is_empty());
    assert_eq!(stars.lookup(&read, &5i8.to_le_bytes())?, vec![euid]);
    let note = s.get_edge_index("note").ok_or(GraphRecordError::NotFound)?;
    assert_eq!(note.lookup(&read, b"fine")?, vec![euid]);

    let bytes = new.clone().into_vec();
    assert_eq!(bytes.len(), new.len());
    assert_eq!(s.record_label(&new)?, LabelId(6));
    Ok(())
}

#[test]
fn nan_ratings_never_reach_an_index() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = movie(StoreOptions::default(), &mut txn)?;
    s.add_vertex_index(&mut txn, "rating", IndexUniqueness::NonUnique)?;

    let mut rec = film(&s, 1, "Alien", 1979)?;
    assert!(matches!(
        s.parse_and_set_str(&mut rec, "rating", "NaN"),
        Err(GraphRecordError::ParseStringFailed { .. })
    ));
    assert!(s.parse_and_set(&mut rec, "rating", &FieldData::Float(f32::NAN)).is_err());
    assert_eq!(s.get_field_data(&rec, "rating")?, FieldData::Float(7.5));

    let field = s.get_field_extractor("rating")?;
    let off = field.field_offset(&rec)?;
    rec.write_at(off, &f32::NAN.to_le_bytes())?;
    let err = s.add_vertex_to_index(&mut txn, VertexId(1), &rec).unwrap_err();
    assert!(matches!(err, GraphRecordError::InputError(_)));
    let mid = s.get_vertex_index("mid").ok_or(GraphRecordError::NotFound)?;
    assert_eq!(mid.num_keys(&txn)?, 0);
    Ok(())
}

#[test]
fn retyped_defaults_survive_store_and_load() -> Result<()> {
    let opts = StoreOptions::default().layout(LayoutKind::SelfDescribing);
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = movie(opts.clone(), &mut txn)?;
    s.add_fields(vec![
        FieldSpec::new("votes", FieldType::Int32).with_default(FieldData::Int32(300)),
    ])?;
    let old = film(&s, 1, "Alien", 1979)?;

    let err = s
        .mod_fields(
            &mut txn,
            vec![FieldSpec::new("votes", FieldType::Int8).with_default(FieldData::Int32(300))],
        )
        .unwrap_err();
    assert!(matches!(err, GraphRecordError::ParseIncompatibleType { .. }));
    assert_eq!(s.get_field_extractor("votes")?.ty(), FieldType::Int32);

    s.mod_fields(
        &mut txn,
        vec![FieldSpec::new("votes", FieldType::Int16).with_default(FieldData::Int32(300))],
    )?;
    assert_eq!(
        s.get_field_extractor("votes")?.spec().default_value,
        Some(FieldData::Int16(300))
    );
    let back = Schema::load_schema(&mut txn, &s.store_schema()?, opts.clone())?;
    assert_eq!(back.get_field_data(&old, "votes")?, FieldData::Int16(300));

    s.mod_fields(&mut txn, vec![FieldSpec::new("votes", FieldType::Int8)])?;
    let back = Schema::load_schema(&mut txn, &s.store_schema()?, opts)?;
    assert_eq!(back.get_field_extractor("votes")?.ty(), FieldType::Int8);
    assert_eq!(back.get_field_data(&old, "votes")?, FieldData::Int8(127));
    Ok(())
}

#[test]
fn detached_properties_follow_the_restored_schema() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = movie(StoreOptions::default(), &mut txn)?;
    s.set_detached(true);
    s.persist(&mut txn)?;

    let back = Schema::restore(&mut txn, "movie", StoreOptions::default())?
        .ok_or(GraphRecordError::NotFound)?;
    assert!(back.is_detached());
    let rec = film(&back, 7, "Ran", 1985)?;
    let stub = back.create_record_with_label_id()?;
    assert_eq!(back.record_label(&stub)?, LabelId(4));
    back.add_detached_vertex_property(&mut txn, VertexId(7), &rec)?;
    index_all(&back, &mut txn, 7, &rec)?;
    kv.commit(txn)?;

    let mut read = kv.begin_read()?;
    let stored = back
        .get_detached_vertex_property(&mut read, VertexId(7))?
        .ok_or(GraphRecordError::NotFound)?;
    assert_eq!(back.get_field_data(&stored, "title")?, FieldData::String("Ran".into()));
    let year = back.get_vertex_index("year").ok_or(GraphRecordError::NotFound)?;
    assert_eq!(year.lookup(&read, &1985i16.to_le_bytes())?, vec![VertexId(7)]);
    Ok(())
}
