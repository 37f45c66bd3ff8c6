#![allow(missing_docs)]

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use std::sync::Once;

use graph_record::kv::{KvStore, KvTransaction, MemKv};
use graph_record::storage::index::{KeyCodec, VertexIndex};
use graph_record::storage::{
    FieldData, FieldSpec, FieldType, IndexUniqueness, Schema, TemporalOrder,
};
use graph_record::telemetry;
use graph_record::{
    EdgeUid, GraphRecordError, IndexOptions, LabelId, Result, StoreOptions, VertexId,
};
use proptest::prelude::*;
use tempfile::tempdir;

fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| telemetry::init_tracing_from_env("graph_record=debug"));
}

fn people(txn: &mut dyn KvTransaction, split_threshold: usize) -> Result<Schema> {
    let mut s = Schema::new(
        "person",
        LabelId(1),
        true,
        StoreOptions::default().split_threshold(split_threshold),
    )?;
    s.set_schema(
        true,
        vec![
            FieldSpec::new("uid", FieldType::Int64),
            FieldSpec::optional("city", FieldType::String),
            FieldSpec::optional("born", FieldType::Date),
        ],
        Some("uid"),
        None,
        TemporalOrder::Ascending,
        Vec::new(),
    )?;
    s.add_vertex_index(txn, "uid", IndexUniqueness::GlobalUnique)?;
    s.add_vertex_index(txn, "city", IndexUniqueness::NonUnique)?;
    s.add_vertex_index(txn, "born", IndexUniqueness::NonUnique)?;
    Ok(s)
}

fn insert(
    s: &Schema,
    txn: &mut dyn KvTransaction,
    vid: u64,
    city: &str,
    born: &str,
) -> Result<()> {
    let mut rec = s.build_record(&[("uid", FieldData::Int64(vid as i64)), ("city", city.into())])?;
    s.parse_and_set_str(&mut rec, "born", born)?;
    s.add_vertex_to_index(txn, VertexId(vid), &rec)
}

fn vids(idx: &VertexIndex, txn: &dyn KvTransaction, key: &[u8]) -> Result<Vec<u64>> {
    Ok(idx.lookup(txn, key)?.into_iter().map(u64::from).collect())
}

#[test]
fn ids_under_one_key_come_back_sorted() -> Result<()> {
    init_tracing();
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let s = people(&mut txn, 1000)?;
    for vid in [5, 1, 9, 3] {
        insert(&s, &mut txn, vid, "Lima", "1990-01-01")?;
    }
    let city = s.get_vertex_index("city").ok_or(GraphRecordError::NotFound)?;
    assert_eq!(vids(city, &txn, b"Lima")?, vec![1, 3, 5, 9]);
    assert_eq!(city.num_keys(&txn)?, 1);
    kv.commit(txn)?;

    let txn = kv.begin_read()?;
    let all: Vec<u64> = city
        .iter(&txn, None, None)?
        .map(|r| r.map(|(_, v)| v.0))
        .collect::<Result<_>>()?;
    assert_eq!(all, vec![1, 3, 5, 9]);
    Ok(())
}

#[test]
fn split_keeps_scan_order() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    // one count byte plus three 5-byte ids
    let s = people(&mut txn, 16)?;
    for vid in [40, 10, 30] {
        insert(&s, &mut txn, vid, "Oslo", "2000-02-02")?;
    }
    let city = s.get_vertex_index("city").ok_or(GraphRecordError::NotFound)?;
    assert_eq!(city.num_keys(&txn)?, 1);
    insert(&s, &mut txn, 20, "Oslo", "2000-02-02")?;
    assert_eq!(city.num_keys(&txn)?, 2);
    assert_eq!(vids(city, &txn, b"Oslo")?, vec![10, 20, 30, 40]);

    insert(&s, &mut txn, 25, "Oslo", "2000-02-02")?;
    insert(&s, &mut txn, 99, "Bergen", "2000-02-02")?;
    let scan: Vec<(Vec<u8>, u64)> = city
        .iter(&txn, None, None)?
        .map(|r| r.map(|(k, v)| (k, v.0)))
        .collect::<Result<_>>()?;
    let order: Vec<u64> = scan.iter().map(|(_, v)| *v).collect();
    assert_eq!(order, vec![99, 10, 20, 25, 30, 40]);
    assert!(scan.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(city.dump(&txn)?.len(), city.num_keys(&txn)?);
    Ok(())
}

#[test]
fn date_range_scans() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let s = people(&mut txn, 1000)?;
    insert(&s, &mut txn, 1, "A", "1969-12-31")?;
    insert(&s, &mut txn, 2, "A", "1970-01-01")?;
    insert(&s, &mut txn, 3, "A", "1999-06-15")?;
    insert(&s, &mut txn, 4, "A", "2024-02-29")?;

    let born = s.get_vertex_index("born").ok_or(GraphRecordError::NotFound)?;
    let day = |d: i32| d.to_le_bytes();
    let (lo, hi) = (day(0), day(11_000));
    let mut it = born.iter(&txn, Some(&lo[..]), Some(&hi[..]))?;
    let hits: Vec<u64> = it.by_ref().map(|r| r.map(|(_, v)| v.0)).collect::<Result<_>>()?;
    assert_eq!(hits, vec![2, 3]);
    assert!(it.key_out_of_range());

    let before_epoch: Vec<u64> = born
        .range(&txn, Bound::Unbounded, Bound::Excluded(&lo[..]), None)?
        .map(|r| r.map(|(_, v)| v.0))
        .collect::<Result<_>>()?;
    assert_eq!(before_epoch, vec![1]);

    let (_, first) = born
        .iter(&txn, None, None)?
        .next()
        .ok_or(GraphRecordError::NotFound)??;
    assert_eq!(first, VertexId(1));
    let (last_key, last) = born
        .iter(&txn, None, None)?
        .last()
        .ok_or(GraphRecordError::NotFound)??;
    assert_eq!(last, VertexId(4));
    assert_eq!(born.codec().decode(&last_key)?, vec![FieldData::Date(19_782)]);
    Ok(())
}

#[test]
fn pair_unique_edges_scope_to_endpoints() -> Result<()> {
    let kv = MemKv::new();
    let mut txn = kv.begin_write()?;
    let mut s = Schema::new("follows", LabelId(2), false, StoreOptions::default())?;
    s.set_schema(
        false,
        vec![
            FieldSpec::new("since", FieldType::DateTime),
            FieldSpec::optional("via", FieldType::String),
        ],
        None,
        Some("since"),
        TemporalOrder::Descending,
        Vec::new(),
    )?;
    s.add_edge_index(&mut txn, "via", IndexUniqueness::PairUnique)?;
    s.add_edge_index(&mut txn, "since", IndexUniqueness::NonUnique)?;

    let mut rec = s.create_empty_record(0)?;
    s.parse_and_set_str(&mut rec, "since", "2024-05-01 10:00:00")?;
    s.parse_and_set_str(&mut rec, "via", "app")?;

    s.add_edge_to_index(&mut txn, EdgeUid::new(1, 2, 2, 0, 0), &rec)?;
    s.add_edge_to_index(&mut txn, EdgeUid::new(1, 3, 2, 0, 0), &rec)?;
    let err = s
        .add_edge_to_index(&mut txn, EdgeUid::new(1, 2, 2, 7, 1), &rec)
        .unwrap_err();
    assert!(err.to_string().starts_with("Failed to index edge with field value [via:app]"));

    let since = s.get_edge_index("since").ok_or(GraphRecordError::NotFound)?;
    let raw = s.get_field_extractor("since")?.get_const_ref(&rec)?;
    assert_eq!(since.lookup(&txn, &raw)?.len(), 2, "failed edge was rolled back");
    let via = s.get_edge_index("via").ok_or(GraphRecordError::NotFound)?;
    let edges = via.lookup(&txn, b"app")?;
    assert_eq!(edges, vec![EdgeUid::new(1, 2, 2, 0, 0), EdgeUid::new(1, 3, 2, 0, 0)]);
    Ok(())
}

#[test]
fn bulk_built_index_survives_snapshot() -> Result<()> {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("kv.snapshot");
    {
        let kv = MemKv::new();
        let mut txn = kv.begin_write()?;
        let s = people(&mut txn, 64)?;
        let city = s.get_vertex_index("city").ok_or(GraphRecordError::NotFound)?;
        let bulk: Vec<VertexId> = (100..160).map(VertexId).collect();
        city.append_sorted(&mut txn, b"Quito", &bulk)?;
        city.set_ready(true);
        s.persist(&mut txn)?;
        kv.commit(txn)?;
        kv.save_snapshot(&path)?;
    }

    let kv = MemKv::load_snapshot(&path)?;
    let mut txn = kv.begin_write()?;
    let s = Schema::restore(&mut txn, "person", StoreOptions::default())?
        .ok_or(GraphRecordError::NotFound)?;
    let city = s.get_vertex_index("city").ok_or(GraphRecordError::NotFound)?;
    assert!(city.is_ready());
    assert!(!s.get_vertex_index("born").is_some_and(|i| i.is_ready()));
    let got = vids(city, &txn, b"Quito")?;
    assert_eq!(got, (100..160).collect::<Vec<_>>());
    assert!(city.num_keys(&txn)? > 1);

    insert(&s, &mut txn, 130, "Quito", "2001-01-01").unwrap_err();
    insert(&s, &mut txn, 7, "Quito", "2001-01-01")?;
    assert_eq!(vids(city, &txn, b"Quito")?.first(), Some(&7));
    Ok(())
}

#[derive(Debug, Clone)]
enum Op {
    Add(i64, u64),
    Delete(i64, u64),
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0i64..6, 0u64..200).prop_map(|(k, v)| Op::Add(k, v)),
        1 => (0i64..6, 0u64..200).prop_map(|(k, v)| Op::Delete(k, v)),
    ]
}

proptest! {
    #[test]
    fn packed_index_matches_model(
        threshold in 11usize..64,
        ops in prop::collection::vec(arb_op(), 1..300),
    ) {
        let kv = MemKv::new();
        let mut txn = kv.begin_write().unwrap();
        let idx = VertexIndex::open(
            &mut txn,
            "score",
            KeyCodec::Single(FieldType::Int64),
            IndexUniqueness::NonUnique,
            IndexOptions { split_threshold: threshold, ..IndexOptions::default() },
        )
        .unwrap();
        let mut model: BTreeMap<i64, BTreeSet<u64>> = BTreeMap::new();
        for op in ops {
            match op {
                Op::Add(k, v) => {
                    let added = idx.add(&mut txn, &k.to_le_bytes(), VertexId(v)).unwrap();
                    prop_assert_eq!(added, model.entry(k).or_default().insert(v));
                }
                Op::Delete(k, v) => {
                    let removed = idx.delete(&mut txn, &k.to_le_bytes(), VertexId(v)).unwrap();
                    let expected = model.get_mut(&k).is_some_and(|set| set.remove(&v));
                    prop_assert_eq!(removed, expected);
                }
            }
        }
        let scanned: Vec<(i64, u64)> = idx
            .iter(&txn, None, None)
            .unwrap()
            .map(|r| {
                let (key, vid) = r.unwrap();
                match idx.codec().decode(&key).unwrap()[..] {
                    [FieldData::Int64(k)] => (k, vid.0),
                    _ => panic!("unexpected key"),
                }
            })
            .collect();
        let expected: Vec<(i64, u64)> = model
            .iter()
            .flat_map(|(k, set)| set.iter().map(move |v| (*k, *v)))
            .collect();
        prop_assert_eq!(scanned, expected);
    }
}
