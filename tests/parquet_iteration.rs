use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parquet::column::writer::ColumnWriter;
use parquet::file::properties::WriterProperties;
use parquet::file::writer::SerializedFileWriter;
use parquet::schema::parser::parse_message_type;

use columnar_events::iteration::{
    count_entries, iterate, iterate_records, nth_record, BatchIter, IterOptions,
};
use columnar_events::record_count;
use columnar_events::source::BatchPolicy;
use columnar_events::types::{Column, Value};
use columnar_events::IterError;

/// Event `i` carries `i % 3` hits valued `10 * i + k`.
fn hits_of(id: i64) -> Vec<f64> {
    (0..id % 3).map(|k| (10 * id + k) as f64).collect()
}

/// Write an `Events`-style file: `id`, `pt` and a `hits` list, one row group per entry of
/// `row_groups`, ids counting up from `first_id`.
fn write_events(path: &Path, message: &str, row_groups: &[usize], first_id: i64) {
    let schema_str = format!(
        r#"
        message {message} {{
          REQUIRED INT64 id;
          REQUIRED DOUBLE pt;
          REQUIRED group hits (LIST) {{
            REPEATED group list {{
              REQUIRED DOUBLE element;
            }}
          }}
        }}
        "#
    );
    let schema = Arc::new(parse_message_type(&schema_str).unwrap());
    let props = Arc::new(WriterProperties::builder().build());
    let file = File::create(path).unwrap();
    let mut writer = SerializedFileWriter::new(file, schema, props).unwrap();

    let mut next_id = first_id;
    for &n in row_groups {
        let ids: Vec<i64> = (next_id..next_id + n as i64).collect();
        next_id += n as i64;

        let pts: Vec<f64> = ids.iter().map(|&i| i as f64 * 0.5).collect();
        let mut hit_values = Vec::new();
        let mut def_levels = Vec::new();
        let mut rep_levels = Vec::new();
        for &id in &ids {
            let hits = hits_of(id);
            if hits.is_empty() {
                def_levels.push(0);
                rep_levels.push(0);
            }
            for (k, h) in hits.into_iter().enumerate() {
                hit_values.push(h);
                def_levels.push(1);
                rep_levels.push(if k == 0 { 0 } else { 1 });
            }
        }

        let mut rg = writer.next_row_group().unwrap();
        let mut col_idx: usize = 0;
        while let Some(mut col) = rg.next_column().unwrap() {
            match col.untyped() {
                ColumnWriter::Int64ColumnWriter(w) => {
                    w.write_batch(&ids, None, None).unwrap();
                }
                ColumnWriter::DoubleColumnWriter(w) if col_idx == 1 => {
                    w.write_batch(&pts, None, None).unwrap();
                }
                ColumnWriter::DoubleColumnWriter(w) => {
                    w.write_batch(&hit_values, Some(&def_levels), Some(&rep_levels))
                        .unwrap();
                }
                _ => panic!("unexpected column writer in test"),
            }
            col.close().unwrap();
            col_idx += 1;
        }
        rg.close().unwrap();
    }
    writer.close().unwrap();
}

fn s(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

/// `a.parquet` (ids 0..12 in row groups of 4) and `b.parquet` (ids 12..22 in groups of 5).
fn two_files(dir: &Path) -> (PathBuf, PathBuf) {
    let a = dir.join("a.parquet");
    let b = dir.join("b.parquet");
    write_events(&a, "Events", &[4, 4, 4], 0);
    write_events(&b, "Events", &[5, 5], 12);
    (a, b)
}

fn ids(batch: &columnar_events::types::ColumnBatch) -> Vec<i64> {
    match batch.get("id").unwrap() {
        Column::Flat(values) => values
            .iter()
            .map(|v| match v {
                Value::Int64(i) => *i,
                other => panic!("unexpected id {other:?}"),
            })
            .collect(),
        Column::Jagged(_) => panic!("id should be flat"),
    }
}

#[test]
fn unbounded_iteration_covers_every_entry() {
    let dir = tempfile::tempdir().unwrap();
    let (a, b) = two_files(dir.path());
    let opts = IterOptions::default();

    let batches: Vec<_> = iterate(vec![s(&a), s(&b)], &opts)
        .unwrap()
        .map(Result::unwrap)
        .collect();

    // Native chunking follows row groups.
    let sizes: Vec<usize> = batches.iter().map(record_count).collect();
    assert_eq!(sizes, vec![4, 4, 4, 5, 5]);

    let total = count_entries(&s(&a), None, &opts).unwrap() + count_entries(&s(&b), None, &opts).unwrap();
    assert_eq!(sizes.iter().sum::<usize>(), total);

    let all_ids: Vec<i64> = batches.iter().flat_map(ids).collect();
    assert_eq!(all_ids, (0..22).collect::<Vec<_>>());
}

#[test]
fn budget_stays_within_one_batch_of_request() {
    let dir = tempfile::tempdir().unwrap();
    let (a, b) = two_files(dir.path());

    for budget in [1usize, 4, 6, 12, 14, 21] {
        let opts = IterOptions {
            n_max: Some(budget),
            ..Default::default()
        };
        let sizes: Vec<usize> = iterate(vec![s(&a), s(&b)], &opts)
            .unwrap()
            .map(|batch| record_count(&batch.unwrap()))
            .collect();
        let total: usize = sizes.iter().sum();
        let largest = sizes.iter().copied().max().unwrap_or(0);
        assert!(total >= budget, "budget {budget}: got {total}");
        assert!(total < budget + largest.max(1), "budget {budget}: got {total}");
    }
}

#[test]
fn budget_larger_than_data_reads_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (a, b) = two_files(dir.path());
    let opts = IterOptions {
        n_max: Some(1_000),
        ..Default::default()
    };
    let mut iter = iterate(vec![s(&a), s(&b)], &opts).unwrap();
    let total: usize = iter.by_ref().map(|b| record_count(&b.unwrap())).sum();
    assert_eq!(total, 22);
    assert_eq!(iter.remaining(), Some(1_000 - 22));
}

#[test]
fn wildcard_sources_are_sorted_and_table_path_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    two_files(dir.path());
    let pattern = s(&dir.path().join("*.parquet"));

    let mut iter: BatchIter = iterate(pattern.as_str(), &IterOptions::default()).unwrap();
    assert_eq!(iter.sources().len(), 2);
    assert!(iter.sources()[0].ends_with("a.parquet"));

    let first = iter.next().unwrap().unwrap();
    assert_eq!(ids(&first), vec![0, 1, 2, 3]);
    assert_eq!(iter.table_path(), Some("Events"));
    assert_eq!(iter.count(), 4);
}

#[test]
fn file_without_reused_table_path_fails_the_stream() {
    let dir = tempfile::tempdir().unwrap();
    let (a, _) = two_files(dir.path());
    let other = dir.path().join("c.parquet");
    write_events(&other, "Summary", &[2], 0);

    let mut iter = iterate(vec![s(&a), s(&other)], &IterOptions::default()).unwrap();
    for _ in 0..3 {
        assert!(iter.next().unwrap().is_ok());
    }
    let err = iter.next().unwrap().unwrap_err();
    assert!(matches!(err, IterError::TableNotFound { ref path, .. } if path == "Events"));
    assert!(iter.next().is_none());
}

#[test]
fn directory_containers_are_searched_depth_first() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("README.txt"), "not a table").unwrap();
    std::fs::create_dir(dir.path().join("empty")).unwrap();
    std::fs::create_dir(dir.path().join("run1")).unwrap();
    write_events(&dir.path().join("run1").join("events.parquet"), "Events", &[3], 0);

    let root = s(dir.path());
    let opts = IterOptions::default();

    let mut iter = iterate(root.as_str(), &opts).unwrap();
    assert_eq!(record_count(&iter.next().unwrap().unwrap()), 3);
    assert_eq!(iter.table_path(), Some("run1/events"));

    assert_eq!(count_entries(&root, Some("run1/events"), &opts).unwrap(), 3);
    assert!(matches!(
        count_entries(&root, Some("run1/missing"), &opts),
        Err(IterError::TableNotFound { .. })
    ));
}

#[test]
fn empty_directory_has_no_table() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
    let err = count_entries(&s(dir.path()), None, &IterOptions::default()).unwrap_err();
    assert!(err.to_string().contains("could not find any tree-like object"));
}

#[test]
fn entry_steps_and_column_projection() {
    let dir = tempfile::tempdir().unwrap();
    let (a, _) = two_files(dir.path());
    let opts = IterOptions {
        policy: BatchPolicy {
            entry_steps: Some(5),
            columns: Some(vec!["hits".to_string(), "id".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };

    let batches: Vec<_> = iterate(s(&a), &opts)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(batches.iter().map(record_count).collect::<Vec<_>>(), vec![5, 5, 2]);

    let first = &batches[0];
    let names: Vec<String> = first.keys().map(|k| k.to_string()).collect();
    assert_eq!(names, vec!["hits", "id"]);

    let hits = first.get("hits").unwrap();
    assert!(hits.is_jagged());
    assert_eq!(hits.counts().unwrap(), vec![0, 1, 2, 0, 1]);
    assert_eq!(hits.get(2), Some(Value::List(vec![Value::Float64(20.0), Value::Float64(21.0)])));
}

#[test]
fn unknown_projected_column_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let (a, _) = two_files(dir.path());
    let opts = IterOptions {
        policy: BatchPolicy {
            columns: Some(vec!["nope".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut iter = iterate(s(&a), &opts).unwrap();
    assert!(matches!(
        iter.next(),
        Some(Err(IterError::ColumnNotFound { .. }))
    ));
    assert!(iter.next().is_none());
}

#[test]
fn projection_reads_only_the_selected_columns_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let (a, _) = two_files(dir.path());
    let opts = IterOptions {
        policy: BatchPolicy {
            columns: Some(vec!["pt".to_string(), "id".to_string()]),
            ..Default::default()
        },
        ..Default::default()
    };

    let batches: Vec<_> = iterate(s(&a), &opts)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(batches.len(), 3);
    for batch in &batches {
        let names: Vec<String> = batch.keys().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["pt", "id"]);
        assert!(batch.get("hits").is_none());
    }
    assert_eq!(ids(&batches[2]), vec![8, 9, 10, 11]);
    assert_eq!(batches[1].get("pt").unwrap().get(0), Some(Value::Float64(2.0)));
}

#[test]
fn entry_window_skips_row_groups_outside_it() {
    let dir = tempfile::tempdir().unwrap();
    let (a, _) = two_files(dir.path());

    let from_last_group = IterOptions {
        policy: BatchPolicy {
            entry_start: Some(9),
            ..Default::default()
        },
        ..Default::default()
    };
    let batches: Vec<_> = iterate(s(&a), &from_last_group)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(batches.len(), 1);
    assert_eq!(ids(&batches[0]), vec![9, 10, 11]);

    let middle = IterOptions {
        policy: BatchPolicy {
            entry_start: Some(5),
            entry_stop: Some(10),
            ..Default::default()
        },
        ..Default::default()
    };
    let batches: Vec<_> = iterate(s(&a), &middle)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    let windows: Vec<Vec<i64>> = batches.iter().map(ids).collect();
    assert_eq!(windows, vec![vec![5, 6, 7], vec![8, 9]]);

    let past_the_end = IterOptions {
        policy: BatchPolicy {
            entry_start: Some(40),
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(iterate(s(&a), &past_the_end).unwrap().count(), 0);
}

#[test]
fn empty_column_selection_is_an_invalid_policy() {
    let dir = tempfile::tempdir().unwrap();
    let (a, _) = two_files(dir.path());
    let opts = IterOptions {
        policy: BatchPolicy {
            columns: Some(Vec::new()),
            ..Default::default()
        },
        ..Default::default()
    };
    let mut iter = iterate(s(&a), &opts).unwrap();
    assert!(matches!(
        iter.next(),
        Some(Err(IterError::InvalidPolicy { .. }))
    ));
    assert!(iter.next().is_none());
}

#[test]
fn records_and_nth_record_cross_files() {
    let dir = tempfile::tempdir().unwrap();
    let (a, b) = two_files(dir.path());
    let sources = vec![s(&a), s(&b)];
    let opts = IterOptions::default();

    let records: Vec<_> = iterate_records(sources.clone(), &opts)
        .unwrap()
        .map(Result::unwrap)
        .collect();
    assert_eq!(records.len(), 22);
    assert_eq!(records[5].get("pt"), Some(&Value::Float64(2.5)));

    let rec = nth_record(sources.clone(), 13, &opts).unwrap().unwrap();
    assert_eq!(rec.get("id"), Some(&Value::Int64(13)));
    assert_eq!(
        rec.get("hits"),
        Some(&Value::List(vec![Value::Float64(130.0)]))
    );
    assert!(nth_record(sources, 22, &opts).unwrap().is_none());
}

#[test]
fn missing_source_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = s(&dir.path().join("nope.parquet"));
    let mut iter = iterate(missing.as_str(), &IterOptions::default()).unwrap();
    assert!(matches!(iter.next(), Some(Err(IterError::Io(_)))));
}

#[test]
#[ignore]
fn parquet_iteration_perf_smoke_test() {
    use std::time::Instant;

    // Writes ~100k events over 10 row groups and times a full budgeted pass.
    // This is ignored by default; run with: `cargo test -- --ignored`
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perf.parquet");
    write_events(&path, "Events", &[10_000; 10], 0);

    let opts = IterOptions {
        n_max: Some(75_000),
        ..Default::default()
    };
    let start = Instant::now();
    let total: usize = iterate(s(&path), &opts)
        .unwrap()
        .map(|b| record_count(&b.unwrap()))
        .sum();
    let elapsed = start.elapsed();

    assert!(total >= 75_000);
    eprintln!("read {total} events in {elapsed:?}");
}
