use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use ftcal_core::{CalError, ChannelSample, DATASET_HEADER, Dataset};
use proptest::prelude::*;
use tempfile::TempDir;

fn write_file(dir: &Path, name: &str, body: &str) -> PathBuf {
    let p = dir.join(name);
    fs::write(&p, body).unwrap();
    p
}

fn header() -> String {
    DATASET_HEADER.join(",")
}

fn row(ts: f64, fx: f64, raw: [i32; 8]) -> String {
    let raw: Vec<String> = raw.iter().map(i32::to_string).collect();
    format!("{ts},{fx},0,0,0,0,0,{}", raw.join(","))
}

#[test]
fn merge_concatenates_in_input_order() {
    let dir = TempDir::new().unwrap();
    let a = write_file(
        dir.path(),
        "a.csv",
        &format!("{}\n{}\n{}\n", header(), row(0.0, 1.0, [100; 8]), row(0.1, 2.0, [200; 8])),
    );
    let b = write_file(
        dir.path(),
        "b.csv",
        &format!("{}\n{}\n", header(), row(0.0, 3.0, [300; 8])),
    );

    let (ds, report) = Dataset::build(&[&a, &b]);
    assert_eq!(ds.len(), 3);
    let fx: Vec<f64> = ds.labeled().map(|(_, w)| w[0]).collect();
    assert_eq!(fx, vec![1.0, 2.0, 3.0]);
    assert_eq!(report.included, vec![a, b]);
    assert!(report.excluded.is_empty());
    assert_eq!(report.rows_kept, 3);
}

#[test]
fn wrong_header_excludes_the_file_and_merge_continues() {
    let dir = TempDir::new().unwrap();
    let bad = write_file(dir.path(), "bad.csv", "Timestamp,Fx,Fy\n0,1,2\n");
    let good = write_file(
        dir.path(),
        "good.csv",
        &format!("{}\n{}\n", header(), row(0.0, 1.0, [500; 8])),
    );
    let missing = dir.path().join("missing.csv");

    let (ds, report) = Dataset::build(&[&bad, &good, &missing]);
    assert_eq!(ds.len(), 1);
    assert_eq!(report.included, vec![good]);
    assert_eq!(report.excluded.len(), 2);
    assert_eq!(report.excluded[0].0, bad);
    assert!(matches!(report.excluded[0].1, CalError::SchemaMismatch { .. }));
    assert_eq!(report.excluded[1].0, missing);
}

#[test]
fn non_numeric_and_overloaded_rows_are_dropped_and_counted() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "{}\n{}\n{}\n{}\n{}\n{}\n",
        header(),
        row(0.0, 1.0, [500; 8]),
        "0.1,abc,0,0,0,0,0,500,500,500,500,500,500,500,500",
        "0.2,1,0,0,0,0,0,500,500,500,500,500,500,500,500.5",
        row(0.3, 1.0, [500, 500, 500, 960, 500, 500, 500, 500]),
        row(0.4, 1.0, [50, 950, 500, 500, 500, 500, 500, 500]),
    );
    let p = write_file(dir.path(), "s.csv", &body);

    let (ds, report) = Dataset::build(&[&p]);
    assert_eq!(ds.len(), 2);
    assert_eq!(report.rows_kept, 2);
    assert_eq!(report.rows_dropped_non_numeric, 2);
    assert_eq!(report.rows_dropped_overload, 1);
}

#[test]
fn integral_float_channels_are_accepted() {
    let dir = TempDir::new().unwrap();
    let body = format!(
        "{}\n0,1,0,0,0,0,0,512.0,500,500,500,500,500,500,500\n",
        header()
    );
    let p = write_file(dir.path(), "f.csv", &body);
    let (ds, _) = Dataset::build(&[&p]);
    assert_eq!(ds.samples()[0].raw[0], 512);
}

#[test]
fn write_then_read_preserves_rows() {
    let dir = TempDir::new().unwrap();
    let ds = Dataset::from_samples([
        ChannelSample::labeled(0.0, [1.5, -2.25, 9.81, 0.0, 0.125, -0.5], [100, 200, 300, 400, 500, 600, 700, 800]),
        ChannelSample::labeled(0.005, [0.0; 6], [500; 8]),
    ]);
    let p = dir.path().join("merged.csv");
    ds.write_csv(&p).unwrap();

    let text = fs::read_to_string(&p).unwrap();
    assert_eq!(text.lines().next().unwrap(), header());
    assert_eq!(text.lines().filter(|l| l.starts_with("Timestamp")).count(), 1);
    assert!(!dir.path().join("merged.csv.partial").exists());

    let back = Dataset::read_csv(&p).unwrap();
    assert_eq!(back, ds);
}

#[test]
fn read_csv_rejects_foreign_header() {
    let dir = TempDir::new().unwrap();
    let p = write_file(dir.path(), "x.csv", "a,b,c\n1,2,3\n");
    let err = Dataset::read_csv(&p).unwrap_err();
    assert!(matches!(err, CalError::SchemaMismatch { .. }));
}

fn dataset_of(n: usize) -> Dataset {
    Dataset::from_samples((0..n).map(|i| {
        ChannelSample::labeled(i as f64, [i as f64, 0.0, 0.0, 0.0, 0.0, 0.0], [500; 8])
    }))
}

#[test]
fn split_sizes_follow_rounding() {
    let ds = dataset_of(10);
    let s = ds.split(0.8, 42);
    assert_eq!(s.train.len(), 8);
    assert_eq!(s.validation.len(), 2);

    let s = dataset_of(7).split(0.8, 42);
    // round(5.6) = 6
    assert_eq!(s.train.len(), 6);
}

#[test]
fn same_seed_same_split() {
    let ds = dataset_of(200);
    let a = ds.split(0.8, 42);
    let b = ds.split(0.8, 42);
    assert_eq!(a.train_indices, b.train_indices);
    assert_eq!(a.train, b.train);
    let c = ds.split(0.8, 43);
    assert_ne!(a.train_indices, c.train_indices);
}

#[test]
fn validation_keeps_dataset_order() {
    let s = dataset_of(50).split(0.8, 1);
    assert!(s.validation_indices.windows(2).all(|w| w[0] < w[1]));
    let ts: Vec<f64> = s.validation.samples().iter().map(|x| x.timestamp).collect();
    let expected: Vec<f64> = s.validation_indices.iter().map(|&i| i as f64).collect();
    assert_eq!(ts, expected);
}

proptest! {
    #[test]
    fn split_partitions_the_dataset(n in 0usize..300, frac in 0.05f64..0.95, seed in any::<u64>()) {
        let ds = dataset_of(n);
        let s = ds.split(frac, seed);
        let train: HashSet<usize> = s.train_indices.iter().copied().collect();
        let val: HashSet<usize> = s.validation_indices.iter().copied().collect();
        prop_assert_eq!(train.len(), s.train_indices.len());
        prop_assert!(train.is_disjoint(&val));
        prop_assert_eq!(train.len() + val.len(), n);
        prop_assert!(train.union(&val).all(|&i| i < n));
        prop_assert_eq!(s.train.len(), (frac * n as f64).round() as usize);
        prop_assert_eq!(s.train.len() + s.validation.len(), ds.len());
    }
}
