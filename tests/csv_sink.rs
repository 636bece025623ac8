// tests/csv_sink.rs
use chrono::{NaiveDate, NaiveDateTime};
use er_wait_capture::observation::format_timestamp;
use er_wait_capture::sink::csv::CsvSink;
use er_wait_capture::sink::ObservationSink;
use er_wait_capture::{City, Observation};
use std::fs;

fn at(minute: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 10, 14)
        .unwrap()
        .and_hms_opt(10, minute, 0)
        .unwrap()
}

#[tokio::test]
async fn three_appends_give_one_header_and_three_rows() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(dir.path());

    for i in 0..3u32 {
        let obs = Observation::from_entries(
            at(i),
            [("Foothills Medical Centre", Some(100 + i)), ("Rockyview General Hospital", None)],
        );
        sink.persist(City::Calgary, &obs).await.unwrap();
    }

    let text = fs::read_to_string(dir.path().join("Calgary_hospital_stats.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(
        lines[0],
        "time_stamp,Foothills Medical Centre,Rockyview General Hospital"
    );
    for (i, line) in lines[1..].iter().enumerate() {
        assert_eq!(*line, format!("{},{},", format_timestamp(&at(i as u32)), 100 + i));
    }
}

#[tokio::test]
async fn later_rows_follow_the_original_header() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(dir.path());

    let first = Observation::from_entries(at(0), [("A", Some(1)), ("B", Some(2))]);
    // B dropped upstream, C added, order changed.
    let second = Observation::from_entries(at(1), [("C", Some(30)), ("A", Some(10))]);
    sink.persist(City::Edmonton, &first).await.unwrap();
    sink.persist(City::Edmonton, &second).await.unwrap();

    let mut rdr = csv::Reader::from_path(sink.path_for(City::Edmonton)).unwrap();
    let header: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, vec!["time_stamp", "A", "B"]);

    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 2);
    assert_eq!(&rows[1][1], "10");
    assert_eq!(&rows[1][2], "");
}

#[tokio::test]
async fn cities_write_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(dir.path());
    let obs = Observation::from_entries(at(0), [("X", Some(5))]);

    sink.persist(City::Calgary, &obs).await.unwrap();
    sink.persist(City::Edmonton, &obs).await.unwrap();

    assert!(dir.path().join("Calgary_hospital_stats.csv").exists());
    assert!(dir.path().join("Edmonton_hospital_stats.csv").exists());
}

#[tokio::test]
async fn unwritable_directory_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let sink = CsvSink::new(dir.path().join("missing").join("nested"));
    let obs = Observation::from_entries(at(0), [("X", Some(5))]);
    assert!(sink.persist(City::Calgary, &obs).await.is_err());
}
