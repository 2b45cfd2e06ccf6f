// End-to-end passes over in-memory sheets.
// CI: 256 cases (default). Soak: PROPTEST_CASES=10000 cargo test --release

use capsync_engine::cell::CellValue;
use capsync_engine::sheet::Sheet;
use capsync_recon::headers::match_headers;
use capsync_recon::model::{PassOutcome, PassStage, VisualState};
use capsync_recon::report::{MemoryReporter, Severity};
use capsync_recon::session::{PassLabel, Session};
use capsync_recon::staleness;
use capsync_recon::style;
use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

const LABEL: PassLabel<'static> = PassLabel {
    dump: "dump-enhancements.xlsx",
    destination: "capacity-tracker.xlsx",
};

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn text_sheet(name: &str, rows: &[&[&str]]) -> Sheet {
    Sheet::from_rows(
        name,
        rows.iter()
            .map(|r| r.iter().map(|v| CellValue::from(*v)).collect::<Vec<_>>()),
    )
}

fn run_once(dump: &Sheet, dest: &mut Sheet) -> (PassOutcome, MemoryReporter) {
    let mut reporter = MemoryReporter::new();
    let mut session = Session::new(today());
    let outcome = session.run_pass(LABEL, dump, dest, &mut reporter).clone();
    (outcome, reporter)
}

/// All stored values, ordered by coordinate. Styles are left out.
fn values(sheet: &Sheet) -> Vec<((usize, usize), CellValue)> {
    let mut v: Vec<_> = sheet
        .cells_iter()
        .filter(|(_, c)| !c.value.is_empty())
        .map(|(&pos, c)| (pos, c.value.clone()))
        .collect();
    v.sort_by_key(|(pos, _)| *pos);
    v
}

// ---------------------------------------------------------------------------
// Worked examples
// ---------------------------------------------------------------------------

#[test]
fn new_key_appends_one_row() {
    let dump = text_sheet(
        "Sheet1",
        &[
            &["Number", "Status", "Priority", "Assigned to"],
            &["INC00042", "Closed", "4 - Low", "ann"],
        ],
    );
    let mut dest = text_sheet(
        "Hypercare Incidents",
        &[&["Number", "Priority", "Status", "Assigned to"], &["INC00001", "1 - Critical", "Open", "bob"]],
    );

    let (outcome, _) = run_once(&dump, &mut dest);

    assert_eq!(outcome.rows_appended, 1);
    assert_eq!(outcome.cells_updated, 0);
    assert_eq!(dest.max_row(), 3);
    assert_eq!(dest.value(3, 1), &CellValue::from("INC00042"));
    assert_eq!(dest.value(3, 3), &CellValue::from("Closed"));
    assert_eq!(dest.value(3, 2), &CellValue::from("4 - Low"));
    assert_eq!(dest.style(3, 3), style::UPDATED);
    // Existing row untouched apart from being absent from the dump
    assert_eq!(dest.value(2, 3), &CellValue::from("Open"));
    assert_eq!(dest.style(2, 3), style::style_for(VisualState::None));
}

#[test]
fn changed_value_is_updated() {
    let dump = text_sheet("Sheet1", &[&["Number", "Priority"], &["ENH00007", "3 - High"]]);
    let mut dest = text_sheet(
        "Hypercare Enhancements",
        &[&["Number", "Priority"], &["ENH00007", "2 - Medium"]],
    );

    let (outcome, _) = run_once(&dump, &mut dest);

    assert_eq!(outcome.cells_updated, 1);
    assert_eq!(outcome.rows_appended, 0);
    assert_eq!(dest.value(2, 2), &CellValue::from("3 - High"));
    assert_eq!(dest.style(2, 2), style::UPDATED);
    assert_eq!(outcome.count_state(VisualState::Updated), 1);
}

#[test]
fn duplicate_dump_keys_abort_pass() {
    let dump = text_sheet(
        "Sheet1",
        &[&["Number", "Status"], &["DFC00099", "Open"], &["DFC00099", "Closed"]],
    );
    let mut dest = text_sheet("Hypercare Defects", &[&["Number", "Status"], &["DFC00001", "Open"]]);
    let before = dest.clone();

    let (outcome, reporter) = run_once(&dump, &mut dest);

    assert_eq!(outcome.stage, PassStage::Aborted);
    assert_eq!(outcome.dump_duplicates.len(), 1);
    assert_eq!(outcome.dump_duplicates[0].key, "DFC00099");
    assert_eq!(outcome.dump_duplicates[0].count, 2);
    assert!(outcome.touched.is_empty());
    assert_eq!(dest, before);

    let errors = reporter.texts(Severity::Error);
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("'DFC00099' occurrences: 2"), "{}", errors[0]);
}

#[test]
fn unchanged_past_date_is_stale() {
    let opened = CellValue::Date(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap());
    let dump = Sheet::from_rows(
        "Sheet1",
        vec![
            vec![CellValue::from("Number"), CellValue::from("Opened")],
            vec![CellValue::from("ALM00003"), opened.clone()],
        ],
    );
    let mut dest = dump.clone();
    dest.name = "ALM Defects".into();

    let (outcome, _) = run_once(&dump, &mut dest);

    assert_eq!(outcome.cells_updated, 0);
    assert_eq!(dest.value(2, 2), &opened);
    assert_eq!(dest.style(2, 2), style::STALE_PAST);
    assert_eq!(dest.style(2, 1), style::RESET);
}

#[test]
fn iso_text_date_in_past_is_stale() {
    let dump = text_sheet("Sheet1", &[&["Number", "Planned fix date"], &["K1", "2024-05-31"]]);
    let mut dest = text_sheet("D", &[&["Number", "Planned fix date"], &["K1", "2024-06-01"]]);

    let (outcome, _) = run_once(&dump, &mut dest);

    assert_eq!(outcome.cells_updated, 1);
    assert_eq!(dest.style(2, 2), style::STALE_PAST);
    assert_eq!(outcome.count_state(VisualState::StalePast), 1);
    assert_eq!(outcome.count_state(VisualState::Updated), 0);
}

#[test]
fn csv_dump_header_whitespace_is_not_corrected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dump-defects.csv");
    std::fs::write(&path, "Number,Status \nK1,Closed\n").unwrap();

    let dump = capsync_io::load_table(&path).unwrap();
    let dump = dump.first_sheet().unwrap();
    let mut dest = text_sheet("Hypercare Defects", &[&["Number", "Status"], &["K1", "Open"]]);

    let headers = match_headers(dump, &dest);
    let common: Vec<&str> = headers.common.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(common, vec!["Number"]);
    assert_eq!(headers.near_misses, vec![("Status ".to_string(), "Status".to_string())]);

    let (outcome, reporter) = run_once(dump, &mut dest);
    assert_eq!(outcome.cells_updated, 0);
    assert_eq!(dest.value(2, 2), &CellValue::from("Open"));
    let warnings = reporter.texts(Severity::Warning);
    assert!(
        warnings.iter().any(|w| w.contains("'Status ' in [dump-enhancements.xlsx]")),
        "{warnings:?}"
    );
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn disjoint_headers_only_add_keys() {
    let dump = text_sheet("Sheet1", &[&["Ticket", "State"], &["A1", "x"], &["A2", "y"]]);
    let mut dest = text_sheet("D", &[&["Number", "Status"], &["A1", "Open"]]);

    let (outcome, reporter) = run_once(&dump, &mut dest);

    assert!(outcome.headers.common.is_empty());
    assert_eq!(outcome.cells_updated, 0);
    assert_eq!(outcome.rows_appended, 1);
    assert_eq!(dest.value(3, 1), &CellValue::from("A2"));
    assert!(dest.cell(3, 2).is_none());
    // Existing A1 row is not rewritten
    assert_eq!(dest.value(2, 2), &CellValue::from("Open"));
    assert!(reporter.count(Severity::Warning) >= 2);
}

#[test]
fn second_run_resets_updated_cells() {
    let dump = text_sheet("Sheet1", &[&["Number", "Status"], &["K1", "Closed"], &["K2", "New"]]);
    let mut dest = text_sheet("D", &[&["Number", "Status"], &["K1", "Open"]]);

    let mut reporter = MemoryReporter::new();
    let mut session = Session::new(today());
    session.run_pass(LABEL, &dump, &mut dest, &mut reporter);
    assert_eq!(dest.style(2, 2), style::UPDATED);
    assert_eq!(dest.style(3, 2), style::UPDATED);

    let second = session.run_pass(LABEL, &dump, &mut dest, &mut reporter).clone();
    assert_eq!(second.cells_updated, 0);
    assert_eq!(second.rows_appended, 0);
    assert_eq!(dest.style(2, 2), style::RESET);
    assert_eq!(dest.style(3, 2), style::RESET);

    // Counters accumulate across passes of one session
    assert_eq!(session.stats().cells_updated, 1);
    assert_eq!(session.stats().rows_appended, 1);
}

#[test]
fn later_pass_sees_rows_added_by_earlier_pass() {
    let first = text_sheet("Sheet1", &[&["Number", "Status"], &["K1", "Open"]]);
    let second = text_sheet("Sheet1", &[&["Number", "Status"], &["K1", "Open"], &["K2", "Open"]]);
    let mut dest = text_sheet("D", &[&["Number", "Status"]]);

    let mut reporter = MemoryReporter::new();
    let mut session = Session::new(today());
    session.run_pass(LABEL, &first, &mut dest, &mut reporter);
    let outcome = session.run_pass(LABEL, &second, &mut dest, &mut reporter).clone();

    assert_eq!(outcome.rows_appended, 1);
    assert_eq!(dest.max_row(), 3);
    assert_eq!(dest.value(3, 1), &CellValue::from("K2"));
}

// ---------------------------------------------------------------------------
// Property-based
// ---------------------------------------------------------------------------

fn config_256() -> ProptestConfig {
    ProptestConfig {
        cases: std::env::var("PROPTEST_CASES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(256),
        failure_persistence: None,
        ..ProptestConfig::default()
    }
}

fn arb_value() -> impl Strategy<Value = CellValue> {
    prop_oneof![
        Just(CellValue::Empty),
        "[a-c]{1,2}".prop_map(CellValue::Text),
        (0i32..4).prop_map(|n| CellValue::Number(n as f64)),
        (-4i64..4).prop_map(|off| CellValue::Date(today() + Duration::days(off))),
        (-4i64..4).prop_map(|off| CellValue::Text((today() + Duration::days(off)).to_string())),
    ]
}

/// A keyed sheet: "Number" first, then a shuffled subset of other columns.
fn arb_sheet(name: &'static str) -> impl Strategy<Value = Sheet> {
    let columns = proptest::sample::subsequence(vec!["Status", "Priority", "Opened", "Owner"], 0..=4)
        .prop_shuffle();
    let keys = proptest::collection::hash_set("K[0-9]{1,2}", 0..8);

    (columns, keys).prop_flat_map(move |(columns, keys)| {
        let keys: Vec<String> = keys.into_iter().collect();
        let width = columns.len();
        proptest::collection::vec(proptest::collection::vec(arb_value(), width), keys.len())
            .prop_map(move |body| {
                let mut sheet = Sheet::new(name);
                sheet.set_value(1, 1, CellValue::from("Number"));
                for (c, col) in columns.iter().enumerate() {
                    sheet.set_value(1, c + 2, CellValue::from(*col));
                }
                for (r, (key, row)) in keys.iter().zip(body.iter()).enumerate() {
                    sheet.set_value(r + 2, 1, CellValue::from(key.as_str()));
                    for (c, value) in row.iter().enumerate() {
                        if !value.is_empty() {
                            sheet.set_value(r + 2, c + 2, value.clone());
                        }
                    }
                }
                sheet
            })
    })
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn reconcile_is_idempotent(dump in arb_sheet("dump"), dest in arb_sheet("dest")) {
        let mut dest = dest;
        let mut reporter = MemoryReporter::new();
        let mut session = Session::new(today());

        session.run_pass(LABEL, &dump, &mut dest, &mut reporter);
        let after_first = values(&dest);

        let second = session.run_pass(LABEL, &dump, &mut dest, &mut reporter).clone();

        prop_assert_eq!(second.cells_updated, 0);
        prop_assert_eq!(second.rows_appended, 0);
        prop_assert_eq!(values(&dest), after_first);
        for cell in &second.touched {
            let stale = staleness::is_stale(dest.value(cell.row, cell.column), today());
            let expected = if stale { VisualState::StalePast } else { VisualState::Reset };
            prop_assert_eq!(cell.state, expected, "cell {:?}", cell);
        }
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn stale_marks_track_reference_day(dump in arb_sheet("dump"), dest in arb_sheet("dest")) {
        let mut dest = dest;
        let (outcome, _) = run_once(&dump, &mut dest);

        for cell in &outcome.touched {
            let value = dest.value(cell.row, cell.column);
            let before_today = staleness::date_of(value).is_some_and(|d| d < today());
            prop_assert_eq!(cell.state == VisualState::StalePast, before_today, "cell {:?}", cell);
            prop_assert_eq!(style::state_of(dest.style(cell.row, cell.column)), cell.state);
        }
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn duplicate_keys_never_mutate(dump in arb_sheet("dump"), dest in arb_sheet("dest")) {
        let key = dest.value(2, 1).clone();
        prop_assume!(!key.is_empty());

        let mut dest = dest;
        let row = dest.max_row() + 1;
        dest.set_value(row, 1, key);
        let before = dest.clone();

        let (outcome, _) = run_once(&dump, &mut dest);

        prop_assert!(outcome.is_aborted());
        prop_assert_eq!(dest, before);
    }
}

proptest! {
    #![proptest_config(config_256())]
    #[test]
    fn each_new_key_appends_exactly_one_row(dump in arb_sheet("dump"), dest in arb_sheet("dest")) {
        let mut dest = dest;
        let rows_before = dest.max_row();
        let new_keys = (2..=dump.max_row())
            .filter(|&r| {
                let k = dump.value(r, 1);
                (2..=rows_before).all(|d| dest.value(d, 1) != k)
            })
            .count();

        let (outcome, _) = run_once(&dump, &mut dest);

        prop_assert_eq!(outcome.rows_appended, new_keys);
        prop_assert_eq!(dest.max_row(), rows_before + new_keys);
    }
}
