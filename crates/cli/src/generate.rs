// `capsync generate`: overwrite dumps and tracker with random keyed test data

use std::collections::HashSet;
use std::io::{self, Write};
use std::time::Instant;

use capsync_engine::cell::CellValue;
use capsync_engine::sheet::Sheet;
use capsync_recon::headers::HeaderSet;
use capsync_recon::report::Severity;
use capsync_recon::{SyncConfig, SyncError};
use chrono::{Duration, Local, NaiveDate};
use colored::Colorize;
use rand::Rng;

use crate::console::{self, ConsoleReporter};
use crate::project::{dump_sheet_mut, Project};
use crate::CliError;

/// Width applied to every header column of a regenerated sheet.
const COLUMN_WIDTH: f64 = 18.0;

/// Generated dates fall in `today + DATE_SPREAD`.
const DATE_SPREAD: std::ops::RangeInclusive<i64> = -10..=35;

pub fn cmd_generate(
    project: &Project,
    rows: usize,
    yes: bool,
    today: Option<NaiveDate>,
) -> Result<(), CliError> {
    if !yes && !confirm_overwrite()? {
        eprintln!("Nothing was changed.");
        return Ok(());
    }

    let started = Instant::now();
    let config = &project.config;
    let today = today.unwrap_or_else(|| Local::now().date_naive());
    let mut reporter = ConsoleReporter::new(false);
    reporter.say(
        Severity::Info,
        format!("Generating {} rows of unique keyed test data.", rows),
    );

    let (mut destination, mut dumps) = project.load_all()?;
    let mut generator = KeyGenerator::new(rand::thread_rng());

    for (source, dump) in config.sources.iter().zip(dumps.iter_mut()) {
        let dump_tab = dump_sheet_mut(dump, source)?;
        let dest_tab = destination.sheet_mut(&source.sheet).ok_or_else(|| {
            SyncError::MissingSheet { file: config.destination.clone(), sheet: source.sheet.clone() }
        })?;

        populate(
            dump_tab,
            dest_tab,
            rows,
            &source.key_prefix(),
            config,
            today,
            &mut generator,
        );

        let path = project.resolve(&source.file);
        capsync_io::save_table(dump, &path)
            .map_err(|e| CliError::io(e).with_hint("is the dump open in another program?"))?;
        log::info!("wrote {} rows to {}", rows, path.display());
    }

    if let Some(open) = &config.open_sheet {
        destination.set_active(open);
    }
    let path = project.destination_path();
    capsync_io::save_table(&destination, &path)
        .map_err(|e| CliError::io(e).with_hint("is the tracker open in another program?"))?;

    reporter.say(Severity::Info, "Completed generating input files");
    // Every dump plus the tracker
    let files_written = config.sources.len() + 1;
    console::print_generate_summary(rows, files_written, started.elapsed().as_millis());
    Ok(())
}

/// Ask before overwriting. Refuses outright when stdin is not a terminal.
fn confirm_overwrite() -> Result<bool, CliError> {
    if !atty::is(atty::Stream::Stdin) {
        return Err(CliError::usage("refusing to overwrite files: stdin is not a TTY")
            .with_hint("pass --yes to confirm non-interactively"));
    }

    eprint!(
        "{}{}{}",
        "This option will ".yellow(),
        "*OVERWRITE ALL FILES* ".red(),
        "are you sure (y/n)? ".yellow()
    );
    io::stderr().flush().ok();

    let mut answer = String::new();
    io::stdin()
        .read_line(&mut answer)
        .map_err(|e| CliError::general(e.to_string()))?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Unique `[PFX] 01234:56789` strings across the whole run.
struct KeyGenerator<R: Rng> {
    rng: R,
    used: HashSet<String>,
}

impl<R: Rng> KeyGenerator<R> {
    fn new(rng: R) -> Self {
        Self { rng, used: HashSet::new() }
    }

    fn key(&mut self, prefix: &str) -> String {
        loop {
            let candidate = format!(
                "[{}] {:05}:{:05}",
                prefix,
                self.rng.gen_range(100..=99_999u32),
                self.rng.gen_range(100..=99_999u32)
            );
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }

    fn date(&mut self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.rng.gen_range(DATE_SPREAD))
    }
}

/// Replace the data rows of both sheets.
///
/// Every dump column gets a fresh key (or a date for date fields). The
/// destination gets the same primary keys in column 1 and independent random
/// values elsewhere, so a following `run` has plenty to update.
fn populate<R: Rng>(
    dump: &mut Sheet,
    destination: &mut Sheet,
    rows: usize,
    prefix: &str,
    config: &SyncConfig,
    today: NaiveDate,
    generator: &mut KeyGenerator<R>,
) {
    dump.clear_rows_from(2);
    destination.clear_rows_from(2);

    let dump_headers = HeaderSet::from_sheet(dump);
    let dest_headers = HeaderSet::from_sheet(destination);
    let dump_columns: Vec<(String, usize)> = dump_headers
        .names()
        .filter_map(|n| dump_headers.column(n).map(|c| (n.to_string(), c)))
        .collect();
    let dest_columns: Vec<(String, usize)> = dest_headers
        .names()
        .filter_map(|n| dest_headers.column(n).map(|c| (n.to_string(), c)))
        .filter(|(_, c)| *c > 1)
        .collect();

    let cell = |name: &str, generator: &mut KeyGenerator<R>| {
        if config.is_date_field(name) {
            CellValue::Date(generator.date(today))
        } else {
            CellValue::Text(generator.key(prefix))
        }
    };

    for row in 2..rows + 2 {
        for (name, col) in &dump_columns {
            let value = cell(name, generator);
            if *col == 1 {
                destination.set_value(row, 1, value.clone());
            }
            dump.set_value(row, *col, value);
        }
        for (name, col) in &dest_columns {
            destination.set_value(row, *col, cell(name, generator));
        }
    }

    for (_, col) in &dump_columns {
        dump.set_column_width(*col, COLUMN_WIDTH);
    }
    destination.set_column_width(1, COLUMN_WIDTH);
    for (_, col) in &dest_columns {
        destination.set_column_width(*col, COLUMN_WIDTH);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsync_recon::integrity::find_duplicate_keys;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn header(name: &str, names: &[&str]) -> Sheet {
        Sheet::from_rows(name, vec![names.iter().map(|n| CellValue::from(*n)).collect::<Vec<_>>()])
    }

    #[test]
    fn populate_mirrors_keys_and_dates() {
        let mut dump = header("Sheet1", &["Number", "Opened", "Status"]);
        let mut dest = header("Hypercare Incidents", &["Number", "Planned fix date", "Owner"]);
        dest.set_value(9, 1, CellValue::from("old"));

        let today = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let mut generator = KeyGenerator::new(StdRng::seed_from_u64(7));
        populate(&mut dump, &mut dest, 5, "INC", &SyncConfig::default(), today, &mut generator);

        assert_eq!(dump.max_row(), 6);
        assert_eq!(dest.max_row(), 6);
        for row in 2..=6 {
            assert_eq!(dump.value(row, 1), dest.value(row, 1));
            let CellValue::Text(key) = dump.value(row, 1) else {
                panic!("key should be text");
            };
            assert!(key.starts_with("[INC] "), "{key}");
            assert_eq!(key.len(), "[INC] 01234:56789".len());

            for (sheet, col) in [(&dump, 2), (&dest, 2)] {
                let CellValue::Date(d) = sheet.value(row, col) else {
                    panic!("date field should hold a date");
                };
                assert!(*d >= today - Duration::days(10) && *d <= today + Duration::days(35));
            }
        }
        assert!(find_duplicate_keys(&dump).is_empty());
        assert_eq!(dump.column_width(3), Some(COLUMN_WIDTH));
        assert_eq!(dest.column_width(1), Some(COLUMN_WIDTH));
    }

    #[test]
    fn keys_never_repeat() {
        let mut generator = KeyGenerator::new(StdRng::seed_from_u64(1));
        let keys: HashSet<String> = (0..500).map(|_| generator.key("ALM")).collect();
        assert_eq!(keys.len(), 500);
    }
}
