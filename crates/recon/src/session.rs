use capsync_engine::sheet::Sheet;
use chrono::NaiveDate;

use crate::error::SyncError;
use crate::headers::{match_headers, HeaderMatch};
use crate::index::RowIndex;
use crate::integrity::ensure_unique_keys;
use crate::model::{PassOutcome, PassStage, SessionStats, SessionSummary};
use crate::reconcile::reconcile;
use crate::report::{Message, Reporter, Severity};

/// Display names for one dump → destination pass.
#[derive(Debug, Clone, Copy)]
pub struct PassLabel<'a> {
    pub dump: &'a str,
    pub destination: &'a str,
}

/// One synchronisation run: counters, pass outcomes and the reference day.
///
/// Counters start at zero here and are only changed by this type.
#[derive(Debug)]
pub struct Session {
    today: NaiveDate,
    stats: SessionStats,
    outcomes: Vec<PassOutcome>,
    saved: bool,
}

impl Session {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            stats: SessionStats::default(),
            outcomes: Vec::new(),
            saved: false,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn outcomes(&self) -> &[PassOutcome] {
        &self.outcomes
    }

    pub fn announce(&mut self, reporter: &mut dyn Reporter) {
        self.emit(
            reporter,
            Severity::Info,
            None,
            "Only columns whose header names match exactly (case and whitespace included) \
             are synchronised; columns present on one side only are listed below."
                .to_string(),
        );
    }

    /// Reconcile `dump` into `destination`.
    ///
    /// Duplicate keys on either side abort the pass before anything is
    /// written. Otherwise the destination is updated in memory; saving it is
    /// the caller's job.
    pub fn run_pass(
        &mut self,
        label: PassLabel<'_>,
        dump: &Sheet,
        destination: &mut Sheet,
        reporter: &mut dyn Reporter,
    ) -> &PassOutcome {
        let pass = label.dump;
        let mut outcome = PassOutcome {
            dump: label.dump.to_string(),
            destination: label.destination.to_string(),
            sheet: destination.name.clone(),
            stage: PassStage::Start,
            cells_updated: 0,
            rows_appended: 0,
            headers: Default::default(),
            dump_duplicates: Vec::new(),
            destination_duplicates: Vec::new(),
            touched: Vec::new(),
        };
        self.stats.passes_run += 1;

        self.emit(
            reporter,
            Severity::Info,
            Some(pass),
            format!("BEGIN: [{}] -> [{}] ({})", label.dump, label.destination, destination.name),
        );

        let headers = match_headers(dump, destination);
        outcome.headers = headers.report();
        outcome.stage = PassStage::HeaderIntersected;
        self.report_headers(&headers, label, &destination.name, reporter);

        let mut aborted = false;
        for (table, sheet, is_dump) in [
            (label.dump, dump, true),
            (label.destination, &*destination, false),
        ] {
            if let Err(err) = ensure_unique_keys(sheet, table) {
                if let SyncError::DuplicateKeys { duplicates, .. } = &err {
                    if is_dump {
                        outcome.dump_duplicates = duplicates.clone();
                    } else {
                        outcome.destination_duplicates = duplicates.clone();
                    }
                }
                self.emit(reporter, Severity::Error, Some(pass), err.to_string());
                aborted = true;
            }
        }
        if aborted {
            outcome.stage = PassStage::Aborted;
            self.stats.passes_aborted += 1;
            self.emit(
                reporter,
                Severity::Info,
                Some(pass),
                format!("SKIPPED: [{}] -> [{}] ({})", label.dump, label.destination, destination.name),
            );
            log::debug!("pass {pass} aborted on duplicate keys");
            return self.push(outcome);
        }
        outcome.stage = PassStage::KeysValidated;

        let dump_index = RowIndex::build(dump, &headers.dump_columns());
        let dest_index = RowIndex::build(destination, &headers.destination_columns());
        outcome.stage = PassStage::Indexed;
        log::debug!(
            "pass {pass}: {} dump keys, {} destination keys, {} common columns",
            dump_index.len(),
            dest_index.len(),
            headers.common.len()
        );

        let result = reconcile(&headers, &dump_index, &dest_index, destination, self.today);
        outcome.stage = PassStage::Reconciled;
        outcome.cells_updated = result.cells_updated;
        outcome.rows_appended = result.rows_appended;
        outcome.touched = result.touched;
        // Staleness runs per key inside the reconcile walk.
        outcome.stage = PassStage::Highlighted;

        self.stats.cells_updated += result.cells_updated;
        self.stats.rows_appended += result.rows_appended;

        self.emit(
            reporter,
            Severity::Info,
            Some(pass),
            format!(
                "END: [{}] [Updates: {}] [Additions: {}]",
                label.dump, result.cells_updated, result.rows_appended
            ),
        );
        log::debug!("pass {pass}: {} stale cells", result.stale_cells);

        self.push(outcome)
    }

    /// Report a session-fatal load/save failure.
    pub fn record_io_failure(&mut self, error: &SyncError, reporter: &mut dyn Reporter) {
        self.emit(reporter, Severity::Error, None, error.to_string());
    }

    /// Settle every completed pass as `Saved` or `CheckOnly`.
    pub fn finish(&mut self, saved: bool) {
        self.saved = saved;
        let settled = if saved { PassStage::Saved } else { PassStage::CheckOnly };
        for outcome in &mut self.outcomes {
            if outcome.stage == PassStage::Highlighted {
                outcome.stage = settled;
            }
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            today: self.today,
            saved: self.saved,
            stats: self.stats,
            elapsed_ms: 0,
            passes: self.outcomes.clone(),
        }
    }

    fn push(&mut self, outcome: PassOutcome) -> &PassOutcome {
        self.outcomes.push(outcome);
        &self.outcomes[self.outcomes.len() - 1]
    }

    fn report_headers(
        &mut self,
        headers: &HeaderMatch,
        label: PassLabel<'_>,
        sheet: &str,
        reporter: &mut dyn Reporter,
    ) {
        let pass = Some(label.dump);

        if !headers.dump_only.is_empty() {
            let text = exclusive_columns(&format!("[{}]", label.dump), &headers.dump_only);
            self.emit(reporter, Severity::Warning, pass, text);
        }
        if !headers.destination_only.is_empty() {
            let owner = format!("[{}] ({})", label.destination, sheet);
            let text = exclusive_columns(&owner, &headers.destination_only);
            self.emit(reporter, Severity::Warning, pass, text);
        }
        for (dump_name, dest_name) in &headers.near_misses {
            self.emit(
                reporter,
                Severity::Warning,
                pass,
                format!(
                    "'{dump_name}' in [{}] and '{dest_name}' in [{}] differ only by case or \
                     whitespace and will not be matched",
                    label.dump, label.destination
                ),
            );
        }
        for (owner, set) in [(label.dump, &headers.dump), (label.destination, &headers.destination)] {
            for (name, col) in set.repeated() {
                let first = set.column(name).unwrap_or_default();
                self.emit(
                    reporter,
                    Severity::Warning,
                    pass,
                    format!(
                        "[{owner}] repeats column '{name}' at column {col}; only column {first} is used"
                    ),
                );
            }
        }
        if headers.common.is_empty() {
            self.emit(
                reporter,
                Severity::Warning,
                pass,
                format!(
                    "[{}] and [{}] share no columns; only new keys will be added",
                    label.dump, label.destination
                ),
            );
        }
    }

    fn emit(
        &mut self,
        reporter: &mut dyn Reporter,
        severity: Severity,
        pass: Option<&str>,
        text: String,
    ) {
        match severity {
            Severity::Warning => self.stats.warnings += 1,
            Severity::Error => self.stats.errors += 1,
            Severity::Info => {}
        }
        reporter.report(Message {
            severity,
            pass: pass.map(str::to_string),
            text,
        });
    }
}

fn exclusive_columns(owner: &str, names: &[String]) -> String {
    let mut text = format!("{owner} exclusively contains the following columns:");
    for (i, name) in names.iter().enumerate() {
        text.push_str(&format!("\n\t{}. '{}'", i + 1, name));
    }
    text
}
