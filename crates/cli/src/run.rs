// `capsync run`: one reconciliation session over every configured source

use std::time::Instant;

use capsync_recon::report::Severity;
use capsync_recon::{PassLabel, Session, SyncError};
use chrono::{Local, NaiveDate};

use crate::console::{self, ConsoleReporter};
use crate::exit_codes::EXIT_DUPLICATE_KEYS;
use crate::project::{dump_sheet, Project};
use crate::CliError;

pub fn cmd_run(
    project: &Project,
    check: bool,
    json: bool,
    today: Option<NaiveDate>,
) -> Result<(), CliError> {
    let started = Instant::now();
    let config = &project.config;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let mut reporter = ConsoleReporter::new(json);
    let mut session = Session::new(today);
    session.announce(&mut reporter);

    let (mut destination, dumps) = match project.load_all() {
        Ok(loaded) => loaded,
        Err(err) => {
            session.record_io_failure(&err, &mut reporter);
            return Err(err.into());
        }
    };
    log::info!("loaded destination and {} dumps in {:?}", dumps.len(), started.elapsed());

    for (source, dump) in config.sources.iter().zip(dumps.iter()) {
        let dump_tab = dump_sheet(dump, source)?;
        let dest_sheet = destination.sheet_mut(&source.sheet).ok_or_else(|| {
            SyncError::MissingSheet { file: config.destination.clone(), sheet: source.sheet.clone() }
        })?;
        let label = PassLabel { dump: &source.file, destination: &config.destination };
        session.run_pass(label, dump_tab, dest_sheet, &mut reporter);
    }

    let saved = if check {
        reporter.say(Severity::Info, "Check mode: no files were modified");
        false
    } else {
        if let Some(open) = &config.open_sheet {
            destination.set_active(open);
        }
        let path = project.destination_path();
        if let Err(e) = capsync_io::save_table(&destination, &path) {
            let err = SyncError::Io(e);
            session.record_io_failure(&err, &mut reporter);
            return Err(err.into());
        }
        log::info!("saved {}", path.display());
        true
    };
    session.finish(saved);

    let mut summary = session.summary();
    summary.elapsed_ms = started.elapsed().as_millis();

    if json {
        let out = serde_json::to_string_pretty(&summary)
            .map_err(|e| CliError::general(format!("cannot serialize summary: {e}")))?;
        println!("{out}");
    } else {
        console::print_summary(&summary);
    }

    let aborted = summary.stats.passes_aborted;
    if aborted > 0 {
        return Err(CliError {
            code: EXIT_DUPLICATE_KEYS,
            message: format!(
                "{} of {} passes skipped because of duplicate keys",
                aborted, summary.stats.passes_run
            ),
            hint: Some("remove the duplicate keys listed above and run again".to_string()),
        });
    }
    Ok(())
}
