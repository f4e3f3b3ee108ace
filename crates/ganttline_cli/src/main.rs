//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `ganttline_core` linkage with deterministic output.
//! - Print the dependency view of a database when given its path.
//!
//! Usage: `ganttline_cli [DB_PATH]`. Set `GANTTLINE_LOG_DIR` to an absolute
//! directory to enable file logging.

use ganttline_core::db::open_db;
use ganttline_core::{
    default_log_level, init_logging, ActivityListQuery, ActivityService,
    SqliteActivityRepository,
};
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("ganttline_core ping={}", ganttline_core::ping());
    println!("ganttline_core version={}", ganttline_core::core_version());

    if let Ok(log_dir) = std::env::var("GANTTLINE_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    let Some(db_path) = std::env::args().nth(1) else {
        return ExitCode::SUCCESS;
    };

    match print_activities(&db_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn print_activities(db_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let conn = open_db(db_path)?;
    let service = ActivityService::new(SqliteActivityRepository::try_new(&conn)?);

    let activities = service.list_activities(&ActivityListQuery::default())?;
    println!("activities ({}):", activities.len());
    for detail in activities {
        let activity = &detail.activity;
        println!(
            "  - {} {} [{}..{}] progress={} status={:?}",
            activity.id, activity.name, activity.start, activity.end, activity.progress,
            activity.status
        );
        if !detail.dependencies.is_empty() {
            println!("      after: {:?}", detail.dependencies);
        }
    }
    Ok(())
}
