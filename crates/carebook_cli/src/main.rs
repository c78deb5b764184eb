//! CLI smoke entry point.
//!
//! # Responsibility
//! - Resolve configuration and open the configured database.
//! - Run one patient lifecycle (create, list, update, delete) and print it.

use carebook_core::{
    init_logging, open_db_at, CoreConfig, Entity, NewPatient, PatientChanges, PatientService,
    SqliteGateway,
};
use log::info;
use std::error::Error;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("carebook: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = CoreConfig::from_env()?;
    if let Some(log_dir) = config.log_dir.as_ref() {
        init_logging(config.log_level, log_dir)?;
    }

    println!("carebook_core version={}", carebook_core::core_version());

    let conn = open_db_at(&config.database)?;
    let gateway = SqliteGateway::try_new(&conn)?;
    let patients = PatientService::from_gateway(&gateway);

    let created = patients.create(NewPatient::new(
        "Jane",
        "Doe",
        "1990-01-01",
        "female",
        "555-123-4567",
    ))?;
    let Some(id) = created.id() else {
        return Err("created patient has no id".into());
    };
    println!(
        "created id={id} name={} age={:?} group={}",
        created.full_name(),
        created.age(),
        created.age_group()
    );
    println!("listed count={}", patients.all()?.len());

    let updated = patients.update(id, &PatientChanges::contact_number("555-999-0000"))?;
    println!("updated id={id} contact={}", updated.formatted_contact());

    let stats = patients.statistics()?;
    println!(
        "stats total={} adults={} minors={}",
        stats.total, stats.adults, stats.minors
    );

    println!("deleted id={id} result={}", patients.delete(id)?);
    println!("found_after_delete={}", patients.get(id)?.is_some());
    info!("event=cli_run module=cli status=ok");
    Ok(())
}
