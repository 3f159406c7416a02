//! Job management commands.

use crate::cli::{JobAction, JobCommand, JobCreateArgs, JobIdArgs};
use crate::config::Config;
use crate::error::{PassageError, Result};
use crate::job::{JobStore, JobType, NewJob};
use crate::store::actor_string;

pub fn dispatch(config: &Config, cmd: JobCommand) -> Result<()> {
    let store = JobStore::new(&config.data_root);
    match cmd.action {
        JobAction::Create(args) => cmd_create(&store, args),
        JobAction::List => cmd_list(&store),
        JobAction::Show(args) => cmd_show(&store, args),
        JobAction::Delete(args) => cmd_delete(&store, args),
    }
}

fn parse_job_type(value: &str) -> Result<JobType> {
    match value {
        "migration" => Ok(JobType::Migration),
        "modernization" => Ok(JobType::Modernization),
        other => Err(PassageError::UserError(format!(
            "Unknown job type '{other}' (expected 'migration' or 'modernization')"
        ))),
    }
}

fn cmd_create(store: &JobStore, args: JobCreateArgs) -> Result<()> {
    let job = store.create_job(NewJob {
        name: args.name,
        description: args.description,
        job_type: parse_job_type(&args.job_type)?,
        source_id: args.source_id,
        source_name: args.source_name,
        target_id: args.target_id,
        target_name: args.target_name,
        project_management_enabled: args.project_management,
        created_by: Some(actor_string()),
    })?;
    println!("Created job {} ({} stages)", job.id, job.stages.len());
    for stage in &job.stages {
        println!("  {}: {} task(s)", stage.id, stage.tasks.len());
    }
    Ok(())
}

fn cmd_list(store: &JobStore) -> Result<()> {
    let jobs = store.all_jobs()?;
    if jobs.is_empty() {
        println!("No jobs");
        return Ok(());
    }
    for job in &jobs {
        println!(
            "{}  {}  {}  {}%  {}",
            job.id,
            job.name,
            super::status_label(job.status),
            job.progress,
            job.created_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

fn cmd_show(store: &JobStore, args: JobIdArgs) -> Result<()> {
    let job = store.get_job(&args.job_id)?;
    let rendered = serde_json::to_string_pretty(&job)
        .map_err(|e| PassageError::ExecutionError(format!("Failed to render job: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn cmd_delete(store: &JobStore, args: JobIdArgs) -> Result<()> {
    store.delete_job(&args.job_id)?;
    println!("Deleted job {}", args.job_id);
    Ok(())
}
