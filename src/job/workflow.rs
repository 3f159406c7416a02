//! Workflow templates.
//!
//! Stages are generated once when a job is created. Task names double as
//! capability keys after normalization, so they line up with the prompt
//! sequence table.

use super::{JobType, Stage, TaskSpec};

/// Build the ordered stage list for a new job.
///
/// The core technical stages are always present. The project-management
/// stages (setup, sprint planning, sprint review, closure) are interleaved
/// only when `project_management` is enabled.
pub fn workflow_stages(job_type: JobType, project_management: bool) -> Vec<Stage> {
    let mut stages = Vec::new();

    if project_management {
        stages.push(stage(
            "project_setup",
            "Project Setup",
            "Establish the project plan and kickoff artifacts",
            &[("Project Kickoff", "project_manager")],
        ));
    }

    stages.push(stage(
        "code_analysis",
        "Code Analysis & Planning",
        "Analyze the source codebase and produce a migration plan",
        &[
            ("Analyze", "code_architect"),
            ("Plan", "code_architect"),
        ],
    ));

    if project_management {
        stages.push(stage(
            "sprint_planning",
            "Sprint Planning",
            "Break the plan into executable sprints",
            &[("Status Report", "project_manager")],
        ));
    }

    let migration_task = match job_type {
        JobType::Migration => ("Migrate", "code_engineer"),
        JobType::Modernization => ("Refactor", "code_engineer"),
    };
    stages.push(stage(
        "code_migration",
        "Code Migration",
        "Transform the source code toward the target",
        &[migration_task],
    ));

    stages.push(stage(
        "validation_fix",
        "Validation & Fix",
        "Validate the migrated code and fix defects",
        &[
            ("Validate", "qa_engineer"),
            ("Test", "qa_engineer"),
        ],
    ));

    if project_management {
        stages.push(stage(
            "sprint_review",
            "Sprint Review",
            "Review sprint outcomes and report status",
            &[("Status Report", "project_manager")],
        ));
    }

    stages.push(stage(
        "deployment_prep",
        "Deployment Preparation",
        "Prepare build and deployment pipelines",
        &[("Setup CI CD", "devops_engineer")],
    ));

    if project_management {
        stages.push(stage(
            "project_closure",
            "Project Closure",
            "Summarize results and close out the project",
            &[("Status Report", "project_manager")],
        ));
    }

    stages
}

fn stage(id: &str, name: &str, description: &str, tasks: &[(&str, &str)]) -> Stage {
    let agents: Vec<String> = {
        let mut seen = Vec::new();
        for (_, agent) in tasks {
            if !seen.contains(&agent.to_string()) {
                seen.push(agent.to_string());
            }
        }
        seen
    };
    Stage {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        capabilities: tasks
            .iter()
            .map(|(name, _)| crate::context::slugify(name))
            .collect(),
        agents,
        tasks: tasks
            .iter()
            .map(|(name, agent)| TaskSpec::new(*name, *agent))
            .collect(),
        ..Default::default()
    }
}
