//! `stepwise plans` — list stored plans.

use stepwise_core::plan::{Plan, PlanStore};

use super::{CliResult, load_config, plan_store};

pub async fn run() -> CliResult {
    let config = load_config()?;
    let plans = plan_store(&config).list().await?;

    if plans.is_empty() {
        println!("No stored plans in {}", config.plans.resolved_dir().display());
        return Ok(());
    }

    println!("📋 Stored plans");
    println!();
    println!(
        "  {:<40} {:<24} {:<17} {:>5}  {}",
        "ID", "STATUS", "CREATED", "STEPS", "TASK"
    );
    for summary in plans.iter().map(Plan::summary) {
        println!(
            "  {:<40} {:<24} {:<17} {:>5}  {}",
            summary.id,
            summary.status.as_str(),
            summary.created.format("%Y-%m-%d %H:%M"),
            summary.steps,
            truncate(&summary.task, 60)
        );
    }
    Ok(())
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let cut: String = text.chars().take(max).collect();
        format!("{cut}…")
    } else {
        text.to_string()
    }
}
