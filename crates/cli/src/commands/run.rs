//! `stepwise run` — classify, plan and execute one task.

use std::sync::Arc;
use stepwise_agent::TaskMode;
use stepwise_core::event::EventBus;

use super::{CliResult, build_coordinator, drive, execute_options, finish, load_config};

pub async fn run(
    task: &str,
    json: bool,
    session: Option<String>,
    mode: TaskMode,
) -> CliResult {
    let config = load_config()?;
    let bus = Arc::new(EventBus::default());
    let coordinator = build_coordinator(&config, bus.clone())?;

    let opts = execute_options(json, session).with_mode(mode);
    let output = drive(&bus, json, coordinator.execute(task, &opts)).await?;
    finish(&output)
}
