//! `stepwise resume` — continue a stored plan.

use std::sync::Arc;
use stepwise_core::event::EventBus;

use super::{CliResult, build_coordinator, drive, execute_options, finish, load_config};

pub async fn run(plan_id: &str, json: bool, session: Option<String>) -> CliResult {
    let config = load_config()?;
    let bus = Arc::new(EventBus::default());
    let coordinator = build_coordinator(&config, bus.clone())?;

    let opts = execute_options(json, session);
    let output = drive(&bus, json, coordinator.resume_plan(plan_id, &opts)).await?;
    finish(&output)
}
