//! Step callbacks.

use stepwise_core::{ActionStep, AgentMemory};

/// Describes an action step for the basketball coach.
///
/// Every step yields `Step {n}: Analyzing basketball data!`. The final
/// answer step also yields the tokens that step used, or 0 when the
/// provider didn't report usage.
pub fn step_report(step: &ActionStep) -> Vec<String> {
    let mut lines = vec![format!(
        "Step {}: Analyzing basketball data!",
        step.step_number
    )];
    if step.is_final_answer {
        let total_tokens = step
            .token_usage
            .map(|usage| usage.total_tokens())
            .unwrap_or(0);
        lines.push(format!(
            "Analysis complete! Total tokens used: {total_tokens}"
        ));
    }
    lines
}

/// Makes a step callback that passes each line of [`step_report`] to
/// `report`.
pub fn step_tracker(
    report: impl Fn(&str) + Send + Sync + 'static,
) -> impl Fn(&ActionStep, &AgentMemory) + Send + Sync + 'static {
    move |step: &ActionStep, _memory: &AgentMemory| {
        for line in step_report(step) {
            info!("{line}");
            report(&line);
        }
    }
}
