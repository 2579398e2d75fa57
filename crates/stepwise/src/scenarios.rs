//! Ready-made agents and tasks for each scenario.
//!
//! Builders return an [`AgentBuilder`] so callers can still attach
//! transcript or step callbacks before building.

use std::path::PathBuf;
use std::sync::Arc;

use stepwise_core::{AgentBuilder, AgentError};
use stepwise_model::ModelProvider;

use crate::callbacks::step_tracker;
use crate::knowledge::VectorStore;
use crate::tools::{ManualSearchTool, OrderIdTool, OrderLookupTool};

/// Four weeks of sample expenses, used when no data file is given.
pub const SAMPLE_EXPENSES: &str = "\
Week 1: Groceries $142.50, Dining out $68.00, Transport $45.00, Entertainment $30.00, Utilities $95.00
Week 2: Groceries $128.75, Dining out $92.40, Transport $38.50, Entertainment $55.00
Week 3: Groceries $151.20, Dining out $47.80, Transport $52.00, Entertainment $18.00, Clothing $120.00
Week 4: Groceries $136.40, Dining out $110.25, Transport $41.00, Entertainment $64.00, Subscriptions $29.99";

/// The compound interest question, answered without tools.
pub const INTEREST_TASK: &str = "I deposit $100 every month into an account \
that pays 5% annual interest, compounded monthly. Calculate the total balance \
after 10 years.";

/// The café task for table 5.
pub const CAFE_TASK: &str = "For table 5, list their current drink orders \
and generate a unique order ID for each one.";

/// Instructions for the appliance assistant.
pub const APPLIANCE_INSTRUCTIONS: &str = "Help with appliance questions using \
manual information. Search multiple times if needed for complete answers.";

/// A sample appliance question.
pub const APPLIANCE_QUESTION: &str = "If the AC isn't cooling and shows error \
E1, what should I check and what's the next step?";

/// A sample question from the basketball coach.
pub const COACH_QUESTION: &str = "What defensive strategy should we use to \
stop their point guard who averages 25 points per game?";

/// The detail the travel assistant should remember.
pub const TRAVEL_FACT: &str = "My Tokyo flight confirmation code is ZX9Q2L.";

/// The follow-up question for the travel assistant.
pub const TRAVEL_QUESTION: &str = "What's my Tokyo flight confirmation code?";

/// The task for the admissions coordinator.
pub const ADMISSIONS_TASK: &str = "My younger sister is applying to computer \
science programs. Shortlist three universities with strong undergraduate CS \
programs and their admission requirements, then outline a personal \
statement that fits them.";

/// Builds the expense analysis task around weekly expense data.
pub fn expense_task(expense_data: &str) -> String {
    format!(
        "Analyze my monthly expense data by category. Calculate total spending \
         per category, find my highest expense area, and suggest a realistic \
         budget for next month. Use simple text format in your final answer. \
         Here is my weekly expense data for the past four weeks:\n\n\
         {expense_data}\n"
    )
}

/// An agent without tools, for the expense and interest tasks.
pub fn basic_agent<P: ModelProvider + 'static>(provider: P) -> AgentBuilder {
    AgentBuilder::with_model_provider(provider)
}

/// The café agent, reading orders from the table at `orders`.
pub fn cafe_agent<P: ModelProvider + 'static>(
    provider: P,
    orders: impl Into<PathBuf>,
) -> AgentBuilder {
    AgentBuilder::with_model_provider(provider)
        .with_tool(OrderLookupTool::new(orders))
        .with_tool(OrderIdTool::new())
}

/// The appliance assistant, searching manuals in `store`.
pub fn appliance_agent<P: ModelProvider + 'static>(
    provider: P,
    store: Arc<dyn VectorStore>,
) -> AgentBuilder {
    AgentBuilder::with_model_provider(provider)
        .with_tool(ManualSearchTool::appliance(store))
        .with_instructions(APPLIANCE_INSTRUCTIONS)
        .with_max_steps(6)
}

/// The basketball coach assistant, searching scouting reports in
/// `store`. Step reports are passed to `report`.
pub fn coach_agent<P: ModelProvider + 'static>(
    provider: P,
    store: Arc<dyn VectorStore>,
    report: impl Fn(&str) + Send + Sync + 'static,
) -> AgentBuilder {
    AgentBuilder::with_model_provider(provider)
        .with_tool(ManualSearchTool::scouting_reports(store))
        .on_action_step(step_tracker(report))
}

/// The travel assistant. Ask it [`TRAVEL_FACT`] with `run`, then
/// [`TRAVEL_QUESTION`] with `follow_up` so it remembers.
pub fn travel_agent<P: ModelProvider + 'static>(provider: P) -> AgentBuilder {
    AgentBuilder::with_model_provider(provider)
        .with_name("travel_agent")
        .with_description("Keeps track of travel dates and bookings")
}

/// The admissions coordinator, managing a school research agent and an
/// essay writing agent.
pub fn admissions_agent<P: ModelProvider + Clone + 'static>(
    provider: P,
) -> Result<AgentBuilder, AgentError> {
    let school_agent = AgentBuilder::with_model_provider(provider.clone())
        .with_name("school_research_agent")
        .with_description(
            "Expert in researching universities, programs, and admission \
             requirements",
        )
        .build()
        .into_managed()?;
    let essay_agent = AgentBuilder::with_model_provider(provider.clone())
        .with_name("essay_writing_agent")
        .with_description(
            "Expert in crafting compelling college application essays and \
             personal statements",
        )
        .build()
        .into_managed()?;
    Ok(AgentBuilder::with_model_provider(provider)
        .with_tool(school_agent)
        .with_tool(essay_agent)
        .with_instructions(
            "Delegate research to school_research_agent and essay work to \
             essay_writing_agent, then combine their answers.",
        ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expense_task() {
        let task = expense_task("Week 1: Rent $900");
        assert!(task.starts_with("Analyze my monthly expense data by category."));
        assert!(task.ends_with(
            "for the past four weeks:\n\nWeek 1: Rent $900\n"
        ));
        assert!(!task.contains("  "));
    }
}
