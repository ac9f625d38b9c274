//! Prompt templates for the generative flows.

use super::Flow;
use super::model::FlowInput;

/// System prompt: the task and the exact JSON shape to return.
pub fn system_prompt(flow: Flow) -> String {
    let (task, shape) = match flow {
        Flow::BusinessNames => (
            "You suggest names for new businesses. Names should be short, pronounceable \
             and not obviously trademarked.",
            r#"{"names": [{"name": "...", "rationale": "..."}]} with 3 to 10 names"#,
        ),
        Flow::BrandTaglines => (
            "You write brand taglines. Each tagline is a single line under twelve words.",
            r#"{"taglines": ["..."]} with 3 to 10 taglines"#,
        ),
        Flow::PitchDeck => (
            "You outline investor pitch decks. Cover problem, solution, market, product, \
             business model, traction, team and the ask where relevant.",
            r#"{"slides": [{"title": "...", "bullets": ["..."]}]} with 5 to 15 slides, each with at least one bullet"#,
        ),
        Flow::LegalChecklist => (
            "You prepare legal checklists for startups. You are not giving legal advice; \
             flag items a founder should raise with counsel.",
            r#"{"items": [{"item": "...", "category": "...", "priority": "high|medium|low"}]} with at least one item"#,
        ),
        Flow::ImplementationPlan => (
            "You plan software delivery for independent implementers. Split the work into \
             sequential phases that fit the timeline.",
            r#"{"phases": [{"phase": "...", "weeks": 1, "deliverables": ["..."]}]} with at least one phase"#,
        ),
    };

    format!(
        "{task}\n\nRespond with a single JSON object of the form {shape}.\n\
         ONLY output the JSON object. No other text."
    )
}

fn list(items: &[String]) -> String {
    let items: Vec<&str> = items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();
    if items.is_empty() {
        "none given".to_string()
    } else {
        items.join(", ")
    }
}

/// User prompt filled from the flow input.
pub fn user_prompt(input: &FlowInput) -> String {
    match input {
        FlowInput::BusinessNames(i) => format!(
            "Industry: {}\nKeywords: {}\nTone: {}",
            i.industry.trim(),
            list(&i.keywords),
            i.tone.as_deref().unwrap_or("any"),
        ),
        FlowInput::BrandTaglines(i) => format!(
            "Company: {}\nAudience: {}\nValues: {}",
            i.company_name.trim(),
            i.audience.trim(),
            list(&i.values),
        ),
        FlowInput::PitchDeck(i) => format!(
            "Company: {}\nProblem: {}\nSolution: {}\nMarket: {}",
            i.company_name.trim(),
            i.problem.trim(),
            i.solution.trim(),
            i.market.trim(),
        ),
        FlowInput::LegalChecklist(i) => format!(
            "Company stage: {}\nJurisdiction: {}",
            i.company_stage,
            i.jurisdiction.trim(),
        ),
        FlowInput::ImplementationPlan(i) => format!(
            "Project: {}\nTimeline: {} weeks",
            i.project_summary.trim(),
            i.timeline_weeks,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::model::{BusinessNamesInput, ImplementationPlanInput};

    #[test]
    fn system_prompt_names_the_shape() {
        for flow in Flow::ALL {
            let prompt = system_prompt(flow);
            assert!(prompt.contains("ONLY output the JSON object"));
            assert!(prompt.contains('{'));
        }
        assert!(system_prompt(Flow::PitchDeck).contains("5 to 15 slides"));
    }

    #[test]
    fn user_prompt_fills_fields() {
        let prompt = user_prompt(&FlowInput::BusinessNames(BusinessNamesInput {
            industry: " fintech ".into(),
            keywords: vec!["ledger".into(), " ".into()],
            tone: None,
        }));
        assert_eq!(prompt, "Industry: fintech\nKeywords: ledger\nTone: any");

        let prompt = user_prompt(&FlowInput::ImplementationPlan(ImplementationPlanInput {
            project_summary: "Inventory sync".into(),
            timeline_weeks: 6,
        }));
        assert!(prompt.ends_with("6 weeks"));
    }
}
