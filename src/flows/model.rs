//! Typed inputs and outputs of the generative flows, with the checks each
//! must pass.

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::onboarding::model::ProjectStage;

use super::Flow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessNamesInput {
    pub industry: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandTaglinesInput {
    pub company_name: String,
    pub audience: String,
    #[serde(default)]
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PitchDeckInput {
    pub company_name: String,
    pub problem: String,
    pub solution: String,
    pub market: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalChecklistInput {
    pub company_stage: ProjectStage,
    pub jurisdiction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImplementationPlanInput {
    pub project_summary: String,
    pub timeline_weeks: u16,
}

/// A parsed and checked flow input.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowInput {
    BusinessNames(BusinessNamesInput),
    BrandTaglines(BrandTaglinesInput),
    PitchDeck(PitchDeckInput),
    LegalChecklist(LegalChecklistInput),
    ImplementationPlan(ImplementationPlanInput),
}

fn invalid(flow: Flow, reason: impl Into<String>) -> FlowError {
    FlowError::InvalidInput {
        flow: flow.to_string(),
        reason: reason.into(),
    }
}

fn require_text(flow: Flow, field: &str, value: &str) -> Result<(), FlowError> {
    if value.trim().is_empty() {
        return Err(invalid(flow, format!("{field} must not be empty")));
    }
    Ok(())
}

impl FlowInput {
    /// Deserialize the JSON body for `flow` and check required fields.
    pub fn parse(flow: Flow, value: serde_json::Value) -> Result<Self, FlowError> {
        fn from<T: serde::de::DeserializeOwned>(
            flow: Flow,
            value: serde_json::Value,
        ) -> Result<T, FlowError> {
            serde_json::from_value(value).map_err(|e| invalid(flow, e.to_string()))
        }

        let input = match flow {
            Flow::BusinessNames => {
                let input: BusinessNamesInput = from(flow, value)?;
                require_text(flow, "industry", &input.industry)?;
                FlowInput::BusinessNames(input)
            }
            Flow::BrandTaglines => {
                let input: BrandTaglinesInput = from(flow, value)?;
                require_text(flow, "companyName", &input.company_name)?;
                require_text(flow, "audience", &input.audience)?;
                FlowInput::BrandTaglines(input)
            }
            Flow::PitchDeck => {
                let input: PitchDeckInput = from(flow, value)?;
                require_text(flow, "companyName", &input.company_name)?;
                require_text(flow, "problem", &input.problem)?;
                require_text(flow, "solution", &input.solution)?;
                require_text(flow, "market", &input.market)?;
                FlowInput::PitchDeck(input)
            }
            Flow::LegalChecklist => {
                let input: LegalChecklistInput = from(flow, value)?;
                require_text(flow, "jurisdiction", &input.jurisdiction)?;
                FlowInput::LegalChecklist(input)
            }
            Flow::ImplementationPlan => {
                let input: ImplementationPlanInput = from(flow, value)?;
                require_text(flow, "projectSummary", &input.project_summary)?;
                if !(1..=104).contains(&input.timeline_weeks) {
                    return Err(invalid(flow, "timelineWeeks must be between 1 and 104"));
                }
                FlowInput::ImplementationPlan(input)
            }
        };
        Ok(input)
    }

    pub fn flow(&self) -> Flow {
        match self {
            FlowInput::BusinessNames(_) => Flow::BusinessNames,
            FlowInput::BrandTaglines(_) => Flow::BrandTaglines,
            FlowInput::PitchDeck(_) => Flow::PitchDeck,
            FlowInput::LegalChecklist(_) => Flow::LegalChecklist,
            FlowInput::ImplementationPlan(_) => Flow::ImplementationPlan,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            FlowInput::BusinessNames(i) => serde_json::to_value(i),
            FlowInput::BrandTaglines(i) => serde_json::to_value(i),
            FlowInput::PitchDeck(i) => serde_json::to_value(i),
            FlowInput::LegalChecklist(i) => serde_json::to_value(i),
            FlowInput::ImplementationPlan(i) => serde_json::to_value(i),
        };
        value.unwrap_or(serde_json::Value::Null)
    }
}

// ── Outputs ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameIdea {
    pub name: String,
    pub rationale: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slide {
    pub title: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub item: String,
    pub category: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub phase: String,
    pub weeks: u16,
    pub deliverables: Vec<String>,
}

/// A checked flow result. Serializes as the object the model produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlowOutput {
    BusinessNames { names: Vec<NameIdea> },
    BrandTaglines { taglines: Vec<String> },
    PitchDeck { slides: Vec<Slide> },
    LegalChecklist { items: Vec<ChecklistItem> },
    ImplementationPlan { phases: Vec<PlanPhase> },
}

#[derive(Deserialize)]
struct NamesBody {
    names: Vec<NameIdea>,
}

#[derive(Deserialize)]
struct TaglinesBody {
    taglines: Vec<String>,
}

#[derive(Deserialize)]
struct SlidesBody {
    slides: Vec<Slide>,
}

#[derive(Deserialize)]
struct ChecklistBody {
    items: Vec<ChecklistItem>,
}

#[derive(Deserialize)]
struct PlanBody {
    phases: Vec<PlanPhase>,
}

fn violation(flow: Flow, reason: impl Into<String>) -> FlowError {
    FlowError::SchemaViolation {
        flow: flow.to_string(),
        reason: reason.into(),
    }
}

fn count_within(flow: Flow, what: &str, n: usize, min: usize, max: Option<usize>) -> Result<(), FlowError> {
    let too_many = max.is_some_and(|max| n > max);
    if n < min || too_many {
        let range = match max {
            Some(max) => format!("{min}-{max}"),
            None => format!("at least {min}"),
        };
        return Err(violation(flow, format!("expected {range} {what}, got {n}")));
    }
    Ok(())
}

fn non_empty(flow: Flow, what: &str, s: &str) -> Result<(), FlowError> {
    if s.trim().is_empty() {
        return Err(violation(flow, format!("empty {what}")));
    }
    Ok(())
}

impl FlowOutput {
    /// Parse model output (already stripped to JSON) and check its shape.
    pub fn parse(flow: Flow, json: &str) -> Result<Self, FlowError> {
        fn body<T: serde::de::DeserializeOwned>(flow: Flow, json: &str) -> Result<T, FlowError> {
            serde_json::from_str(json).map_err(|e| violation(flow, e.to_string()))
        }

        let output = match flow {
            Flow::BusinessNames => {
                let names = body::<NamesBody>(flow, json)?.names;
                count_within(flow, "names", names.len(), 3, Some(10))?;
                for idea in &names {
                    non_empty(flow, "name", &idea.name)?;
                    non_empty(flow, "rationale", &idea.rationale)?;
                }
                FlowOutput::BusinessNames { names }
            }
            Flow::BrandTaglines => {
                let taglines = body::<TaglinesBody>(flow, json)?.taglines;
                count_within(flow, "taglines", taglines.len(), 3, Some(10))?;
                for tagline in &taglines {
                    non_empty(flow, "tagline", tagline)?;
                }
                FlowOutput::BrandTaglines { taglines }
            }
            Flow::PitchDeck => {
                let slides = body::<SlidesBody>(flow, json)?.slides;
                count_within(flow, "slides", slides.len(), 5, Some(15))?;
                for slide in &slides {
                    non_empty(flow, "slide title", &slide.title)?;
                    count_within(flow, "bullets per slide", slide.bullets.len(), 1, None)?;
                }
                FlowOutput::PitchDeck { slides }
            }
            Flow::LegalChecklist => {
                let items = body::<ChecklistBody>(flow, json)?.items;
                count_within(flow, "checklist items", items.len(), 1, None)?;
                for item in &items {
                    non_empty(flow, "checklist item", &item.item)?;
                    non_empty(flow, "category", &item.category)?;
                }
                FlowOutput::LegalChecklist { items }
            }
            Flow::ImplementationPlan => {
                let phases = body::<PlanBody>(flow, json)?.phases;
                count_within(flow, "phases", phases.len(), 1, None)?;
                for phase in &phases {
                    non_empty(flow, "phase name", &phase.phase)?;
                    if phase.weeks == 0 {
                        return Err(violation(flow, format!("phase {} has zero weeks", phase.phase)));
                    }
                    count_within(flow, "deliverables per phase", phase.deliverables.len(), 1, None)?;
                }
                FlowOutput::ImplementationPlan { phases }
            }
        };
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_requires_fields_per_flow() {
        let ok = FlowInput::parse(
            Flow::PitchDeck,
            json!({"companyName": "Acme", "problem": "p", "solution": "s", "market": "m"}),
        )
        .unwrap();
        assert_eq!(ok.flow(), Flow::PitchDeck);

        let missing = FlowInput::parse(Flow::PitchDeck, json!({"companyName": "Acme"})).unwrap_err();
        assert!(matches!(missing, FlowError::InvalidInput { .. }));

        let blank = FlowInput::parse(Flow::BusinessNames, json!({"industry": "  "})).unwrap_err();
        assert!(blank.to_string().contains("industry"));
    }

    #[test]
    fn implementation_plan_timeline_bounds() {
        let err = FlowInput::parse(
            Flow::ImplementationPlan,
            json!({"projectSummary": "CRM", "timelineWeeks": 0}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("timelineWeeks"));
    }

    #[test]
    fn legal_checklist_input_uses_project_stage() {
        let input = FlowInput::parse(
            Flow::LegalChecklist,
            json!({"companyStage": "early_traction", "jurisdiction": "Delaware"}),
        )
        .unwrap();
        assert_eq!(input.to_json()["companyStage"], "early_traction");
    }

    #[test]
    fn taglines_count_is_enforced() {
        let two = r#"{"taglines": ["a", "b"]}"#;
        assert!(matches!(
            FlowOutput::parse(Flow::BrandTaglines, two),
            Err(FlowError::SchemaViolation { .. })
        ));

        let three = r#"{"taglines": ["Build boldly", "Ship sooner", "Grow together"]}"#;
        let output = FlowOutput::parse(Flow::BrandTaglines, three).unwrap();
        assert_eq!(serde_json::to_value(output).unwrap()["taglines"][2], "Grow together");
    }

    #[test]
    fn pitch_deck_slides_need_bullets() {
        let slides: Vec<_> = (0..5)
            .map(|i| json!({"title": format!("Slide {i}"), "bullets": if i == 3 { json!([]) } else { json!(["point"]) }}))
            .collect();
        let err = FlowOutput::parse(Flow::PitchDeck, &json!({"slides": slides}).to_string()).unwrap_err();
        assert!(err.to_string().contains("bullets"));
    }

    #[test]
    fn checklist_priority_is_closed() {
        let bad = r#"{"items": [{"item": "Incorporate", "category": "entity", "priority": "urgent"}]}"#;
        assert!(FlowOutput::parse(Flow::LegalChecklist, bad).is_err());

        let good = r#"{"items": [{"item": "Incorporate", "category": "entity", "priority": "high"}]}"#;
        let output = FlowOutput::parse(Flow::LegalChecklist, good).unwrap();
        match output {
            FlowOutput::LegalChecklist { items } => assert_eq!(items[0].priority, Priority::High),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[test]
    fn plan_phases_need_weeks() {
        let bad = r#"{"phases": [{"phase": "Discovery", "weeks": 0, "deliverables": ["brief"]}]}"#;
        assert!(FlowOutput::parse(Flow::ImplementationPlan, bad).is_err());
    }
}
