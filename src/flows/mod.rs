//! Generative-text flows offered on the role dashboards.
//!
//! Each flow is one prompt template filled from a typed input, sent to the
//! configured LLM, and checked against a fixed output shape before it is
//! returned or recorded.

pub mod dashboard;
pub mod model;
pub mod prompts;
pub mod routes;
pub mod runner;

pub use dashboard::Dashboard;
pub use routes::{FlowRouteState, flow_routes};
pub use runner::{FlowConfig, FlowRunner, Generation};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::onboarding::state::Role;

/// A generative flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Flow {
    BusinessNames,
    BrandTaglines,
    PitchDeck,
    LegalChecklist,
    ImplementationPlan,
}

impl Flow {
    pub const ALL: [Flow; 5] = [
        Flow::BusinessNames,
        Flow::BrandTaglines,
        Flow::PitchDeck,
        Flow::LegalChecklist,
        Flow::ImplementationPlan,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            Flow::BusinessNames => "business-names",
            Flow::BrandTaglines => "brand-taglines",
            Flow::PitchDeck => "pitch-deck",
            Flow::LegalChecklist => "legal-checklist",
            Flow::ImplementationPlan => "implementation-plan",
        }
    }

    /// Flows shown on a role's dashboard.
    pub fn available_for(role: Role) -> &'static [Flow] {
        match role {
            Role::FounderCeo => &[
                Flow::BusinessNames,
                Flow::BrandTaglines,
                Flow::PitchDeck,
                Flow::LegalChecklist,
            ],
            Role::Tekker => &[Flow::ImplementationPlan],
            Role::BrandConsultant => &[Flow::BusinessNames, Flow::BrandTaglines],
            Role::Investor => &[Flow::PitchDeck, Flow::LegalChecklist],
        }
    }

    pub fn is_available_for(&self, role: Role) -> bool {
        Flow::available_for(role).contains(self)
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Flow::ALL
            .into_iter()
            .find(|flow| flow.slug() == s)
            .ok_or_else(|| format!("unknown flow: {s}"))
    }
}
