//! Step router: the onboarding state machine.
//!
//! Every role walks a fixed track: a shared `welcome → profile → vision`
//! prefix, a role-specific middle, and a shared `legal → account → complete`
//! suffix. The tracks below are the only place step names and numbers are
//! defined; progress indicators and navigation both read from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::model::OnboardingRecord;

/// The role chosen on the vision step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    FounderCeo,
    Tekker,
    BrandConsultant,
    Investor,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::FounderCeo,
        Role::Tekker,
        Role::BrandConsultant,
        Role::Investor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FounderCeo => "founder_ceo",
            Self::Tekker => "tekker",
            Self::BrandConsultant => "brand_consultant",
            Self::Investor => "investor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// A wizard screen. Each variant maps 1:1 to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    Welcome,
    Profile,
    Vision,
    FounderSetup,
    TekkerProfile,
    TekkerAgreement,
    ConsultantFocus,
    ConsultantAgreement,
    InvestorPreferences,
    InvestorQualification,
    Legal,
    Account,
    Complete,
}

impl Step {
    pub const ALL: [Step; 13] = [
        Step::Welcome,
        Step::Profile,
        Step::Vision,
        Step::FounderSetup,
        Step::TekkerProfile,
        Step::TekkerAgreement,
        Step::ConsultantFocus,
        Step::ConsultantAgreement,
        Step::InvestorPreferences,
        Step::InvestorQualification,
        Step::Legal,
        Step::Account,
        Step::Complete,
    ];

    /// Route path of this step, e.g. `/tekker-agreement`.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Welcome => "/welcome",
            Self::Profile => "/profile",
            Self::Vision => "/vision",
            Self::FounderSetup => "/founder-setup",
            Self::TekkerProfile => "/tekker-profile",
            Self::TekkerAgreement => "/tekker-agreement",
            Self::ConsultantFocus => "/consultant-focus",
            Self::ConsultantAgreement => "/consultant-agreement",
            Self::InvestorPreferences => "/investor-preferences",
            Self::InvestorQualification => "/investor-qualification",
            Self::Legal => "/legal",
            Self::Account => "/account",
            Self::Complete => "/complete",
        }
    }

    /// Route path without the leading slash.
    pub fn slug(&self) -> &'static str {
        &self.path()[1..]
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete)
    }

    /// The role whose track owns this step, for role-specific pages only.
    pub fn owner(&self) -> Option<Role> {
        match self {
            Self::FounderSetup => Some(Role::FounderCeo),
            Self::TekkerProfile | Self::TekkerAgreement => Some(Role::Tekker),
            Self::ConsultantFocus | Self::ConsultantAgreement => Some(Role::BrandConsultant),
            Self::InvestorPreferences | Self::InvestorQualification => Some(Role::Investor),
            _ => None,
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for Step {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let slug = s.trim_start_matches('/');
        Step::ALL
            .into_iter()
            .find(|step| step.slug() == slug)
            .ok_or_else(|| format!("unknown step: {s}"))
    }
}

// ── Track table ─────────────────────────────────────────────────────────

use Step::*;

const PREFIX: [Step; 3] = [Welcome, Profile, Vision];

/// Shown before a role is picked. Only the prefix is navigable; the tail is a
/// progress preview.
const UNSELECTED_TRACK: [Step; 5] = [Welcome, Profile, Vision, Account, Complete];

const FOUNDER_TRACK: [Step; 7] = [
    Welcome, Profile, Vision, FounderSetup, Legal, Account, Complete,
];

const TEKKER_TRACK: [Step; 8] = [
    Welcome, Profile, Vision, TekkerProfile, TekkerAgreement, Legal, Account, Complete,
];

const CONSULTANT_TRACK: [Step; 8] = [
    Welcome, Profile, Vision, ConsultantFocus, ConsultantAgreement, Legal, Account, Complete,
];

const INVESTOR_TRACK: [Step; 8] = [
    Welcome,
    Profile,
    Vision,
    InvestorPreferences,
    InvestorQualification,
    Legal,
    Account,
    Complete,
];

/// Ordered step list for a role (or for no selection yet).
pub fn track(role: Option<Role>) -> &'static [Step] {
    match role {
        None => &UNSELECTED_TRACK,
        Some(Role::FounderCeo) => &FOUNDER_TRACK,
        Some(Role::Tekker) => &TEKKER_TRACK,
        Some(Role::BrandConsultant) => &CONSULTANT_TRACK,
        Some(Role::Investor) => &INVESTOR_TRACK,
    }
}

/// Steps that can actually be navigated for a role.
fn navigable(role: Option<Role>) -> &'static [Step] {
    match role {
        None => &PREFIX,
        Some(_) => track(role),
    }
}

pub fn total_steps(role: Option<Role>) -> u8 {
    track(role).len() as u8
}

/// 1-indexed position of `step` on the role's track.
pub fn position(step: Step, role: Option<Role>) -> Option<u8> {
    track(role)
        .iter()
        .position(|s| *s == step)
        .map(|i| i as u8 + 1)
}

/// Step at a 1-indexed position, clamped to the track bounds.
pub fn step_at(n: u8, role: Option<Role>) -> Step {
    let steps = track(role);
    let idx = (n.max(1) as usize - 1).min(steps.len() - 1);
    steps[idx]
}

/// First role-specific page on a role's track.
pub fn first_role_step(role: Role) -> Step {
    match role {
        Role::FounderCeo => FounderSetup,
        Role::Tekker => TekkerProfile,
        Role::BrandConsultant => ConsultantFocus,
        Role::Investor => InvestorPreferences,
    }
}

/// Last role-specific page before `legal`.
pub fn last_role_step(role: Role) -> Step {
    match role {
        Role::FounderCeo => FounderSetup,
        Role::Tekker => TekkerAgreement,
        Role::BrandConsultant => ConsultantAgreement,
        Role::Investor => InvestorQualification,
    }
}

/// Forward transition. `None` at the terminal step, or past `vision` while no
/// role has been chosen.
pub fn next(step: Step, role: Option<Role>) -> Option<Step> {
    let steps = navigable(role);
    let idx = steps.iter().position(|s| *s == step)?;
    steps.get(idx + 1).copied()
}

/// Backward transition.
///
/// `legal` dispatches on role to that role's last page. Any role page that is
/// the first of its track, or that belongs to a role other than the current
/// one, goes back to `vision`.
pub fn back(step: Step, role: Option<Role>) -> Option<Step> {
    if step == Legal {
        return Some(match role {
            Some(role) => last_role_step(role),
            None => Vision,
        });
    }
    if let Some(owner) = step.owner() {
        if role != Some(owner) || step == first_role_step(owner) {
            return Some(Vision);
        }
    }
    let steps = navigable(role);
    let idx = steps.iter().position(|s| *s == step)?;
    idx.checked_sub(1).map(|i| steps[i])
}

/// Prerequisite guard.
///
/// Returns `target` when every earlier step on the record's track has its
/// data, otherwise the earliest step that is missing it. Targets that are not
/// on the record's track fall back to `profile` or `vision`.
pub fn resolve(target: Step, record: &OnboardingRecord) -> Step {
    let role = record.role();
    let steps = navigable(role);

    match steps.iter().position(|s| *s == target) {
        Some(idx) => steps[..idx]
            .iter()
            .copied()
            .find(|s| !record.has_step_data(*s))
            .unwrap_or(target),
        None => PREFIX
            .iter()
            .copied()
            .find(|s| !record.has_step_data(*s))
            .unwrap_or(Vision),
    }
}

/// One entry of a progress indicator.
#[derive(Debug, Clone, Serialize)]
pub struct StepOutline {
    pub step: Step,
    pub path: &'static str,
    pub position: u8,
}

/// The full ordered outline of a role's track.
pub fn outline(role: Option<Role>) -> Vec<StepOutline> {
    track(role)
        .iter()
        .enumerate()
        .map(|(i, step)| StepOutline {
            step: *step,
            path: step.path(),
            position: i as u8 + 1,
        })
        .collect()
}
