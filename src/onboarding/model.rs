//! Onboarding record and the per-step form models.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::state::{self, Role, Step};

/// Basic identity collected on the profile step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub full_name: String,
    pub email: String,
    pub country: String,
}

/// Role selection and interests from the vision step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vision {
    pub path: Role,
    #[serde(default)]
    pub areas_of_interest: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStage {
    Idea,
    Prototype,
    EarlyTraction,
    Scaling,
}

impl fmt::Display for ProjectStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idea => "idea",
            Self::Prototype => "prototype",
            Self::EarlyTraction => "early_traction",
            Self::Scaling => "scaling",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FounderSetup {
    pub company_name: String,
    pub project_stage: ProjectStage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_goal: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TekkerProfile {
    pub skills: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TekkerAgreement {
    pub agree_to_platform_terms: bool,
    pub understands_engagement_model: bool,
    pub agree_to_code_of_honor: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantFocus {
    pub specialties: Vec<String>,
    #[serde(default)]
    pub industries: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years_experience: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsultantAgreement {
    pub agree_to_professional_conduct: bool,
    pub confidentiality_acknowledgement: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorPreferences {
    pub preferred_stages: Vec<ProjectStage>,
    #[serde(default)]
    pub sectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_size: Option<String>,
}

/// `is_accredited_investor` is a self-declared acknowledgement. It never
/// blocks the wizard and is stored exactly as submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestorQualification {
    pub is_accredited_investor: bool,
    pub understand_investment_risks: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalReview {
    pub accept_terms_of_service: bool,
    pub accept_privacy_policy: bool,
}

/// Credentials from the account step.
///
/// Passwords are accepted on input but never serialized, so they reach
/// neither the session store nor API responses.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default, skip_serializing)]
    pub verify_password: String,
    #[serde(default, rename = "enable2FA")]
    pub enable_2fa: bool,
    #[serde(default)]
    pub agree_to_terms: bool,
    #[serde(default)]
    pub agree_to_privacy: bool,
    #[serde(default)]
    pub agree_to_code_of_honor: bool,
}

impl fmt::Debug for AccountDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountDetails")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("enable_2fa", &self.enable_2fa)
            .field("agree_to_terms", &self.agree_to_terms)
            .field("agree_to_privacy", &self.agree_to_privacy)
            .field("agree_to_code_of_honor", &self.agree_to_code_of_honor)
            .finish()
    }
}

/// The in-progress registration for one wizard session.
///
/// Serialized as a flat camelCase object; stored in the `settings` table
/// under the session id and key `"onboarding_record"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vision: Option<Vision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub founder_setup: Option<FounderSetup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tekker_profile: Option<TekkerProfile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tekker_agreement: Option<TekkerAgreement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultant_focus: Option<ConsultantFocus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consultant_agreement: Option<ConsultantAgreement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investor_preferences: Option<InvestorPreferences>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investor_qualification: Option<InvestorQualification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal: Option<LegalReview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<AccountDetails>,
    #[serde(default = "first_step")]
    pub current_step: u8,
}

fn first_step() -> u8 {
    1
}

impl Default for OnboardingRecord {
    fn default() -> Self {
        Self {
            profile: None,
            vision: None,
            founder_setup: None,
            tekker_profile: None,
            tekker_agreement: None,
            consultant_focus: None,
            consultant_agreement: None,
            investor_preferences: None,
            investor_qualification: None,
            legal: None,
            account: None,
            current_step: first_step(),
        }
    }
}

impl OnboardingRecord {
    /// The selected role, if the vision step has been submitted.
    pub fn role(&self) -> Option<Role> {
        self.vision.as_ref().map(|v| v.path)
    }

    pub fn total_steps(&self) -> u8 {
        state::total_steps(self.role())
    }

    /// The step `current_step` points at on this record's track.
    pub fn current(&self) -> Step {
        state::step_at(self.current_step, self.role())
    }

    /// Whether the data a step collects is present.
    pub fn has_step_data(&self, step: Step) -> bool {
        match step {
            Step::Welcome => true,
            Step::Profile => self.profile.is_some(),
            Step::Vision => self.vision.is_some(),
            Step::FounderSetup => self.founder_setup.is_some(),
            Step::TekkerProfile => self.tekker_profile.is_some(),
            Step::TekkerAgreement => self.tekker_agreement.is_some(),
            Step::ConsultantFocus => self.consultant_focus.is_some(),
            Step::ConsultantAgreement => self.consultant_agreement.is_some(),
            Step::InvestorPreferences => self.investor_preferences.is_some(),
            Step::InvestorQualification => self.investor_qualification.is_some(),
            Step::Legal => self.legal.is_some(),
            Step::Account => self.account.is_some(),
            Step::Complete => false,
        }
    }

    /// Shallow merge: every key present in the patch replaces the record's
    /// value wholesale.
    pub fn merge(&mut self, patch: RecordPatch) {
        let RecordPatch {
            profile,
            vision,
            founder_setup,
            tekker_profile,
            tekker_agreement,
            consultant_focus,
            consultant_agreement,
            investor_preferences,
            investor_qualification,
            legal,
            account,
            current_step,
        } = patch;

        if profile.is_some() {
            self.profile = profile;
        }
        if vision.is_some() {
            self.vision = vision;
        }
        if founder_setup.is_some() {
            self.founder_setup = founder_setup;
        }
        if tekker_profile.is_some() {
            self.tekker_profile = tekker_profile;
        }
        if tekker_agreement.is_some() {
            self.tekker_agreement = tekker_agreement;
        }
        if consultant_focus.is_some() {
            self.consultant_focus = consultant_focus;
        }
        if consultant_agreement.is_some() {
            self.consultant_agreement = consultant_agreement;
        }
        if investor_preferences.is_some() {
            self.investor_preferences = investor_preferences;
        }
        if investor_qualification.is_some() {
            self.investor_qualification = investor_qualification;
        }
        if legal.is_some() {
            self.legal = legal;
        }
        if account.is_some() {
            self.account = account;
        }
        if let Some(step) = current_step {
            self.current_step = step;
        }
        self.clamp_current_step();
    }

    /// Drop everything that belongs to a role other than `role`, plus the
    /// role-dependent legal and account records.
    pub fn retain_role(&mut self, role: Role) {
        if role != Role::FounderCeo {
            self.founder_setup = None;
        }
        if role != Role::Tekker {
            self.tekker_profile = None;
            self.tekker_agreement = None;
        }
        if role != Role::BrandConsultant {
            self.consultant_focus = None;
            self.consultant_agreement = None;
        }
        if role != Role::Investor {
            self.investor_preferences = None;
            self.investor_qualification = None;
        }
        self.legal = None;
        self.account = None;
        self.clamp_current_step();
    }

    pub(crate) fn clamp_current_step(&mut self) {
        self.current_step = self.current_step.clamp(1, self.total_steps());
    }
}

/// Partial update for [`OnboardingRecord::merge`].
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub profile: Option<Profile>,
    pub vision: Option<Vision>,
    pub founder_setup: Option<FounderSetup>,
    pub tekker_profile: Option<TekkerProfile>,
    pub tekker_agreement: Option<TekkerAgreement>,
    pub consultant_focus: Option<ConsultantFocus>,
    pub consultant_agreement: Option<ConsultantAgreement>,
    pub investor_preferences: Option<InvestorPreferences>,
    pub investor_qualification: Option<InvestorQualification>,
    pub legal: Option<LegalReview>,
    pub account: Option<AccountDetails>,
    pub current_step: Option<u8>,
}

/// A submitted step form, tagged by the step it belongs to.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "kebab-case")]
pub enum StepForm {
    Welcome,
    Profile(Profile),
    Vision(Vision),
    FounderSetup(FounderSetup),
    TekkerProfile(TekkerProfile),
    TekkerAgreement(TekkerAgreement),
    ConsultantFocus(ConsultantFocus),
    ConsultantAgreement(ConsultantAgreement),
    InvestorPreferences(InvestorPreferences),
    InvestorQualification(InvestorQualification),
    Legal(LegalReview),
    Account(AccountDetails),
}

impl StepForm {
    pub fn step(&self) -> Step {
        match self {
            Self::Welcome => Step::Welcome,
            Self::Profile(_) => Step::Profile,
            Self::Vision(_) => Step::Vision,
            Self::FounderSetup(_) => Step::FounderSetup,
            Self::TekkerProfile(_) => Step::TekkerProfile,
            Self::TekkerAgreement(_) => Step::TekkerAgreement,
            Self::ConsultantFocus(_) => Step::ConsultantFocus,
            Self::ConsultantAgreement(_) => Step::ConsultantAgreement,
            Self::InvestorPreferences(_) => Step::InvestorPreferences,
            Self::InvestorQualification(_) => Step::InvestorQualification,
            Self::Legal(_) => Step::Legal,
            Self::Account(_) => Step::Account,
        }
    }

    /// The record patch this form produces.
    pub fn into_patch(self) -> RecordPatch {
        let mut patch = RecordPatch::default();
        match self {
            Self::Welcome => {}
            Self::Profile(p) => patch.profile = Some(p),
            Self::Vision(v) => patch.vision = Some(v),
            Self::FounderSetup(f) => patch.founder_setup = Some(f),
            Self::TekkerProfile(t) => patch.tekker_profile = Some(t),
            Self::TekkerAgreement(t) => patch.tekker_agreement = Some(t),
            Self::ConsultantFocus(c) => patch.consultant_focus = Some(c),
            Self::ConsultantAgreement(c) => patch.consultant_agreement = Some(c),
            Self::InvestorPreferences(i) => patch.investor_preferences = Some(i),
            Self::InvestorQualification(i) => patch.investor_qualification = Some(i),
            Self::Legal(l) => patch.legal = Some(l),
            Self::Account(a) => patch.account = Some(a),
        }
        patch
    }
}

/// Settings keys used for onboarding persistence.
pub mod settings_keys {
    /// Key for the in-progress record, stored under the wizard session id.
    pub const ONBOARDING_RECORD: &str = "onboarding_record";
    /// Key for the credential-free snapshot stored under a new user's id.
    pub const ONBOARDING_PROFILE: &str = "onboarding_profile";
}
