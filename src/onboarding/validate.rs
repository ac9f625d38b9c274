//! Per-step form validation.
//!
//! Validation belongs to the submitting form, not the router: a step only
//! advances when its form passes here.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::model::{
    AccountDetails, ConsultantAgreement, ConsultantFocus, FounderSetup, InvestorPreferences,
    InvestorQualification, LegalReview, Profile, StepForm, TekkerAgreement, TekkerProfile, Vision,
};
use super::state::Role;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,32}$").expect("valid username regex"));

const MIN_PASSWORD_LEN: usize = 8;

/// One failed field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// All field failures for one submitted form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors {
    pub fields: Vec<FieldError>,
}

impl ValidationErrors {
    fn require(&mut self, ok: bool, field: &'static str, message: impl Into<String>) {
        if !ok {
            self.fields.push(FieldError {
                field,
                message: message.into(),
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }

    fn into_result(self) -> Result<(), ValidationErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

fn filled(s: &str) -> bool {
    !s.trim().is_empty()
}

fn any_filled(items: &[String]) -> bool {
    items.iter().any(|s| filled(s))
}

/// Validate a submitted form. `role` is the record's current role, needed for
/// the account step's code-of-honor rule.
pub fn validate_form(form: &StepForm, role: Option<Role>) -> Result<(), ValidationErrors> {
    match form {
        StepForm::Welcome => Ok(()),
        StepForm::Profile(p) => profile(p),
        StepForm::Vision(v) => vision(v),
        StepForm::FounderSetup(f) => founder_setup(f),
        StepForm::TekkerProfile(t) => tekker_profile(t),
        StepForm::TekkerAgreement(t) => tekker_agreement(t),
        StepForm::ConsultantFocus(c) => consultant_focus(c),
        StepForm::ConsultantAgreement(c) => consultant_agreement(c),
        StepForm::InvestorPreferences(i) => investor_preferences(i),
        StepForm::InvestorQualification(i) => investor_qualification(i),
        StepForm::Legal(l) => legal(l),
        StepForm::Account(a) => account(a, role),
    }
}

fn profile(p: &Profile) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        p.full_name.trim().chars().count() >= 2,
        "fullName",
        "Full name must be at least 2 characters",
    );
    errors.require(
        EMAIL_RE.is_match(p.email.trim()),
        "email",
        "Enter a valid email address",
    );
    errors.require(filled(&p.country), "country", "Select a country");
    errors.into_result()
}

fn vision(v: &Vision) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        v.areas_of_interest.iter().any(|s| filled(s)),
        "areasOfInterest",
        "Pick at least one area of interest",
    );
    errors.into_result()
}

fn founder_setup(f: &FounderSetup) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(filled(&f.company_name), "companyName", "Company name is required");
    errors.require(
        f.funding_goal.is_none_or(|goal| goal > 0),
        "fundingGoal",
        "Funding goal must be positive",
    );
    errors.into_result()
}

fn tekker_profile(t: &TekkerProfile) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(any_filled(&t.skills), "skills", "List at least one skill");
    errors.require(
        t.portfolio_url
            .as_deref()
            .is_none_or(|url| url.starts_with("http://") || url.starts_with("https://")),
        "portfolioUrl",
        "Portfolio URL must start with http:// or https://",
    );
    errors.into_result()
}

fn tekker_agreement(t: &TekkerAgreement) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        t.agree_to_platform_terms,
        "agreeToPlatformTerms",
        "You must agree to the platform terms",
    );
    errors.require(
        t.understands_engagement_model,
        "understandsEngagementModel",
        "You must acknowledge the engagement model",
    );
    errors.require(
        t.agree_to_code_of_honor,
        "agreeToCodeOfHonor",
        "You must agree to the code of honor",
    );
    errors.into_result()
}

fn consultant_focus(c: &ConsultantFocus) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        any_filled(&c.specialties),
        "specialties",
        "List at least one specialty",
    );
    errors.into_result()
}

fn consultant_agreement(c: &ConsultantAgreement) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        c.agree_to_professional_conduct,
        "agreeToProfessionalConduct",
        "You must agree to the professional conduct policy",
    );
    errors.require(
        c.confidentiality_acknowledgement,
        "confidentialityAcknowledgement",
        "You must acknowledge the confidentiality terms",
    );
    errors.into_result()
}

fn investor_preferences(i: &InvestorPreferences) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        !i.preferred_stages.is_empty(),
        "preferredStages",
        "Pick at least one stage",
    );
    errors.into_result()
}

// Accreditation is self-declared and never blocks.
fn investor_qualification(i: &InvestorQualification) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        i.understand_investment_risks,
        "understandInvestmentRisks",
        "You must acknowledge the investment risks",
    );
    errors.into_result()
}

fn legal(l: &LegalReview) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        l.accept_terms_of_service,
        "acceptTermsOfService",
        "You must accept the terms of service",
    );
    errors.require(
        l.accept_privacy_policy,
        "acceptPrivacyPolicy",
        "You must accept the privacy policy",
    );
    errors.into_result()
}

fn account(a: &AccountDetails, role: Option<Role>) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();
    errors.require(
        USERNAME_RE.is_match(&a.username),
        "username",
        "Username must be 3-32 letters, digits or underscores",
    );
    errors.require(
        a.password.chars().count() >= MIN_PASSWORD_LEN,
        "password",
        format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
    );
    errors.require(
        a.password == a.verify_password,
        "verifyPassword",
        "Passwords do not match",
    );
    errors.require(a.agree_to_terms, "agreeToTerms", "You must agree to the terms");
    errors.require(
        a.agree_to_privacy,
        "agreeToPrivacy",
        "You must agree to the privacy policy",
    );
    if role == Some(Role::Tekker) {
        errors.require(
            a.agree_to_code_of_honor,
            "agreeToCodeOfHonor",
            "Tekkers must agree to the code of honor",
        );
    }
    errors.into_result()
}
