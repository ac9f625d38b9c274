//! Onboarding wizard: role-conditional multi-step registration.
//!
//! A session walks a fixed prefix (welcome, profile, vision) and then the
//! track of the role chosen on the vision step, ending with legal review,
//! account creation and `complete`. The step tables live in [`state`]; the
//! per-session record and its persistence in [`store`]; [`manager`] ties them
//! together with validation and the account bridge.

pub mod manager;
pub mod model;
pub mod routes;
pub mod state;
pub mod store;
pub mod validate;

pub use manager::{CompletedAccount, OnboardingManager, Transition, WizardView};
pub use model::{OnboardingRecord, RecordPatch, StepForm};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{Role, Step, StepOutline};
pub use store::OnboardingStore;
pub use validate::{FieldError, ValidationErrors};
