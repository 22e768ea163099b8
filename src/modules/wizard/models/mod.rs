pub mod start_payload;
pub mod wizard_data;

pub use start_payload::{ActionTag, CardPlan, PaymentParams, RunMode, StartPayload};
pub use wizard_data::{
    ApplicationCredentials, CancelRefundAction, CancelRefundSelection, CardRecord,
    CardSelectionMode, DraftUpdate, Environment, PaymentCandidate, PaymentDraft, WizardData,
};
