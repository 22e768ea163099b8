use super::wizard_data::{ApplicationCredentials, CardRecord, Environment, PaymentCandidate};
use crate::core::Currency;
use crate::modules::scenarios::{Scenario, ScenarioSelection};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A gateway operation the automation engine performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionTag {
    Payment,
    Cancel,
    Refund,
}

impl ActionTag {
    /// Actions implied by a selection, in execution order
    pub fn for_selection(selection: &ScenarioSelection) -> Vec<ActionTag> {
        if selection.is_all() {
            return vec![ActionTag::Payment, ActionTag::Cancel, ActionTag::Refund];
        }

        let mut actions: Vec<ActionTag> = selection
            .iter()
            .filter_map(|scenario| match scenario {
                Scenario::Payment3dsOff => Some(ActionTag::Payment),
                Scenario::Cancel => Some(ActionTag::Cancel),
                Scenario::Refund => Some(ActionTag::Refund),
                Scenario::All => None,
            })
            .collect();
        actions.sort();
        actions
    }
}

/// Whether the engine runs one action or a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Single,
    Sequence,
}

/// Validated payment parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentParams {
    pub amount: Decimal,
    pub currency: Currency,
    pub installment_count: u32,
    pub payment_type: String,
    /// Always false for the scenarios offered here
    pub three_d_secure: bool,
    #[serde(default)]
    pub options: Map<String, Value>,
}

/// Cards the engine should pay with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CardPlan {
    Automatic { count: u32 },
    Manual { cards: Vec<CardRecord> },
}

/// Everything the automation engine needs to execute a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartPayload {
    pub env: Environment,
    pub channel_id: String,
    pub application: ApplicationCredentials,
    pub scenarios: ScenarioSelection,
    pub actions: Vec<ActionTag>,
    pub run_mode: RunMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cards: Option<CardPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior_payment: Option<PaymentCandidate>,
}

impl StartPayload {
    pub fn primary_action(&self) -> Option<ActionTag> {
        self.actions.first().copied()
    }
}
