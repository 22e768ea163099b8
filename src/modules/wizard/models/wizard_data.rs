use crate::core::Currency;
use crate::modules::scenarios::{Scenario, ScenarioSelection};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Target environment of the payment gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Test,
    Preprod,
    Prod,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Preprod => write!(f, "preprod"),
            Environment::Prod => write!(f, "prod"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "preprod" => Ok(Environment::Preprod),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Unknown environment: {}", s)),
        }
    }
}

/// Merchant application credentials used against the gateway
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCredentials {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub secure_code: String,
    /// Generated at submission when left empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Generated at submission when left empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_datetime: Option<DateTime<Utc>>,
}

impl fmt::Debug for ApplicationCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplicationCredentials")
            .field("name", &self.name)
            .field("password", &"***")
            .field("secure_code", &"***")
            .field("transaction_id", &self.transaction_id)
            .field("transaction_datetime", &self.transaction_datetime)
            .finish()
    }
}

/// How test cards are chosen for a payment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardSelectionMode {
    /// The automation engine picks `card_count` cards from its pool
    #[default]
    Automatic,
    /// The operator supplies `manual_cards`
    Manual,
}

/// A test card entered by the operator
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardRecord {
    #[serde(default)]
    pub pan: String,
    /// `MM/YY`
    #[serde(default)]
    pub expiry: String,
    #[serde(default)]
    pub cvv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
}

impl CardRecord {
    /// Last four digits behind a mask
    pub fn masked_pan(&self) -> String {
        let digits: Vec<char> = self.pan.chars().filter(|c| c.is_ascii_digit()).collect();
        let tail: String = digits.iter().skip(digits.len().saturating_sub(4)).collect();
        format!("****{}", tail)
    }
}

impl fmt::Debug for CardRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardRecord")
            .field("pan", &self.masked_pan())
            .field("expiry", &self.expiry)
            .field("cvv", &"***")
            .field("holder_name", &self.holder_name)
            .finish()
    }
}

/// Cancel or refund, chosen in the action detail step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CancelRefundAction {
    Cancel,
    Refund,
}

impl CancelRefundAction {
    pub fn scenario(&self) -> Scenario {
        match self {
            CancelRefundAction::Cancel => Scenario::Cancel,
            CancelRefundAction::Refund => Scenario::Refund,
        }
    }
}

/// A previously successful payment eligible for cancel or refund
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCandidate {
    pub payment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRefundSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<CancelRefundAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate: Option<PaymentCandidate>,
}

/// Payment parameters as entered, possibly incomplete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDraft {
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub currency: Currency,
    #[serde(default = "default_installments")]
    pub installment_count: u32,
    #[serde(default)]
    pub payment_type: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

fn default_installments() -> u32 {
    1
}

impl Default for PaymentDraft {
    fn default() -> Self {
        Self {
            amount: None,
            currency: Currency::default(),
            installment_count: default_installments(),
            payment_type: String::new(),
            options: Map::new(),
        }
    }
}

/// The accumulated draft of a test run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardData {
    #[serde(default)]
    pub scenarios: ScenarioSelection,
    #[serde(default)]
    pub env: Option<Environment>,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub application: ApplicationCredentials,
    #[serde(default)]
    pub card_selection_mode: CardSelectionMode,
    #[serde(default)]
    pub manual_cards: Vec<CardRecord>,
    #[serde(default)]
    pub card_count: u32,
    #[serde(default)]
    pub cancel_refund: CancelRefundSelection,
    #[serde(default)]
    pub payment: PaymentDraft,
}

impl Default for WizardData {
    fn default() -> Self {
        Self {
            scenarios: ScenarioSelection::new(),
            env: None,
            channel_id: String::new(),
            application: ApplicationCredentials::default(),
            card_selection_mode: CardSelectionMode::Automatic,
            manual_cards: Vec::new(),
            card_count: 1,
            cancel_refund: CancelRefundSelection::default(),
            payment: PaymentDraft::default(),
        }
    }
}

/// A change to one wizard step's fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "camelCase")]
pub enum DraftUpdate {
    #[serde(rename_all = "camelCase")]
    Environment { env: Environment, channel_id: String },

    #[serde(rename_all = "camelCase")]
    Application { application: ApplicationCredentials },

    #[serde(rename_all = "camelCase")]
    Payment { payment: PaymentDraft },

    #[serde(rename_all = "camelCase")]
    Cards {
        mode: CardSelectionMode,
        #[serde(default)]
        manual_cards: Vec<CardRecord>,
        #[serde(default)]
        card_count: Option<u32>,
    },

    #[serde(rename_all = "camelCase")]
    ActionDetail {
        #[serde(default)]
        action: Option<CancelRefundAction>,
        #[serde(default)]
        candidate: Option<PaymentCandidate>,
    },
}

impl DraftUpdate {
    pub fn label(&self) -> &'static str {
        match self {
            DraftUpdate::Environment { .. } => "environment",
            DraftUpdate::Application { .. } => "application",
            DraftUpdate::Payment { .. } => "payment",
            DraftUpdate::Cards { .. } => "cards",
            DraftUpdate::ActionDetail { .. } => "actionDetail",
        }
    }
}

impl WizardData {
    pub fn apply(&mut self, update: DraftUpdate) {
        match update {
            DraftUpdate::Environment { env, channel_id } => {
                self.env = Some(env);
                self.channel_id = channel_id;
            }
            DraftUpdate::Application { application } => self.application = application,
            DraftUpdate::Payment { payment } => self.payment = payment,
            DraftUpdate::Cards {
                mode,
                manual_cards,
                card_count,
            } => {
                self.card_selection_mode = mode;
                self.manual_cards = manual_cards;
                if let Some(count) = card_count {
                    self.card_count = count;
                }
            }
            DraftUpdate::ActionDetail { action, candidate } => {
                self.cancel_refund = CancelRefundSelection { action, candidate };
            }
        }
    }
}
