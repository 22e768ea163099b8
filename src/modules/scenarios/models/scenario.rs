use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A named category of test flow the operator can select
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scenario {
    /// Payment, cancel and refund in sequence
    #[serde(rename = "ALL")]
    All,

    /// Single payment without a 3-D Secure challenge
    #[serde(rename = "PAYMENT_3DS_OFF")]
    Payment3dsOff,

    /// Cancel against an existing successful payment
    #[serde(rename = "CANCEL")]
    Cancel,

    /// Refund against an existing successful payment
    #[serde(rename = "REFUND")]
    Refund,
}

impl Scenario {
    pub const VARIANTS: [Scenario; 4] = [
        Scenario::All,
        Scenario::Payment3dsOff,
        Scenario::Cancel,
        Scenario::Refund,
    ];

    /// Whether this scenario targets a previously successful payment
    pub fn targets_prior_payment(&self) -> bool {
        matches!(self, Scenario::Cancel | Scenario::Refund)
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scenario::All => write!(f, "ALL"),
            Scenario::Payment3dsOff => write!(f, "PAYMENT_3DS_OFF"),
            Scenario::Cancel => write!(f, "CANCEL"),
            Scenario::Refund => write!(f, "REFUND"),
        }
    }
}

impl std::str::FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ALL" => Ok(Scenario::All),
            "PAYMENT_3DS_OFF" => Ok(Scenario::Payment3dsOff),
            "CANCEL" => Ok(Scenario::Cancel),
            "REFUND" => Ok(Scenario::Refund),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}

/// The set of scenarios selected for one run
///
/// `ALL` never coexists with another scenario: selecting it replaces the set,
/// and selecting anything else drops it first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioSelection(BTreeSet<Scenario>);

impl ScenarioSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies the multi-select toggle rule for `scenario`
    pub fn toggle(&mut self, scenario: Scenario) {
        match scenario {
            Scenario::All => {
                if self.0.contains(&Scenario::All) {
                    self.0.clear();
                } else {
                    self.0.clear();
                    self.0.insert(Scenario::All);
                }
            }
            other => {
                self.0.remove(&Scenario::All);
                if !self.0.remove(&other) {
                    self.0.insert(other);
                }
            }
        }
    }

    pub fn contains(&self, scenario: Scenario) -> bool {
        self.0.contains(&scenario)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Scenario> + '_ {
        self.0.iter().copied()
    }

    pub fn is_all(&self) -> bool {
        self.contains(Scenario::All)
    }

    /// True when the run issues a fresh payment (and therefore needs cards and payment parameters)
    pub fn requires_payment(&self) -> bool {
        self.contains(Scenario::All) || self.contains(Scenario::Payment3dsOff)
    }

    /// True when the run targets a prior payment picked by the operator
    pub fn requires_candidate(&self) -> bool {
        !self.is_all() && self.0.iter().any(Scenario::targets_prior_payment)
    }
}

impl FromIterator<Scenario> for ScenarioSelection {
    /// Builds a selection by toggling each scenario in order
    fn from_iter<I: IntoIterator<Item = Scenario>>(iter: I) -> Self {
        let mut selection = ScenarioSelection::new();
        for scenario in iter {
            selection.toggle(scenario);
        }
        selection
    }
}
