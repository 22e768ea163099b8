use crate::core::{AppError, Result, ValidationErrors};
use crate::modules::wizard::models::{
    ActionTag, CardPlan, CardRecord, CardSelectionMode, PaymentParams, RunMode, StartPayload,
    WizardData,
};
use chrono::Utc;

/// Largest installment plan the gateway accepts
pub const MAX_INSTALLMENTS: u32 = 12;

/// Upper bound on cards drawn automatically for one run
pub const MAX_AUTOMATIC_CARDS: u32 = 10;

pub fn validate_scenarios(data: &WizardData) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if data.scenarios.is_empty() {
        errors.push("scenarios", "select at least one scenario");
    }
    errors
}

pub fn validate_environment(data: &WizardData) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if data.env.is_none() {
        errors.push("env", "is required");
    }
    errors.require_text("channelId", &data.channel_id);
    errors
}

/// Credentials always; payment parameters only when the run makes a payment
pub fn validate_application(data: &WizardData) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    errors.require_text("application.name", &data.application.name);
    errors.require_text("application.password", &data.application.password);
    errors.require_text("application.secureCode", &data.application.secure_code);

    if data.scenarios.requires_payment() {
        let payment = &data.payment;
        match payment.amount {
            None => errors.push("payment.amount", "is required"),
            Some(amount) => {
                if let Err(msg) = payment.currency.validate_amount(amount) {
                    errors.push("payment.amount", msg);
                }
            }
        }
        if payment.installment_count == 0 || payment.installment_count > MAX_INSTALLMENTS {
            errors.push(
                "payment.installmentCount",
                format!("must be between 1 and {}", MAX_INSTALLMENTS),
            );
        }
        errors.require_text("payment.paymentType", &payment.payment_type);
    }

    errors
}

fn validate_card(errors: &mut ValidationErrors, index: usize, card: &CardRecord) {
    let pan: String = card.pan.chars().filter(|c| !c.is_whitespace()).collect();
    if pan.is_empty() {
        errors.push(format!("manualCards[{}].pan", index), "is required");
    } else if !pan.chars().all(|c| c.is_ascii_digit()) || !(12..=19).contains(&pan.len()) {
        errors.push(format!("manualCards[{}].pan", index), "must be 12 to 19 digits");
    }

    let expiry_ok = card
        .expiry
        .split_once('/')
        .and_then(|(mm, yy)| {
            let month: u32 = mm.parse().ok()?;
            (yy.len() == 2 && yy.chars().all(|c| c.is_ascii_digit())).then_some(month)
        })
        .is_some_and(|month| (1..=12).contains(&month));
    if !expiry_ok {
        errors.push(format!("manualCards[{}].expiry", index), "must be MM/YY");
    }

    let cvv_ok = (3..=4).contains(&card.cvv.len()) && card.cvv.chars().all(|c| c.is_ascii_digit());
    if !cvv_ok {
        errors.push(format!("manualCards[{}].cvv", index), "must be 3 or 4 digits");
    }
}

/// Cards are only needed when the run makes a payment
pub fn validate_cards(data: &WizardData) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if !data.scenarios.requires_payment() {
        return errors;
    }

    match data.card_selection_mode {
        CardSelectionMode::Automatic => {
            if data.card_count == 0 || data.card_count > MAX_AUTOMATIC_CARDS {
                errors.push(
                    "cardCount",
                    format!("must be between 1 and {}", MAX_AUTOMATIC_CARDS),
                );
            }
        }
        CardSelectionMode::Manual => {
            if data.manual_cards.is_empty() {
                errors.push("manualCards", "add at least one card");
            }
            for (index, card) in data.manual_cards.iter().enumerate() {
                validate_card(&mut errors, index, card);
            }
        }
    }

    errors
}

/// CANCEL and REFUND need a prior successful payment to act on
pub fn validate_action_detail(data: &WizardData) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if !data.scenarios.requires_candidate() {
        return errors;
    }

    match &data.cancel_refund.candidate {
        None => errors.push("cancelRefund.candidate", "select a prior successful payment"),
        Some(candidate) => errors.require_text("cancelRefund.candidate.paymentId", &candidate.payment_id),
    }

    if let Some(action) = data.cancel_refund.action {
        if !data.scenarios.contains(action.scenario()) {
            errors.push("cancelRefund.action", "is not part of the selected scenarios");
        }
    }

    errors
}

/// Validates the whole draft and assembles the payload handed to the engine
pub fn build_start_payload(data: &WizardData) -> Result<StartPayload> {
    let mut errors = validate_scenarios(data);
    errors.extend(validate_environment(data));
    errors.extend(validate_application(data));
    errors.extend(validate_cards(data));
    errors.extend(validate_action_detail(data));
    errors.into_result()?;

    let env = data
        .env
        .ok_or_else(|| AppError::internal("environment missing after validation"))?;

    let mut application = data.application.clone();
    if application
        .transaction_id
        .as_deref()
        .is_none_or(|id| id.trim().is_empty())
    {
        application.transaction_id = Some(uuid::Uuid::new_v4().simple().to_string());
    }
    if application.transaction_datetime.is_none() {
        application.transaction_datetime = Some(Utc::now());
    }

    let (payment, cards) = if data.scenarios.requires_payment() {
        let amount = data
            .payment
            .amount
            .ok_or_else(|| AppError::internal("payment amount missing after validation"))?;
        let payment = PaymentParams {
            amount,
            currency: data.payment.currency,
            installment_count: data.payment.installment_count,
            payment_type: data.payment.payment_type.trim().to_string(),
            three_d_secure: false,
            options: data.payment.options.clone(),
        };
        let cards = match data.card_selection_mode {
            CardSelectionMode::Automatic => CardPlan::Automatic {
                count: data.card_count,
            },
            CardSelectionMode::Manual => CardPlan::Manual {
                cards: data.manual_cards.clone(),
            },
        };
        (Some(payment), Some(cards))
    } else {
        (None, None)
    };

    let prior_payment = if data.scenarios.requires_candidate() {
        data.cancel_refund.candidate.clone()
    } else {
        None
    };

    let actions = ActionTag::for_selection(&data.scenarios);
    let run_mode = if actions.len() == 1 {
        RunMode::Single
    } else {
        RunMode::Sequence
    };

    Ok(StartPayload {
        env,
        channel_id: data.channel_id.trim().to_string(),
        application,
        scenarios: data.scenarios.clone(),
        actions,
        run_mode,
        payment,
        cards,
        prior_payment,
    })
}
