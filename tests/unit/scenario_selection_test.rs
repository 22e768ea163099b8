use paylab::modules::scenarios::{Scenario, ScenarioSelection};
use proptest::prelude::*;

fn scenario() -> impl Strategy<Value = Scenario> {
    prop_oneof![
        Just(Scenario::All),
        Just(Scenario::Payment3dsOff),
        Just(Scenario::Cancel),
        Just(Scenario::Refund),
    ]
}

fn selection(toggles: &[Scenario]) -> ScenarioSelection {
    toggles.iter().copied().collect()
}

#[test]
fn test_all_toggles_on_then_off() {
    let mut selection = ScenarioSelection::new();
    selection.toggle(Scenario::All);
    assert_eq!(selection.iter().collect::<Vec<_>>(), vec![Scenario::All]);

    selection.toggle(Scenario::All);
    assert!(selection.is_empty());
}

#[test]
fn test_other_scenario_removes_all() {
    let mut selection = selection(&[Scenario::All]);
    selection.toggle(Scenario::Cancel);
    assert_eq!(selection.iter().collect::<Vec<_>>(), vec![Scenario::Cancel]);
}

#[test]
fn test_multi_select_toggle() {
    let mut selection = selection(&[Scenario::Payment3dsOff, Scenario::Cancel]);
    assert!(selection.contains(Scenario::Payment3dsOff));
    assert!(selection.contains(Scenario::Cancel));
    assert_eq!(selection.len(), 2);

    selection.toggle(Scenario::Payment3dsOff);
    assert_eq!(selection.iter().collect::<Vec<_>>(), vec![Scenario::Cancel]);
}

#[test]
fn test_serialized_as_scenario_names() {
    let selection = selection(&[Scenario::Refund, Scenario::Payment3dsOff]);
    let json = serde_json::to_value(&selection).unwrap();
    assert_eq!(json, serde_json::json!(["PAYMENT_3DS_OFF", "REFUND"]));
}

proptest! {
    #[test]
    fn prop_all_is_exclusive(toggles in prop::collection::vec(scenario(), 0..24)) {
        let selection = selection(&toggles);
        if selection.contains(Scenario::All) {
            prop_assert_eq!(selection.len(), 1);
        }
    }

    #[test]
    fn prop_toggling_all_replaces_or_clears(toggles in prop::collection::vec(scenario(), 0..24)) {
        let mut selection = selection(&toggles);
        let had_all = selection.is_all();
        selection.toggle(Scenario::All);
        if had_all {
            prop_assert!(selection.is_empty());
        } else {
            prop_assert!(selection.is_all());
            prop_assert_eq!(selection.len(), 1);
        }
    }

    #[test]
    fn prop_double_toggle_restores_selection_without_all(
        toggles in prop::collection::vec(scenario(), 0..24),
        extra in scenario(),
    ) {
        prop_assume!(extra != Scenario::All);
        let mut selection = selection(&toggles);
        selection.toggle(extra);
        let before = selection.clone();

        selection.toggle(extra);
        selection.toggle(extra);
        prop_assert_eq!(selection, before);
    }

    #[test]
    fn prop_candidate_needed_only_without_all(toggles in prop::collection::vec(scenario(), 0..24)) {
        let selection = selection(&toggles);
        let expected = !selection.is_all()
            && (selection.contains(Scenario::Cancel) || selection.contains(Scenario::Refund));
        prop_assert_eq!(selection.requires_candidate(), expected);
    }
}
