use insight_core::nodes::{analyze, quality, router};
use insight_core::state_machine::{allowed_transitions, validate_transition};
use insight_core::{
    Message, MetricRecord, PhaseTracker, Route, RoutingLabel, StateUpdate, StepKind,
    WorkflowPhase, WorkflowState,
};
use proptest::prelude::*;
use std::collections::BTreeSet;

const CATEGORIES: [&str; 6] = ["sales", "marketing", "ops", "finance", "support", "hr"];

const PHASES: [WorkflowPhase; 8] = [
    WorkflowPhase::Start,
    WorkflowPhase::Analyzed,
    WorkflowPhase::Generated,
    WorkflowPhase::Gated,
    WorkflowPhase::Regenerating,
    WorkflowPhase::Formatted,
    WorkflowPhase::Done,
    WorkflowPhase::Failed,
];

fn record_strategy() -> impl Strategy<Value = MetricRecord> {
    (any::<i64>(), -1.0e9..1.0e9f64, 0..CATEGORIES.len())
        .prop_map(|(id, value, c)| MetricRecord::new(id, format!("m{id}"), value, CATEGORIES[c]))
}

fn label_strategy() -> impl Strategy<Value = RoutingLabel> {
    prop_oneof![
        Just(RoutingLabel::Continue),
        Just(RoutingLabel::Regenerate),
        Just(RoutingLabel::End),
    ]
}

proptest! {
    #[test]
    fn prop_analysis_matches_batch(records in proptest::collection::vec(record_strategy(), 1..50)) {
        let analysis = analyze::analyze(&records).unwrap();

        let min = records.iter().map(|r| r.value).fold(f64::INFINITY, f64::min);
        let max = records.iter().map(|r| r.value).fold(f64::NEG_INFINITY, f64::max);
        let categories: BTreeSet<String> = records.iter().map(|r| r.category.clone()).collect();

        prop_assert_eq!(analysis.count, records.len());
        prop_assert_eq!(analysis.min, min);
        prop_assert_eq!(analysis.max, max);
        prop_assert_eq!(&analysis.categories, &categories);

        // Deterministic on repeated invocation.
        prop_assert_eq!(analyze::analyze(&records).unwrap(), analysis);
    }

    #[test]
    fn prop_confidence_in_unit_interval(insights in proptest::collection::vec(".{0,200}", 0..10)) {
        let confidence = quality::score(&insights);
        prop_assert!((0.0..=1.0).contains(&confidence.value()));
        if insights.is_empty() {
            prop_assert_eq!(confidence.value(), 0.0);
        } else {
            prop_assert!(confidence.value() >= 0.5);
        }
    }

    #[test]
    fn prop_insights_only_grow(batches in proptest::collection::vec(
        proptest::collection::vec("[a-z ]{1,30}", 0..5), 1..8)
    ) {
        let mut state = WorkflowState::new(vec![MetricRecord::new(1, "m", 1.0, "sales")]);
        let mut expected: Vec<String> = Vec::new();

        for batch in batches {
            let before = state.insights().to_vec();
            state.apply(
                StateUpdate::new(StepKind::Generate)
                    .append_insights(batch.clone())
                    .append_history([Message::human("q"), Message::assistant("a")]),
            ).unwrap();
            expected.extend(batch);

            prop_assert!(state.insights().len() >= before.len());
            prop_assert_eq!(&state.insights()[..before.len()], before.as_slice());
        }
        prop_assert_eq!(state.insights(), expected.as_slice());
    }

    #[test]
    fn prop_router_terminates_within_budget(
        max_retries in 0..10u32,
        labels in proptest::collection::vec(label_strategy(), 1..40)
    ) {
        let mut retry_count = 0;
        let mut generate_calls = 1;

        for label in labels {
            match router::route(label, retry_count, max_retries) {
                Route::Generate { retry_count: next } => {
                    prop_assert_eq!(next, retry_count + 1);
                    retry_count = next;
                    generate_calls += 1;
                }
                Route::Format { forced } => {
                    prop_assert_eq!(forced, label == RoutingLabel::Regenerate);
                    break;
                }
            }
        }

        prop_assert!(retry_count <= max_retries);
        prop_assert_eq!(generate_calls, retry_count + 1);
        prop_assert!(generate_calls <= max_retries + 1);
    }

    #[test]
    fn prop_tracker_follows_transition_table(steps in proptest::collection::vec(0..PHASES.len(), 0..30)) {
        let mut tracker = PhaseTracker::new();
        for index in steps {
            let from = tracker.current();
            let to = PHASES[index];
            let allowed = allowed_transitions(from).contains(&to);

            prop_assert_eq!(validate_transition(from, to).is_ok(), allowed);
            prop_assert_eq!(tracker.advance(to).is_ok(), allowed);
            prop_assert_eq!(tracker.current(), if allowed { to } else { from });
            if from.is_terminal() {
                prop_assert!(!allowed);
            }
        }
    }
}
