//! Tests for single passes over a snapshot

use super::{button, init_tracing, quiet_config, screen, TARGET};
use crate::config::{Configuration, DEFAULT_LAUNCHER_PACKAGE};
use crate::errors::MonkeyError;
use crate::log::{ActionKind, EventSource, MemorySink};
use crate::orchestrator::Orchestrator;
use crate::platforms::memory::{MemoryDevice, MemoryNodeSpec};
use crate::policy::EDIT_TEXT_CLASS;
use crate::rules::PACKAGE_INSTALLER_PACKAGE;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn orchestrator(sink: &MemorySink, seed: u64) -> Orchestrator {
    Orchestrator::new(
        Box::new(sink.clone()),
        Box::new(ChaCha8Rng::seed_from_u64(seed)),
    )
}

fn busy_screen() -> MemoryNodeSpec {
    screen()
        .child(MemoryNodeSpec::new(EDIT_TEXT_CLASS).resource_id("name"))
        .child(
            MemoryNodeSpec::new("android.widget.ScrollView")
                .resource_id("scroller")
                .scrollable()
                .child(button("row1"))
                .child(button("row2")),
        )
        .child(button("submit"))
        .in_package(TARGET)
}

#[test]
fn test_scroll_takes_priority_over_click() {
    init_tracing();
    let device = MemoryDevice::new();
    let root = device.show(busy_screen());
    let sink = MemorySink::new();
    let config = Configuration {
        scroll_chance: 1.0,
        back_button_press_chance: 1.0,
        ..quiet_config()
    };

    let outcome = orchestrator(&sink, 1)
        .handle(&config, &device, &root, EventSource::External)
        .unwrap();

    assert_eq!(outcome.actions, vec![ActionKind::Scroll]);
    assert_eq!(outcome.primary(), Some(ActionKind::Scroll));
    assert_eq!(outcome.special_case, None);
}

#[test]
fn test_fill_actions_precede_the_click() {
    let device = MemoryDevice::new();
    let root = device.show(busy_screen());
    let sink = MemorySink::new();
    let config = Configuration {
        text_input_chance: 1.0,
        ..quiet_config()
    };

    let outcome = orchestrator(&sink, 1)
        .handle(&config, &device, &root, EventSource::External)
        .unwrap();

    assert_eq!(outcome.actions, vec![ActionKind::FillForm, ActionKind::Click]);
    let event = sink.events().pop().unwrap();
    assert_eq!(event.actions[0].action_id, 0);
    assert_eq!(event.actions[1].action_id, 1);
}

#[test]
fn test_special_case_skips_the_policy() {
    let device = MemoryDevice::new();
    let root = device.show(
        screen()
            .child(MemoryNodeSpec::new(EDIT_TEXT_CLASS).resource_id("field"))
            .child(button("permission_allow_button").text("ALLOW"))
            .in_package(PACKAGE_INSTALLER_PACKAGE),
    );
    let sink = MemorySink::new();
    let config = Configuration {
        text_input_chance: 1.0,
        scroll_chance: 1.0,
        ..quiet_config()
    };

    let outcome = orchestrator(&sink, 1)
        .handle(&config, &device, &root, EventSource::External)
        .unwrap();

    assert_eq!(outcome.special_case.as_deref(), Some("permission request"));
    assert_eq!(outcome.actions, vec![ActionKind::Click]);
    let event = sink.events().pop().unwrap();
    assert_eq!(event.actions.len(), 1);
    assert_eq!(event.actions[0].resource_id, "permission_allow_button");
}

#[test]
fn test_each_pass_is_one_event() {
    let device = MemoryDevice::new();
    let root = device.show(busy_screen());
    let sink = MemorySink::new();
    let config = quiet_config();
    let mut orchestrator = orchestrator(&sink, 9);

    orchestrator
        .handle(&config, &device, &root, EventSource::External)
        .unwrap();
    orchestrator
        .handle(&config, &device, &root, EventSource::Timer)
        .unwrap();

    let events = sink.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_id, 0);
    assert_eq!(events[0].source, EventSource::External);
    assert_eq!(events[1].event_id, 1);
    assert_eq!(events[1].source, EventSource::Timer);
    assert_eq!(events[0].content.class, "android.widget.FrameLayout");
    assert_eq!(events[0].content.node_count(), 6);
    assert!(!sink.has_open_event());
}

#[test]
fn test_event_is_closed_when_relaunch_fails() {
    let device = MemoryDevice::new();
    device.fail_launches(true);
    let root = device.show(screen().in_package(DEFAULT_LAUNCHER_PACKAGE));
    let sink = MemorySink::new();

    let result =
        orchestrator(&sink, 1).handle(&quiet_config(), &device, &root, EventSource::Timer);

    assert!(matches!(result, Err(MonkeyError::LaunchFailed(_))));
    assert!(!sink.has_open_event());
    let event = sink.events().pop().unwrap();
    assert_eq!(event.actions[0].kind, ActionKind::Launch);
}

#[test]
fn test_at_most_one_primary_action_per_pass() {
    let device = MemoryDevice::new();
    let sink = MemorySink::new();
    let config = Configuration {
        text_input_chance: 0.7,
        ..Configuration::new(TARGET)
    };

    for seed in 0..200 {
        let root = device.show(busy_screen());
        let outcome = orchestrator(&sink, seed)
            .handle(&config, &device, &root, EventSource::External)
            .unwrap();

        let primaries: Vec<usize> = outcome
            .actions
            .iter()
            .enumerate()
            .filter(|(_, kind)| kind.is_primary())
            .map(|(i, _)| i)
            .collect();
        assert!(primaries.len() <= 1, "seed {seed}: {:?}", outcome.actions);
        if let Some(&index) = primaries.first() {
            assert_eq!(index, outcome.actions.len() - 1, "seed {seed}");
        }
    }
}
