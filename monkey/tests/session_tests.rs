use monkey::platforms::memory::{DeviceEvent, MemoryDevice, MemoryNodeSpec};
use monkey::{
    ActionKind, Configuration, EventSource, GlobalAction, MemorySink, MonkeyError,
    SchedulerState, Session, SessionCounters, SessionStatus, UiNode,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

const TARGET: &str = "com.example.target";

fn setup_logging() {
    let _ = tracing_subscriber::fmt::Subscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Clicks only, so every pass records exactly one action
fn config() -> Configuration {
    Configuration {
        text_input_chance: 0.0,
        checkbox_tick_chance: 0.0,
        radio_tick_chance: 0.0,
        scroll_chance: 0.0,
        oauth_search_chance: 0.0,
        back_button_press_chance: 0.0,
        max_reps: 100,
        max_sets: 100,
        ..Configuration::new(TARGET)
    }
}

fn app_screen() -> MemoryNodeSpec {
    MemoryNodeSpec::new("android.widget.FrameLayout")
        .child(
            MemoryNodeSpec::new("android.widget.Button")
                .resource_id("com.example.target:id/next")
                .clickable(),
        )
        .in_package(TARGET)
}

struct Fixture {
    device: Arc<MemoryDevice>,
    sink: MemorySink,
    session: Session,
}

impl Fixture {
    fn new(config: Configuration) -> Self {
        setup_logging();
        let device = Arc::new(MemoryDevice::new());
        let sink = MemorySink::new();
        let session = Session::new(
            config,
            device.clone(),
            device.clone(),
            Box::new(sink.clone()),
            Box::new(ChaCha8Rng::seed_from_u64(11)),
        )
        .expect("valid configuration");
        Self {
            device,
            sink,
            session,
        }
    }

    fn show(&self) -> UiNode {
        self.device.show(app_screen())
    }

    async fn deliver(&self) {
        let root = self.show();
        self.session
            .on_snapshot_delivered(root)
            .await
            .expect("pass succeeds");
    }

    fn sources(&self) -> Vec<EventSource> {
        self.sink.events().iter().map(|e| e.source).collect()
    }
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn test_start_launches_target() {
    let fixture = Fixture::new(config());

    fixture.session.start().await.unwrap();

    assert!(fixture.session.is_running().await);
    assert_eq!(
        fixture.device.events(),
        vec![
            DeviceEvent::InputDelivery(true),
            DeviceEvent::Launch(TARGET.to_string()),
        ]
    );
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_start_failure_is_fatal() {
    let fixture = Fixture::new(config());
    fixture.device.fail_launches(true);

    let result = fixture.session.start().await;

    assert!(matches!(result, Err(MonkeyError::LaunchFailed(_))));
    assert!(fixture.session.is_terminated());
    assert_eq!(
        fixture.device.events(),
        vec![
            DeviceEvent::InputDelivery(true),
            DeviceEvent::InputDelivery(false),
            DeviceEvent::Status {
                package: TARGET.to_string(),
                status: SessionStatus::Failed,
            },
        ]
    );
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_runs_a_pass_and_arms_the_timer() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();

    fixture.deliver().await;

    let events = fixture.sink.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].source, EventSource::External);
    assert_eq!(events[0].actions[0].kind, ActionKind::Click);
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Armed);
}

#[tokio::test(start_paused = true)]
async fn test_timer_keeps_exploring_when_ui_is_quiet() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.deliver().await;

    // Fires at 200, 400 and 600 ms
    sleep_ms(690).await;

    assert_eq!(
        fixture.sources(),
        vec![
            EventSource::External,
            EventSource::Timer,
            EventSource::Timer,
            EventSource::Timer,
        ]
    );
    assert_eq!(fixture.session.counters().await.current_rep, 4);
}

#[tokio::test(start_paused = true)]
async fn test_organic_delivery_postpones_the_timer() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.deliver().await;

    sleep_ms(150).await;
    fixture.deliver().await;
    sleep_ms(150).await;

    // The first timer was replaced before it could fire
    assert_eq!(
        fixture.sources(),
        vec![EventSource::External, EventSource::External]
    );

    sleep_ms(70).await;
    assert_eq!(fixture.sources().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_tree_is_retried_once() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.deliver().await;
    fixture.device.hide_tree_for(1);

    // Fire at 200 ms, retry read at 250 ms
    sleep_ms(230).await;
    assert_eq!(fixture.sources().len(), 1);
    sleep_ms(40).await;

    assert_eq!(
        fixture.sources(),
        vec![EventSource::External, EventSource::Timer]
    );
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Armed);
}

#[tokio::test(start_paused = true)]
async fn test_previous_snapshot_reused_while_tree_is_gone() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.deliver().await;
    fixture.device.clear_foreground();
    fixture.device.clear_events();

    // Passes at 250, 500 and 750 ms, each after a failed read and its retry
    sleep_ms(760).await;

    assert_eq!(
        fixture.sources(),
        vec![
            EventSource::External,
            EventSource::Timer,
            EventSource::Timer,
            EventSource::Timer,
        ]
    );
    assert!(!fixture
        .device
        .events()
        .contains(&DeviceEvent::Global(GlobalAction::Recents)));
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Armed);

    // A fresh read takes over again
    fixture.show();
    sleep_ms(200).await;
    assert_eq!(fixture.sources().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_delivery_waits_for_a_firing_timer() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.deliver().await;
    fixture.device.hide_tree_for(1);

    // The timer fires at 200 ms and holds the session until its retry read
    sleep_ms(210).await;
    let session = fixture.session.clone();
    let root = fixture.show();
    let delivery = tokio::spawn(async move { session.on_snapshot_delivered(root).await });

    sleep_ms(30).await;
    assert!(!delivery.is_finished());
    assert_eq!(fixture.sources(), vec![EventSource::External]);

    sleep_ms(20).await;
    delivery.await.unwrap().unwrap();

    assert_eq!(
        fixture.sources(),
        vec![
            EventSource::External,
            EventSource::Timer,
            EventSource::External,
        ]
    );
    assert_eq!(fixture.session.counters().await.current_rep, 3);
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Armed);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_all_timers_is_idempotent() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.deliver().await;

    fixture.session.cancel_all_timers().await;
    fixture.session.cancel_all_timers().await;

    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Idle);
    sleep_ms(1000).await;
    assert_eq!(fixture.sink.events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sets_and_session_end() {
    let fixture = Fixture::new(Configuration {
        max_reps: 2,
        max_sets: 2,
        ..config()
    });
    fixture.session.start().await.unwrap();
    fixture.device.clear_events();

    for _ in 0..4 {
        fixture.deliver().await;
    }

    // The snapshot completing the last set is not explored
    let log = fixture.sink.snapshot();
    assert_eq!(log.files.len(), 2);
    assert_eq!(log.files[0].len(), 1);
    assert_eq!(log.files[1].len(), 2);
    assert!(log.current.is_empty());

    let host_events: Vec<DeviceEvent> = fixture
        .device
        .events()
        .into_iter()
        .filter(|e| !matches!(e, DeviceEvent::NodeAction { .. }))
        .collect();
    assert_eq!(
        host_events,
        vec![
            DeviceEvent::CaptureLogs {
                package: TARGET.to_string(),
                set: 0,
            },
            DeviceEvent::CaptureLogs {
                package: TARGET.to_string(),
                set: 1,
            },
            DeviceEvent::InputDelivery(false),
            DeviceEvent::Status {
                package: TARGET.to_string(),
                status: SessionStatus::Done,
            },
            DeviceEvent::Terminate,
        ]
    );

    assert!(fixture.session.is_terminated());
    assert!(!fixture.session.is_running().await);
    assert_eq!(fixture.session.counters().await, SessionCounters::default());
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Terminated);

    // Later snapshots are ignored
    fixture.deliver().await;
    assert_eq!(fixture.sink.events().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_app_data_is_cleared_only_with_root() {
    for root_access in [false, true] {
        let fixture = Fixture::new(
            Configuration {
                max_reps: 1,
                max_sets: 3,
                ..config()
            }
            .with_root_access(root_access),
        );
        fixture.session.start().await.unwrap();
        fixture.deliver().await;

        let cleared = fixture
            .device
            .events()
            .contains(&DeviceEvent::ClearAppData(TARGET.to_string()));
        assert_eq!(cleared, root_access);
    }
}

#[tokio::test(start_paused = true)]
async fn test_set_follows_delivery_count() {
    let reps = 3;
    let fixture = Fixture::new(Configuration {
        max_reps: reps,
        max_sets: 100,
        ..config()
    });
    fixture.session.start().await.unwrap();

    for n in 1..=10u32 {
        fixture.deliver().await;
        let counters = fixture.session.counters().await;
        assert_eq!(counters.current_set, n / reps);
        assert_eq!(counters.current_rep, n % reps);
    }
}

#[tokio::test(start_paused = true)]
async fn test_timer_alone_finishes_the_session() {
    let fixture = Fixture::new(Configuration {
        max_reps: 3,
        max_sets: 2,
        ..config()
    });
    fixture.session.start().await.unwrap();
    fixture.deliver().await;

    tokio::time::timeout(Duration::from_secs(60), fixture.session.terminated())
        .await
        .expect("session terminates");

    assert!(fixture.device.is_terminated());
    assert_eq!(fixture.sink.events().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_launcher_during_exploration_relaunches() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.device.clear_events();

    let launcher = fixture.device.show(
        MemoryNodeSpec::new("android.widget.FrameLayout")
            .in_package(&fixture.session.config().launcher_package_name),
    );
    fixture.session.on_snapshot_delivered(launcher).await.unwrap();

    assert_eq!(
        fixture.device.events(),
        vec![DeviceEvent::Launch(TARGET.to_string())]
    );
    assert_eq!(fixture.sink.events()[0].actions[0].kind, ActionKind::Launch);
}

#[tokio::test(start_paused = true)]
async fn test_failed_relaunch_ends_the_session() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.device.fail_launches(true);

    let launcher = fixture.device.show(
        MemoryNodeSpec::new("android.widget.FrameLayout")
            .in_package(&fixture.session.config().launcher_package_name),
    );
    let result = fixture.session.on_snapshot_delivered(launcher).await;

    assert!(matches!(result, Err(MonkeyError::LaunchFailed(_))));
    assert!(fixture.session.is_terminated());
    assert!(fixture.device.events().contains(&DeviceEvent::Status {
        package: TARGET.to_string(),
        status: SessionStatus::Failed,
    }));
    assert_eq!(fixture.session.scheduler_state().await, SchedulerState::Terminated);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_is_idempotent() {
    let fixture = Fixture::new(config());
    fixture.session.start().await.unwrap();
    fixture.deliver().await;

    fixture.session.shutdown().await;
    fixture.session.shutdown().await;

    assert!(fixture.session.is_terminated());
    fixture.session.terminated().await;
    assert_eq!(fixture.sink.snapshot().files.len(), 1);

    sleep_ms(1000).await;
    fixture.deliver().await;
    assert_eq!(fixture.sink.events().len(), 1);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let device = Arc::new(MemoryDevice::new());
    let result = Session::configure(
        Configuration {
            max_sets: 0,
            ..config()
        },
        device.clone(),
        device,
        Box::new(MemorySink::new()),
    );
    assert!(matches!(result, Err(MonkeyError::InvalidConfig(_))));
}
