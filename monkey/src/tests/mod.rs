mod orchestrator_tests;

use crate::config::Configuration;
use crate::log::{EventSink, EventSource, LogEvent, MemorySink};
use crate::node::UiNode;
use crate::pass::PassContext;
use crate::platforms::memory::{MemoryDevice, MemoryNodeSpec};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

pub const TARGET: &str = "com.example.target";

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()))
        .with_test_writer()
        .try_init();
}

/// Configuration where nothing happens by chance
pub fn quiet_config() -> Configuration {
    Configuration {
        text_input_chance: 0.0,
        checkbox_tick_chance: 0.0,
        radio_tick_chance: 0.0,
        scroll_chance: 0.0,
        oauth_search_chance: 0.0,
        back_button_press_chance: 0.0,
        ..Configuration::new(TARGET)
    }
}

pub fn screen() -> MemoryNodeSpec {
    MemoryNodeSpec::new("android.widget.FrameLayout")
}

pub fn button(resource_id: &str) -> MemoryNodeSpec {
    MemoryNodeSpec::new("android.widget.Button")
        .resource_id(resource_id)
        .clickable()
}

/// Device, sink and seeded randomness for driving single passes
pub struct Harness {
    pub config: Configuration,
    pub device: MemoryDevice,
    pub sink: MemorySink,
    pub rng: ChaCha8Rng,
}

impl Harness {
    pub fn new(config: Configuration) -> Self {
        init_tracing();
        Self {
            config,
            device: MemoryDevice::new(),
            sink: MemorySink::new(),
            rng: ChaCha8Rng::seed_from_u64(7),
        }
    }

    pub fn show(&self, spec: MemoryNodeSpec) -> UiNode {
        self.device.show(spec)
    }

    /// Runs `f` inside an open log event and returns its result
    pub fn with_pass<R>(&mut self, root: &UiNode, f: impl FnOnce(&mut PassContext<'_>) -> R) -> R {
        self.sink
            .open_event(EventSource::External, root)
            .expect("open event");
        let mut ctx = PassContext::new(&self.config, &self.device, &mut self.sink, &mut self.rng);
        let result = f(&mut ctx);
        drop(ctx);
        self.sink.close_event().expect("close event");
        result
    }

    pub fn last_event(&self) -> LogEvent {
        self.sink.events().pop().expect("at least one event")
    }
}
