use mock_service::MockService;
use pr_reviewer_load::ScriptConfig;
use stampede_core::{Options, Stage};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::error;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                    EnvFilter::new("stampede=info,pr_reviewer_load=info,mock_service=info")
                }),
            )
            .with_test_writer()
            .try_init();
    });
}

/// A mock service on an ephemeral port, and its base URL.
#[allow(unused)]
pub async fn mock() -> (MockService, String) {
    let mock = MockService::new();
    let addr = mock.spawn().await.expect("mock service failed to bind");
    (mock, format!("http://{addr}"))
}

/// Ramp to four VUs and back down in well under a second.
#[allow(unused)]
pub fn quick_options() -> Options {
    Options::new()
        .stages(vec![
            Stage::new(Duration::from_millis(200), 4),
            Stage::new(Duration::from_millis(300), 4),
            Stage::new(Duration::from_millis(200), 0),
        ])
        .seed(0x5eed)
}

/// Script settings scaled down to match [`quick_options`].
#[allow(unused)]
pub fn quick_config(base_url: &str) -> ScriptConfig {
    ScriptConfig {
        think_time: Duration::from_millis(20),
        idle_sleep: Duration::from_millis(50),
        ..ScriptConfig::new(base_url)
    }
}
