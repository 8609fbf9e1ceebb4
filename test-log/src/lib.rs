use log::level_filters::LevelFilter;
use meridian_log::TargetsExt;
pub use meridian_test_log_proc_macro::test;
use parking_lot::Once;
use tracing_subscriber::{filter::Targets, layer::SubscriberExt, util::SubscriberInitExt};

static INITIALIZE: Once = Once::new();

#[doc(hidden)]
pub fn initialize() {
    INITIALIZE.call_once(|| {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .with(
                Targets::new()
                    .with_default(LevelFilter::INFO)
                    .with_meridian_targets(LevelFilter::DEBUG)
                    .with_env(),
            )
            .init();
    });
}
