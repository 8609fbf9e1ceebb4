use std::env;

use log::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;

/// Log targets of all crates in this repository.
///
/// Keep this in sync with the workspace member list in the root `Cargo.toml`.
pub const MERIDIAN_MODULES: &[&str] = &[
    "meridian_archive",
    "meridian_clock",
    "meridian_log",
    "meridian_primitives",
    "meridian_test_log",
    "meridian_utils",
];

pub trait TargetsExt: Sized {
    /// Sets all Meridian crates to the given level.
    fn with_meridian_targets(self, level: LevelFilter) -> Self;

    /// Overlays directives from the `RUST_LOG` environment variable, if set.
    ///
    /// Accepts the usual comma-separated `target=level` directives; a bare
    /// `level` sets the default. Unparsable directives are ignored.
    fn with_env(self) -> Self;
}

impl TargetsExt for Targets {
    fn with_meridian_targets(mut self, level: LevelFilter) -> Targets {
        for &module in MERIDIAN_MODULES {
            self = self.with_target(module, level);
        }
        self
    }

    fn with_env(mut self) -> Targets {
        let directives = match env::var("RUST_LOG") {
            Ok(directives) => directives,
            Err(_) => return self,
        };
        for directive in directives.split(',').filter(|d| !d.is_empty()) {
            match directive.split_once('=') {
                Some((target, level)) => {
                    if let Ok(level) = level.parse::<LevelFilter>() {
                        self = self.with_target(target.to_owned(), level);
                    }
                }
                None => {
                    if let Ok(level) = directive.parse::<LevelFilter>() {
                        self = self.with_default(level);
                    }
                }
            }
        }
        self
    }
}
