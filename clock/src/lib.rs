#[macro_use]
extern crate log;

pub use adapter::{RefreshingLayout, SummaryLayout};
pub use era::{EraParams, SafeZone, Shape, ShapeError, Transitions};
pub use summary::{summarize, Bound, Condition, EraSummary, PastHorizon, Summary};
pub use wallclock::{RelativeTime, SystemStart};

mod adapter;
mod era;
mod summary;
mod wallclock;
