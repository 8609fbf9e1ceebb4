use std::{
    fmt,
    ops::{Add, Sub},
    time::Duration,
};

use time::OffsetDateTime;

/// The wall-clock instant of slot 0. Fixed per network at genesis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct SystemStart(OffsetDateTime);

impl SystemStart {
    pub fn new(start: OffsetDateTime) -> SystemStart {
        SystemStart(start)
    }

    pub fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }

    /// Time elapsed since the system start at the given instant, or `None`
    /// for instants before the chain existed.
    pub fn elapsed_at(&self, at: OffsetDateTime) -> Option<RelativeTime> {
        let elapsed = at - self.0;
        if elapsed.is_negative() {
            None
        } else {
            Some(RelativeTime(elapsed.unsigned_abs()))
        }
    }

    /// The absolute instant corresponding to the given chain-relative time.
    pub fn instant_of(&self, relative: RelativeTime) -> OffsetDateTime {
        self.0 + relative.0
    }
}

impl fmt::Display for SystemStart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Time elapsed since the system start.
///
/// All era arithmetic happens in this representation; only the boundaries of
/// the system convert to and from absolute wall-clock instants.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RelativeTime(Duration);

impl RelativeTime {
    pub const START: RelativeTime = RelativeTime(Duration::ZERO);

    pub const fn new(since_start: Duration) -> RelativeTime {
        RelativeTime(since_start)
    }

    pub const fn from_secs(secs: u64) -> RelativeTime {
        RelativeTime(Duration::from_secs(secs))
    }

    pub const fn as_duration(self) -> Duration {
        self.0
    }

    /// Time between `earlier` and `self`, or `None` if `earlier` is actually
    /// later.
    pub fn since(self, earlier: RelativeTime) -> Option<Duration> {
        self.0.checked_sub(earlier.0)
    }
}

impl Add<Duration> for RelativeTime {
    type Output = RelativeTime;

    fn add(self, rhs: Duration) -> RelativeTime {
        RelativeTime(self.0 + rhs)
    }
}

impl Sub for RelativeTime {
    type Output = Duration;

    fn sub(self, rhs: RelativeTime) -> Duration {
        self.0
            .checked_sub(rhs.0)
            .expect("relative time subtraction underflowed")
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} since start", self.0)
    }
}
