use chrono::{DateTime, Utc};

use crate::errors::DomainError;

/// Supplies the single reference instant shared by every customer in a run.
pub trait ReferenceClock: Send + Sync {
    fn now(&self) -> Result<DateTime<Utc>, DomainError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl ReferenceClock for SystemClock {
    fn now(&self) -> Result<DateTime<Utc>, DomainError> {
        Ok(Utc::now())
    }
}

/// A frozen instant, for reproducible re-runs over the same snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl ReferenceClock for FixedClock {
    fn now(&self) -> Result<DateTime<Utc>, DomainError> {
        Ok(self.0)
    }
}

/// An instant pinned by an operator as RFC 3339 text, parsed when the run starts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PinnedClock {
    raw: String,
}

impl PinnedClock {
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }
}

impl ReferenceClock for PinnedClock {
    fn now(&self) -> Result<DateTime<Utc>, DomainError> {
        DateTime::parse_from_rfc3339(self.raw.trim())
            .map(|instant| instant.with_timezone(&Utc))
            .map_err(|error| {
                DomainError::ReferenceTimeUnavailable(format!(
                    "`{}` is not an RFC 3339 timestamp: {error}",
                    self.raw
                ))
            })
    }
}

/// Pinned when a reference time is configured, wall clock otherwise.
pub fn clock_for(reference_time: Option<&str>) -> Box<dyn ReferenceClock> {
    match reference_time {
        Some(raw) => Box::new(PinnedClock::new(raw)),
        None => Box::new(SystemClock),
    }
}
