//! Release name generation.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("Generated release name '{0}' collides with an existing release")]
    NameCollision(String),
}

/// Produces a fresh release id given the ids already present.
pub trait NameGenerator: Send {
    fn generate(&self, existing: &[String]) -> Result<String, GeneratorError>;
}

impl<F> NameGenerator for F
where
    F: Fn(&[String]) -> Result<String, GeneratorError> + Send,
{
    fn generate(&self, existing: &[String]) -> Result<String, GeneratorError> {
        self(existing)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameFormat {
    /// Seconds since the Unix epoch.
    #[default]
    Unix,
    /// `YYYYMMDDHHMMSS` in UTC.
    Compact,
}

impl NameFormat {
    pub fn render(self, at: DateTime<Utc>) -> String {
        match self {
            NameFormat::Unix => at.timestamp().to_string(),
            NameFormat::Compact => at.format("%Y%m%d%H%M%S").to_string(),
        }
    }
}

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Names releases after the current time.
///
/// Two releases generated within the same second collide; the collision is
/// reported, never resolved by picking another name.
pub struct TimestampGenerator {
    format: NameFormat,
    clock: Clock,
}

impl TimestampGenerator {
    pub fn new(format: NameFormat) -> Self {
        Self {
            format,
            clock: Box::new(Utc::now),
        }
    }

    pub fn with_clock(
        format: NameFormat,
        clock: impl Fn() -> DateTime<Utc> + Send + Sync + 'static,
    ) -> Self {
        Self {
            format,
            clock: Box::new(clock),
        }
    }

    pub fn format(&self) -> NameFormat {
        self.format
    }
}

impl Default for TimestampGenerator {
    fn default() -> Self {
        Self::new(NameFormat::default())
    }
}

impl fmt::Debug for TimestampGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimestampGenerator")
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl NameGenerator for TimestampGenerator {
    fn generate(&self, existing: &[String]) -> Result<String, GeneratorError> {
        let name = self.format.render((self.clock)());
        if existing.iter().any(|e| *e == name) {
            return Err(GeneratorError::NameCollision(name));
        }
        Ok(name)
    }
}
