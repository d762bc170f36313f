//! Topic layout under the configured base topic.
//!
//! | Topic | Direction | Payload |
//! |-------|-----------|---------|
//! | `{base}/sensors/{source}` | in | raw state or `{"value": …, "available": …}` |
//! | `{base}/covers/{cover}/set` | out | target position `0..=100` |
//! | `{base}/covers/{cover}/telemetry` | out | telemetry JSON, retained |

use shutterctl_domain::id::CoverId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    base: String,
}

impl Topics {
    #[must_use]
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    /// Subscription filter for every sensor source.
    #[must_use]
    pub fn sensors_filter(&self) -> String {
        format!("{}/sensors/#", self.base)
    }

    /// Source id carried by a sensor topic. Source ids may contain `/`.
    #[must_use]
    pub fn sensor_source<'a>(&self, topic: &'a str) -> Option<&'a str> {
        topic
            .strip_prefix(self.base.as_str())?
            .strip_prefix("/sensors/")
            .filter(|source| !source.is_empty())
    }

    #[must_use]
    pub fn command(&self, cover: &CoverId) -> String {
        format!("{}/covers/{cover}/set", self.base)
    }

    #[must_use]
    pub fn telemetry(&self, cover: &CoverId) -> String {
        format!("{}/covers/{cover}/telemetry", self.base)
    }
}
