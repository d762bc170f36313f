//! Reason codes: why the engine chose a target.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag explaining the latest decision for a cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    WindProtection,
    BlockedOpenContact,
    Ventilation,
    Manual,
    Shading,
    ResidentAsleep,
    PresenceHold,
    ColdProtection,
    ShadingEndOpen,
    ShadingEndClose,
    SunClose,
    ScheduledOpen,
    ScheduledClose,
    #[default]
    Idle,
}

impl ReasonCode {
    /// Reasons whose purpose is to lower the cover, regardless of the
    /// numeric direction of the resulting move.
    #[must_use]
    pub fn is_closing_intent(self) -> bool {
        matches!(
            self,
            Self::ScheduledClose
                | Self::Shading
                | Self::ColdProtection
                | Self::ShadingEndClose
                | Self::ResidentAsleep
                | Self::SunClose
        )
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WindProtection => "WIND_PROTECTION",
            Self::BlockedOpenContact => "BLOCKED_OPEN_CONTACT",
            Self::Ventilation => "VENTILATION",
            Self::Manual => "MANUAL",
            Self::Shading => "SHADING",
            Self::ResidentAsleep => "RESIDENT_ASLEEP",
            Self::PresenceHold => "PRESENCE_HOLD",
            Self::ColdProtection => "COLD_PROTECTION",
            Self::ShadingEndOpen => "SHADING_END_OPEN",
            Self::ShadingEndClose => "SHADING_END_CLOSE",
            Self::SunClose => "SUN_CLOSE",
            Self::ScheduledOpen => "SCHEDULED_OPEN",
            Self::ScheduledClose => "SCHEDULED_CLOSE",
            Self::Idle => "IDLE",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_serialize_in_screaming_snake_case() {
        let json = serde_json::to_string(&ReasonCode::WindProtection).unwrap();
        assert_eq!(json, "\"WIND_PROTECTION\"");
    }

    #[test]
    fn should_match_display_and_serde_names() {
        for reason in [
            ReasonCode::BlockedOpenContact,
            ReasonCode::ShadingEndClose,
            ReasonCode::ResidentAsleep,
            ReasonCode::SunClose,
            ReasonCode::ScheduledOpen,
            ReasonCode::Idle,
        ] {
            let json = serde_json::to_value(reason).unwrap();
            assert_eq!(json.as_str(), Some(reason.as_str()));
        }
    }

    #[test]
    fn should_flag_closing_intents_only() {
        assert!(ReasonCode::ScheduledClose.is_closing_intent());
        assert!(ReasonCode::Shading.is_closing_intent());
        assert!(!ReasonCode::ScheduledOpen.is_closing_intent());
        assert!(!ReasonCode::WindProtection.is_closing_intent());
    }

    #[test]
    fn should_default_to_idle() {
        assert_eq!(ReasonCode::default(), ReasonCode::Idle);
    }
}
