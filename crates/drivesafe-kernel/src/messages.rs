//! Auto-response settings: what people who message the driver are told while
//! safety mode is on.

use drivesafe_types::{Notice, SafetyState};

pub const DEFAULT_AUTO_RESPONSE: &str =
    "I'm currently driving. I'll respond when it's safe to do so.";

/// In-memory auto-response text.  No validation: any string, including an
/// empty one, is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSettings {
    auto_response: String,
}

impl Default for MessageSettings {
    fn default() -> Self {
        Self::new(DEFAULT_AUTO_RESPONSE)
    }
}

impl MessageSettings {
    pub fn new(auto_response: impl Into<String>) -> Self {
        Self {
            auto_response: auto_response.into(),
        }
    }

    pub fn auto_response(&self) -> &str {
        &self.auto_response
    }

    /// Replace the message and return the confirmation notice to show.
    pub fn update(&mut self, message: impl Into<String>) -> Notice {
        self.auto_response = message.into();
        Notice::info(
            "Settings Saved",
            "Your auto-response message has been updated.",
        )
    }

    /// The reply to send for an incoming message, only while safety mode is
    /// fully enabled.
    pub fn auto_reply(&self, state: SafetyState) -> Option<&str> {
        (state == SafetyState::Enabled).then_some(self.auto_response.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_message() {
        assert_eq!(MessageSettings::default().auto_response(), DEFAULT_AUTO_RESPONSE);
    }

    #[test]
    fn update_replaces_message_and_confirms() {
        let mut s = MessageSettings::default();
        let notice = s.update("Driving, call back later");
        assert_eq!(s.auto_response(), "Driving, call back later");
        assert_eq!(notice.title, "Settings Saved");
    }

    #[test]
    fn empty_message_is_accepted() {
        let mut s = MessageSettings::default();
        s.update("");
        assert_eq!(s.auto_response(), "");
    }

    #[test]
    fn replies_only_while_enabled() {
        let s = MessageSettings::default();
        assert_eq!(s.auto_reply(SafetyState::Enabled), Some(DEFAULT_AUTO_RESPONSE));
        assert_eq!(s.auto_reply(SafetyState::Disabled), None);
        assert_eq!(s.auto_reply(SafetyState::PendingActivation), None);
        assert_eq!(s.auto_reply(SafetyState::PendingDeactivation), None);
    }
}
