// Notification state machine
//
// Tracks which findings have already been notified (the down-set) so that
// a service that stays broken is reported exactly once, and a service that
// disappears from the cycle results gets a "back online" notification.

use crate::message::Message;

/// Per-worker notification state.
///
/// Invariant: the down-set never contains two equal messages. The
/// transition step is deterministic and order-preserving, and idempotent
/// for stable input: feeding the same findings twice yields nothing to
/// send the second time.
#[derive(Debug, Default)]
pub struct NotificationState {
    down_services: Vec<Message>,
}

impl NotificationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages currently considered down (already notified, not recovered)
    pub fn down_services(&self) -> &[Message] {
        &self.down_services
    }

    /// Reorganize the cycle's findings: drop findings already notified,
    /// add "back online" notifications for recovered services, and update
    /// the down-set accordingly. Returns the messages to send.
    pub fn reconcile(&mut self, notifications: &[Message]) -> Vec<Message> {
        let mut to_send = Vec::new();

        // Newly-observed failures
        for message in notifications {
            if !self.down_services.contains(message) {
                to_send.push(message.clone());
                self.down_services.push(message.clone());
            }
        }

        // Services which are back online
        let mut still_down = Vec::new();
        for sent_message in self.down_services.drain(..) {
            if !notifications.contains(&sent_message) {
                tracing::info!("[service online] {}", sent_message);
                to_send.push(sent_message.back_online());
            } else {
                tracing::warn!("[service down] {}", sent_message);
                still_down.push(sent_message);
            }
        }
        self.down_services = still_down;

        to_send
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Severity;

    fn msg(service: &str, body: &str, severity: Severity) -> Message {
        Message::new(service, body, severity)
    }

    #[test]
    fn test_one_notification() {
        let mut state = NotificationState::new();
        let message1 = msg("Service 1", "Message 1", Severity::Error);

        let to_send = state.reconcile(&[message1.clone()]);

        assert_eq!(to_send, vec![message1.clone()]);
        assert_eq!(state.down_services(), &[message1]);
    }

    #[test]
    fn test_few_notifications() {
        let mut state = NotificationState::new();
        let message1 = msg("Service 1", "Message 1", Severity::Error);
        let message2 = msg("Service 2", "Message 2", Severity::Error);

        let to_send = state.reconcile(&[message1.clone(), message2.clone()]);

        assert_eq!(to_send, vec![message1.clone(), message2.clone()]);
        assert_eq!(state.down_services(), &[message1, message2]);
    }

    #[test]
    fn test_back_online() {
        let mut state = NotificationState::new();
        let message1 = msg("Service 1", "Message 1", Severity::Error);
        state.reconcile(&[message1.clone()]);

        let to_send = state.reconcile(&[]);

        assert_eq!(to_send, vec![message1.back_online()]);
        assert!(state.down_services().is_empty());
    }

    #[test]
    fn test_back_online_multiple_services() {
        let mut state = NotificationState::new();
        let message1 = msg("Service 1", "Message 1", Severity::Error);
        let message2 = msg("Service 2", "Message 2", Severity::Error);
        let message3 = msg("Service 3", "Message 3", Severity::Warning);
        state.reconcile(&[message1.clone(), message2.clone(), message3.clone()]);

        let to_send = state.reconcile(&[message3.clone()]);

        assert_eq!(to_send, vec![message1.back_online(), message2.back_online()]);
        assert_eq!(state.down_services(), &[message3]);
    }

    #[test]
    fn test_still_down() {
        let mut state = NotificationState::new();
        let message1 = msg("Service 1", "Message 1", Severity::Error);
        state.reconcile(&[message1.clone()]);

        let to_send = state.reconcile(&[message1.clone()]);

        assert!(to_send.is_empty());
        assert_eq!(state.down_services(), &[message1]);
    }

    #[test]
    fn test_still_down_multiple_services() {
        let mut state = NotificationState::new();
        let message1 = msg("Service 1", "Message 1", Severity::Error);
        let message2 = msg("Service 2", "Message 2", Severity::Error);
        state.reconcile(&[message1.clone()]);

        let to_send = state.reconcile(&[message1.clone(), message2.clone()]);

        assert_eq!(to_send, vec![message2.clone()]);
        assert_eq!(state.down_services(), &[message1, message2]);
    }

    #[test]
    fn test_same_service_different_body_is_a_new_entry() {
        let mut state = NotificationState::new();
        let timeout = msg("Service 1", "Time out", Severity::Error);
        state.reconcile(&[timeout.clone()]);

        let refused = msg("Service 1", "Connection refused", Severity::Error);
        let to_send = state.reconcile(&[refused.clone()]);

        // The old body recovers, the new body is notified
        assert_eq!(to_send, vec![refused.clone(), timeout.back_online()]);
        assert_eq!(state.down_services(), &[refused]);
    }

    #[test]
    fn test_duplicate_findings_in_one_cycle_notified_once() {
        let mut state = NotificationState::new();
        let message1 = msg("Service 1", "Message 1", Severity::Error);

        let to_send = state.reconcile(&[message1.clone(), message1.clone()]);

        assert_eq!(to_send, vec![message1.clone()]);
        assert_eq!(state.down_services(), &[message1]);
    }
}
