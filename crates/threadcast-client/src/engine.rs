//! Synchronization engine state machine.
//!
//! The [`SyncEngine`] is a pure state machine in the Sans-IO idiom: it
//! consumes [`EngineEvent`]s and caller intents, mutates the in-memory
//! message buffer, and returns [`EngineAction`]s for the session to execute.
//! No I/O happens here, which keeps every reconciliation rule testable
//! without a network.
//!
//! # Responsibilities
//!
//! - Tracks the single current channel and clears the buffer on change.
//! - Folds history snapshots, new messages, and new replies into the buffer.
//! - Threads replies onto parent messages by normalized identifier.
//! - Requests a join on (re)connect when a channel is already selected.

use threadcast_proto::{ClientRequest, EventId, Message, OutgoingMessage, Reply};

use crate::{EngineAction, EngineEvent};

/// Client-side synchronization engine for one chat session.
///
/// Single-owner, single-writer: all events and intents are applied as
/// discrete calls on one logical thread, so ordering within a connection is
/// exactly network arrival order.
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    /// Currently observed channel. Empty string means none selected.
    channel: String,
    /// Ordered messages for the current channel.
    buffer: Vec<Message>,
    /// Whether the transport currently reports an established connection.
    connected: bool,
}

impl SyncEngine {
    /// Create an engine with no channel selected and an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process an inbound event and return resulting actions.
    ///
    /// Events must be fed strictly in arrival order; the engine never
    /// reorders or batches.
    pub fn handle(&mut self, event: EngineEvent) -> Vec<EngineAction> {
        match event {
            EngineEvent::Connected => {
                self.connected = true;
                // Reconnect while a channel is selected: re-join so the
                // server sends a fresh history snapshot.
                if self.channel.is_empty() {
                    vec![]
                } else {
                    vec![EngineAction::Join { channel: self.channel.clone(), ack: false }]
                }
            },
            EngineEvent::Disconnected { reason } => {
                self.connected = false;
                tracing::debug!(%reason, "connection closed");
                vec![]
            },
            EngineEvent::ConnectError { error } => {
                self.connected = false;
                // Observation only. Any automatic reconnection belongs to
                // the transport layer, not the engine.
                tracing::warn!(%error, "connection error");
                vec![]
            },
            EngineEvent::History(messages) => {
                // Wholesale replacement, preserving server order and any
                // embedded reply lists. Not filtered by channel: a snapshot
                // for a stale channel that arrives after a switch still
                // overwrites the buffer (known looseness, kept faithful).
                self.buffer = messages;
                vec![]
            },
            EngineEvent::MessageReceived(message) => {
                if message.channel != self.channel {
                    tracing::debug!(
                        channel = %message.channel,
                        current = %self.channel,
                        "discarding message for another channel"
                    );
                } else if self.contains_id(message.id.as_ref()) {
                    tracing::debug!(id = ?message.id, "discarding duplicate message");
                } else {
                    self.buffer.push(message);
                }
                vec![]
            },
            EngineEvent::ReplyReceived(reply) => {
                self.attach_reply(reply);
                vec![]
            },
            EngineEvent::JoinError { error } => {
                tracing::warn!(%error, "join rejected");
                vec![]
            },
            EngineEvent::ForcedLogout { message } => {
                // Propagated unconditionally; the session must tear down the
                // credential. The engine keeps no say in the matter.
                vec![EngineAction::ForceLogout { message }]
            },
        }
    }

    /// Whether a buffered message already carries this id. Messages without
    /// an id (local sends awaiting their echo) never count as duplicates.
    fn contains_id(&self, id: Option<&EventId>) -> bool {
        let Some(id) = id else { return false };
        self.buffer.iter().any(|m| m.id.as_ref().is_some_and(|existing| existing == id))
    }

    /// Thread a reply onto its parent message, matching by normalized id.
    ///
    /// Scans the entire buffer regardless of the reply's channel, mirroring
    /// the observed behavior. A reply whose parent is not in the buffer
    /// (for example one racing a channel switch) is dropped; there is no
    /// pending-reply queue.
    fn attach_reply(&mut self, reply: Reply) {
        let parent = self
            .buffer
            .iter_mut()
            .find(|m| m.id.as_ref().is_some_and(|id| *id == reply.message_id));
        match parent {
            Some(message) => message.replies.push(reply),
            None => {
                tracing::debug!(parent = %reply.message_id, "dropping reply with no parent in buffer");
            },
        }
    }

    /// Change the current channel.
    ///
    /// Clears the buffer unconditionally, even when not connected and even
    /// when re-setting the same channel, so the previous channel's content
    /// can never show under the new channel's identity. Emits a join only
    /// when a connection is live and the channel is non-empty.
    pub fn set_channel(&mut self, channel: &str) -> Vec<EngineAction> {
        self.channel = channel.to_owned();
        self.buffer.clear();
        if self.connected && !self.channel.is_empty() {
            vec![EngineAction::Join { channel: self.channel.clone(), ack: false }]
        } else {
            vec![]
        }
    }

    /// Re-request the current channel's history, with an acknowledgment.
    ///
    /// Used after a locally-initiated send to force a fresh pull,
    /// compensating for any ordering race between a send's acknowledgment
    /// and the resulting broadcast. Silent no-op without a live connection
    /// or with no channel selected.
    pub fn refresh(&self) -> Vec<EngineAction> {
        if self.connected && !self.channel.is_empty() {
            vec![EngineAction::Join { channel: self.channel.clone(), ack: true }]
        } else {
            vec![]
        }
    }

    /// Post a new top-level message.
    ///
    /// Nothing is inserted locally; the buffer changes only when the server
    /// broadcasts the message back. Silent no-op without a live connection.
    pub fn send_message(&self, outgoing: OutgoingMessage) -> Vec<EngineAction> {
        if self.connected {
            vec![EngineAction::Emit { request: ClientRequest::SendMessage(outgoing), ack: true }]
        } else {
            vec![]
        }
    }

    /// Post a reply threaded onto an existing message in the current
    /// channel. Silent no-op without a live connection or selected channel.
    pub fn send_reply(
        &self,
        message_id: EventId,
        message: String,
        timestamp: String,
    ) -> Vec<EngineAction> {
        if self.connected && !self.channel.is_empty() {
            vec![EngineAction::Emit {
                request: ClientRequest::SendReply {
                    message_id,
                    channel: self.channel.clone(),
                    message,
                    timestamp,
                },
                ack: true,
            }]
        } else {
            vec![]
        }
    }

    /// Currently observed channel. Empty string means none selected.
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Ordered message buffer for the current channel.
    pub fn messages(&self) -> &[Message] {
        &self.buffer
    }

    /// Replace the buffer directly, outside the event path.
    ///
    /// Escape hatch for callers that mutate optimistically (for example a
    /// send-success handler). Buffer consistency becomes cooperative once
    /// this is used; the engine does not re-validate the contents.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.buffer = messages;
    }

    /// Whether the transport currently reports an established connection.
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(id: i64, channel: &str, user: &str, text: &str) -> Message {
        Message {
            id: Some(EventId::from(id)),
            channel: channel.to_owned(),
            user: user.to_owned(),
            message: text.to_owned(),
            file_url: None,
            file_name: None,
            timestamp: None,
            replies: vec![],
        }
    }

    fn reply(id: i64, parent: EventId, channel: &str, user: &str, text: &str) -> Reply {
        Reply {
            id: EventId::from(id),
            message_id: parent,
            channel: channel.to_owned(),
            user: user.to_owned(),
            message: text.to_owned(),
            file_url: None,
            file_name: None,
            timestamp: "2024-01-01T00:00:00Z".to_owned(),
        }
    }

    /// Engine connected with the given channel joined.
    fn connected_engine(channel: &str) -> SyncEngine {
        let mut engine = SyncEngine::new();
        let _ = engine.handle(EngineEvent::Connected);
        let _ = engine.set_channel(channel);
        engine
    }

    #[test]
    fn buffer_is_history_plus_accepted_messages_in_arrival_order() {
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "one")]));
        let _ = engine.handle(EngineEvent::MessageReceived(msg(2, "funny", "b", "two")));
        let _ = engine.handle(EngineEvent::MessageReceived(msg(3, "funny", "a", "three")));

        let ids: Vec<_> = engine.messages().iter().filter_map(|m| m.id.clone()).collect();
        assert_eq!(ids, vec![EventId::from(1), EventId::from(2), EventId::from(3)]);
    }

    #[test]
    fn messages_for_other_channels_never_enter_the_buffer() {
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![]));
        let _ = engine.handle(EngineEvent::MessageReceived(msg(1, "science", "a", "off-topic")));

        assert!(engine.messages().is_empty());
    }

    #[test]
    fn duplicate_message_ids_are_never_inserted_twice() {
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "hi")]));
        let _ = engine.handle(EngineEvent::MessageReceived(msg(1, "funny", "a", "hi")));
        assert_eq!(engine.messages().len(), 1);

        // Normalized comparison applies to dedup too: "1" is the same id.
        let mut dup = msg(0, "funny", "a", "hi");
        dup.id = Some(EventId::from("1"));
        let _ = engine.handle(EngineEvent::MessageReceived(dup));
        assert_eq!(engine.messages().len(), 1);

        // Id-less local echoes cannot be deduplicated and always append.
        let mut anon = msg(0, "funny", "a", "pending");
        anon.id = None;
        let _ = engine.handle(EngineEvent::MessageReceived(anon.clone()));
        let _ = engine.handle(EngineEvent::MessageReceived(anon));
        assert_eq!(engine.messages().len(), 3);
    }

    #[test]
    fn changing_channel_empties_buffer_before_any_snapshot() {
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "hi")]));
        assert_eq!(engine.messages().len(), 1);

        let actions = engine.set_channel("science");
        assert!(engine.messages().is_empty());
        assert_eq!(actions, vec![EngineAction::Join { channel: "science".to_owned(), ack: false }]);
    }

    #[test]
    fn stale_channel_snapshot_still_overwrites_wholesale() {
        // Known looseness kept faithful: history is not filtered by channel.
        let mut engine = connected_engine("funny");
        let _ = engine.set_channel("science");
        assert!(engine.messages().is_empty());

        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "late")]));
        assert_eq!(engine.messages().len(), 1);
    }

    #[test]
    fn reply_attaches_by_normalized_id_across_types() {
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(42, "funny", "a", "parent")]));

        // Parent id arrived as the number 42; reply references it as "42".
        let _ = engine.handle(EngineEvent::ReplyReceived(reply(
            100,
            EventId::from("42"),
            "funny",
            "b",
            "lol",
        )));

        assert_eq!(engine.messages()[0].replies.len(), 1);
        assert_eq!(engine.messages()[0].replies[0].id, EventId::from(100));
    }

    #[test]
    fn reply_attaches_string_parent_to_numeric_reference() {
        let mut engine = connected_engine("funny");
        let mut parent = msg(0, "funny", "a", "parent");
        parent.id = Some(EventId::from("42"));
        let _ = engine.handle(EngineEvent::History(vec![parent]));

        let _ = engine.handle(EngineEvent::ReplyReceived(reply(
            100,
            EventId::from(42),
            "funny",
            "b",
            "lol",
        )));

        assert_eq!(engine.messages()[0].replies.len(), 1);
    }

    #[test]
    fn orphan_reply_is_dropped_without_touching_the_buffer() {
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "hi")]));

        let _ = engine.handle(EngineEvent::ReplyReceived(reply(
            100,
            EventId::from(999),
            "funny",
            "b",
            "orphan",
        )));

        assert_eq!(engine.messages().len(), 1);
        assert!(engine.messages()[0].replies.is_empty());
    }

    #[test]
    fn reply_matching_scans_whole_buffer_regardless_of_channel() {
        // Mirrors the observed behavior: no channel re-check on replies.
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "hi")]));

        let _ = engine.handle(EngineEvent::ReplyReceived(reply(
            100,
            EventId::from(1),
            "science",
            "b",
            "cross-channel",
        )));

        assert_eq!(engine.messages()[0].replies.len(), 1);
    }

    #[test]
    fn reply_order_is_arrival_order_not_timestamp_order() {
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "hi")]));

        let mut late = reply(100, EventId::from(1), "funny", "b", "first arrival");
        late.timestamp = "2024-12-31T00:00:00Z".to_owned();
        let mut early = reply(101, EventId::from(1), "funny", "c", "second arrival");
        early.timestamp = "2024-01-01T00:00:00Z".to_owned();

        let _ = engine.handle(EngineEvent::ReplyReceived(late));
        let _ = engine.handle(EngineEvent::ReplyReceived(early));

        let ids: Vec<_> = engine.messages()[0].replies.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![EventId::from(100), EventId::from(101)]);
    }

    #[test]
    fn connect_with_channel_selected_requests_join() {
        let mut engine = SyncEngine::new();
        let _ = engine.set_channel("funny");

        let actions = engine.handle(EngineEvent::Connected);
        assert_eq!(actions, vec![EngineAction::Join { channel: "funny".to_owned(), ack: false }]);
    }

    #[test]
    fn connect_without_channel_requests_nothing() {
        let mut engine = SyncEngine::new();
        assert!(engine.handle(EngineEvent::Connected).is_empty());
    }

    #[test]
    fn set_channel_while_disconnected_clears_but_does_not_join() {
        let mut engine = SyncEngine::new();
        let actions = engine.set_channel("funny");
        assert!(actions.is_empty());
        assert!(engine.messages().is_empty());
        assert_eq!(engine.channel(), "funny");
    }

    #[test]
    fn resetting_same_channel_still_clears_and_rejoins() {
        // The source does not suppress re-joins; neither do we.
        let mut engine = connected_engine("funny");
        let _ = engine.handle(EngineEvent::History(vec![msg(1, "funny", "a", "hi")]));

        let actions = engine.set_channel("funny");
        assert!(engine.messages().is_empty());
        assert_eq!(actions, vec![EngineAction::Join { channel: "funny".to_owned(), ack: false }]);
    }

    #[test]
    fn refresh_is_silent_noop_without_connection_or_channel() {
        let engine = SyncEngine::new();
        assert!(engine.refresh().is_empty());

        let mut engine = SyncEngine::new();
        let _ = engine.handle(EngineEvent::Connected);
        assert!(engine.refresh().is_empty());

        let mut engine = SyncEngine::new();
        let _ = engine.set_channel("funny");
        assert!(engine.refresh().is_empty());
    }

    #[test]
    fn refresh_joins_current_channel_with_ack() {
        let engine = connected_engine("funny");
        assert_eq!(
            engine.refresh(),
            vec![EngineAction::Join { channel: "funny".to_owned(), ack: true }]
        );
    }

    #[test]
    fn send_message_is_noop_when_disconnected() {
        let engine = SyncEngine::new();
        let outgoing = OutgoingMessage {
            channel: "funny".to_owned(),
            user: Some("a".to_owned()),
            message: "hi".to_owned(),
            file_url: None,
            file_name: None,
            timestamp: None,
        };
        assert!(engine.send_message(outgoing).is_empty());
    }

    #[test]
    fn send_does_not_echo_locally() {
        let engine = connected_engine("funny");
        let outgoing = OutgoingMessage {
            channel: "funny".to_owned(),
            user: Some("a".to_owned()),
            message: "hi".to_owned(),
            file_url: None,
            file_name: None,
            timestamp: None,
        };

        let actions = engine.send_message(outgoing);
        assert!(matches!(
            actions.as_slice(),
            [EngineAction::Emit { request: ClientRequest::SendMessage(_), ack: true }]
        ));
        assert!(engine.messages().is_empty());
    }

    #[test]
    fn send_reply_targets_current_channel() {
        let engine = connected_engine("funny");
        let actions =
            engine.send_reply(EventId::from(1), "lol".to_owned(), "2024-01-01".to_owned());

        match actions.as_slice() {
            [EngineAction::Emit {
                request: ClientRequest::SendReply { message_id, channel, .. },
                ack: true,
            }] => {
                assert_eq!(*message_id, EventId::from(1));
                assert_eq!(channel, "funny");
            },
            other => panic!("unexpected actions: {other:?}"),
        }
    }

    #[test]
    fn forced_logout_always_propagates() {
        let mut engine = SyncEngine::new();
        let actions =
            engine.handle(EngineEvent::ForcedLogout { message: "session expired".to_owned() });
        assert_eq!(
            actions,
            vec![EngineAction::ForceLogout { message: "session expired".to_owned() }]
        );
    }

    #[test]
    fn disconnect_marks_engine_offline() {
        let mut engine = connected_engine("funny");
        assert!(engine.is_connected());

        let _ = engine.handle(EngineEvent::Disconnected { reason: "transport close".to_owned() });
        assert!(!engine.is_connected());
        // Further sets clear but do not emit joins against a dead connection.
        assert!(engine.set_channel("science").is_empty());
    }

    #[test]
    fn raw_setter_replaces_buffer_verbatim() {
        let mut engine = connected_engine("funny");
        engine.set_messages(vec![msg(9, "funny", "a", "injected")]);
        assert_eq!(engine.messages().len(), 1);
        assert_eq!(engine.messages()[0].id, Some(EventId::from(9)));
    }

    #[test]
    fn full_scenario_message_then_reply() {
        let mut engine = SyncEngine::new();
        let _ = engine.handle(EngineEvent::Connected);
        let actions = engine.set_channel("funny");
        assert_eq!(actions.len(), 1);

        let _ = engine.handle(EngineEvent::History(vec![]));
        let _ = engine.handle(EngineEvent::MessageReceived(msg(1, "funny", "a", "hi")));
        assert_eq!(engine.messages().len(), 1);

        let _ = engine.handle(EngineEvent::ReplyReceived(reply(
            100,
            EventId::from(1),
            "funny",
            "b",
            "lol",
        )));
        assert_eq!(engine.messages()[0].replies.len(), 1);
        assert_eq!(engine.messages()[0].replies[0].message, "lol");
    }
}
