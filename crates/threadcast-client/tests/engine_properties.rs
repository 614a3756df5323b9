//! Property tests for buffer reconciliation.
//!
//! Drives the engine with arbitrary event sequences and checks it against a
//! straight-line reference model of the documented rules, plus invariants
//! that must hold regardless of arrival order.

use proptest::prelude::*;
use threadcast_client::{EngineEvent, SyncEngine};
use threadcast_proto::{EventId, Message, Reply};

const CHANNELS: [&str; 3] = ["funny", "science", "random"];

/// One reconciliation-relevant input.
#[derive(Debug, Clone)]
enum Op {
    SetChannel(&'static str),
    History(Vec<Message>),
    Receive(Message),
    Reply(Reply),
}

/// Ids are drawn from a small range and randomly rendered as numbers or
/// strings, so sequences exercise normalized-id matching in both directions.
fn event_id() -> impl Strategy<Value = EventId> {
    (0i64..8, any::<bool>()).prop_map(|(n, as_text)| {
        if as_text { EventId::from(n.to_string()) } else { EventId::from(n) }
    })
}

fn channel() -> impl Strategy<Value = &'static str> {
    prop::sample::select(&CHANNELS[..])
}

fn message() -> impl Strategy<Value = Message> {
    (event_id(), channel(), "[a-z]{1,4}", "[a-z ]{0,8}").prop_map(|(id, channel, user, body)| {
        Message {
            id: Some(id),
            channel: channel.to_owned(),
            user,
            message: body,
            file_url: None,
            file_name: None,
            timestamp: None,
            replies: vec![],
        }
    })
}

fn reply() -> impl Strategy<Value = Reply> {
    (event_id(), event_id(), channel(), "[a-z]{1,4}", "[a-z ]{0,8}").prop_map(
        |(id, parent, channel, user, body)| Reply {
            id,
            message_id: parent,
            channel: channel.to_owned(),
            user,
            message: body,
            file_url: None,
            file_name: None,
            timestamp: "2024-01-01T00:00:00Z".to_owned(),
        },
    )
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        1 => channel().prop_map(Op::SetChannel),
        2 => prop::collection::vec(message(), 0..6).prop_map(Op::History),
        4 => message().prop_map(Op::Receive),
        4 => reply().prop_map(Op::Reply),
    ]
}

fn op_sequence() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op(), 0..40)
}

/// Reference model: the reconciliation rules written as plain list code.
#[derive(Debug, Default)]
struct Model {
    channel: String,
    buffer: Vec<Message>,
}

impl Model {
    fn apply(&mut self, op: &Op) {
        match op {
            Op::SetChannel(channel) => {
                self.channel = (*channel).to_owned();
                self.buffer.clear();
            },
            Op::History(messages) => {
                self.buffer = messages.clone();
            },
            Op::Receive(message) => {
                let duplicate = message.id.as_ref().is_some_and(|id| {
                    self.buffer.iter().any(|m| m.id.as_ref().is_some_and(|e| e == id))
                });
                if message.channel == self.channel && !duplicate {
                    self.buffer.push(message.clone());
                }
            },
            Op::Reply(reply) => {
                if let Some(parent) = self
                    .buffer
                    .iter_mut()
                    .find(|m| m.id.as_ref().is_some_and(|id| *id == reply.message_id))
                {
                    parent.replies.push(reply.clone());
                }
            },
        }
    }
}

fn drive(engine: &mut SyncEngine, op: &Op) {
    match op {
        Op::SetChannel(channel) => {
            let _ = engine.set_channel(channel);
        },
        Op::History(messages) => {
            let _ = engine.handle(EngineEvent::History(messages.clone()));
        },
        Op::Receive(message) => {
            let _ = engine.handle(EngineEvent::MessageReceived(message.clone()));
        },
        Op::Reply(reply) => {
            let _ = engine.handle(EngineEvent::ReplyReceived(reply.clone()));
        },
    }
}

proptest! {
    /// The engine agrees with the reference model after every step.
    #[test]
    fn engine_matches_reference_model(ops in op_sequence()) {
        let mut engine = SyncEngine::new();
        let _ = engine.handle(EngineEvent::Connected);
        let mut model = Model::default();

        for op in &ops {
            drive(&mut engine, op);
            model.apply(op);
            prop_assert_eq!(engine.channel(), model.channel.as_str());
            prop_assert_eq!(engine.messages(), model.buffer.as_slice());
        }
    }

    /// Every attached reply references its parent's id under normalized
    /// equality, no matter how ids were rendered on the wire.
    #[test]
    fn attached_replies_always_match_their_parent(ops in op_sequence()) {
        let mut engine = SyncEngine::new();
        let _ = engine.handle(EngineEvent::Connected);

        for op in &ops {
            drive(&mut engine, op);
        }

        for message in engine.messages() {
            for reply in &message.replies {
                let id = message.id.as_ref();
                prop_assert!(id.is_some_and(|id| *id == reply.message_id));
            }
        }
    }

    /// Changing channel leaves nothing behind: the buffer is empty until the
    /// next snapshot or matching broadcast.
    #[test]
    fn channel_switch_clears_the_buffer(ops in op_sequence(), target in channel()) {
        let mut engine = SyncEngine::new();
        let _ = engine.handle(EngineEvent::Connected);

        for op in &ops {
            drive(&mut engine, op);
        }

        let _ = engine.set_channel(target);
        prop_assert!(engine.messages().is_empty());
    }

    /// Discrete broadcasts for other channels never land in the buffer.
    #[test]
    fn foreign_broadcasts_never_leak(messages in prop::collection::vec(message(), 0..20)) {
        let mut engine = SyncEngine::new();
        let _ = engine.handle(EngineEvent::Connected);
        let _ = engine.set_channel("funny");

        for message in &messages {
            let _ = engine.handle(EngineEvent::MessageReceived(message.clone()));
        }

        // In-channel broadcasts count once per normalized id: a repeat of an
        // already-buffered id is discarded, not appended.
        let mut seen: Vec<EventId> = Vec::new();
        let mut expected = 0;
        for message in messages.iter().filter(|m| m.channel == "funny") {
            match &message.id {
                Some(id) if seen.contains(id) => {},
                Some(id) => {
                    seen.push(id.clone());
                    expected += 1;
                },
                None => expected += 1,
            }
        }

        prop_assert_eq!(engine.messages().len(), expected);
        prop_assert!(engine.messages().iter().all(|m| m.channel == "funny"));
    }
}
