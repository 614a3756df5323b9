//! Fuzz target for the SyncEngine state machine
//!
//! Ensure buffer reconciliation never panics and channel isolation holds
//!
//! # Strategy
//!
//! - Arbitrary interleavings of connection flaps, channel switches,
//!   snapshots, broadcasts, and replies
//! - Ids rendered as numbers and strings to stress normalized matching
//! - Channel names including the empty string (none selected)
//!
//! # Invariants
//!
//! - The engine never panics on any event ordering
//! - Discrete broadcasts in the buffer match the channel selected last
//! - Attached replies reference their parent's id under normalized equality
//! - A channel switch leaves the buffer empty

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use threadcast_client::{EngineEvent, SyncEngine};
use threadcast_proto::{EventId, Message, Reply};

#[derive(Debug, Clone, Arbitrary)]
enum EngineOp {
    Connect,
    Disconnect,
    SetChannel(ChannelChoice),
    History(Vec<MessageChoice>),
    Receive(MessageChoice),
    Reply(ReplyChoice),
    Refresh,
}

#[derive(Debug, Clone, Arbitrary)]
enum ChannelChoice {
    Empty,
    Funny,
    Science,
    Raw(String),
}

#[derive(Debug, Clone, Arbitrary)]
enum IdChoice {
    None,
    Num(i64),
    Text(String),
    NumAsText(i64),
}

#[derive(Debug, Clone, Arbitrary)]
struct MessageChoice {
    id: IdChoice,
    channel: ChannelChoice,
    body: String,
}

#[derive(Debug, Clone, Arbitrary)]
struct ReplyChoice {
    id: IdChoice,
    parent: IdChoice,
    channel: ChannelChoice,
    body: String,
}

fuzz_target!(|ops: Vec<EngineOp>| {
    let mut engine = SyncEngine::new();

    for op in ops {
        match op {
            EngineOp::Connect => {
                let _ = engine.handle(EngineEvent::Connected);
            }
            EngineOp::Disconnect => {
                let _ = engine.handle(EngineEvent::Disconnected {
                    reason: "fuzz".to_owned(),
                });
            }
            EngineOp::SetChannel(choice) => {
                let _ = engine.set_channel(&channel_name(&choice));
                assert!(engine.messages().is_empty());
            }
            EngineOp::History(messages) => {
                let messages = messages.iter().map(make_message).collect();
                let _ = engine.handle(EngineEvent::History(messages));
            }
            EngineOp::Receive(choice) => {
                let message = make_message(&choice);
                let channel = message.channel.clone();
                let duplicate = message.id.as_ref().is_some_and(|id| {
                    engine
                        .messages()
                        .iter()
                        .any(|m| m.id.as_ref().is_some_and(|existing| existing == id))
                });
                let before = engine.messages().len();
                let _ = engine.handle(EngineEvent::MessageReceived(message));

                if channel == engine.channel() && !duplicate {
                    assert_eq!(engine.messages().len(), before + 1);
                } else {
                    assert_eq!(engine.messages().len(), before);
                }
            }
            EngineOp::Reply(choice) => {
                let _ = engine.handle(EngineEvent::ReplyReceived(make_reply(&choice)));
            }
            EngineOp::Refresh => {
                let _ = engine.refresh();
            }
        }

        verify_reply_threading(&engine);
    }
});

fn channel_name(choice: &ChannelChoice) -> String {
    match choice {
        ChannelChoice::Empty => String::new(),
        ChannelChoice::Funny => "funny".to_owned(),
        ChannelChoice::Science => "science".to_owned(),
        ChannelChoice::Raw(name) => name.clone(),
    }
}

fn make_id(choice: &IdChoice) -> Option<EventId> {
    match choice {
        IdChoice::None => None,
        IdChoice::Num(n) => Some(EventId::from(*n)),
        IdChoice::Text(s) => Some(EventId::from(s.clone())),
        IdChoice::NumAsText(n) => Some(EventId::from(n.to_string())),
    }
}

fn make_message(choice: &MessageChoice) -> Message {
    Message {
        id: make_id(&choice.id),
        channel: channel_name(&choice.channel),
        user: "fuzz".to_owned(),
        message: choice.body.clone(),
        file_url: None,
        file_name: None,
        timestamp: None,
        replies: vec![],
    }
}

fn make_reply(choice: &ReplyChoice) -> Reply {
    Reply {
        id: make_id(&choice.id).unwrap_or_else(|| EventId::from(0)),
        message_id: make_id(&choice.parent).unwrap_or_else(|| EventId::from(0)),
        channel: channel_name(&choice.channel),
        user: "fuzz".to_owned(),
        message: choice.body.clone(),
        file_url: None,
        file_name: None,
        timestamp: "0".to_owned(),
    }
}

fn verify_reply_threading(engine: &SyncEngine) {
    for message in engine.messages() {
        for reply in &message.replies {
            let matches = message
                .id
                .as_ref()
                .is_some_and(|id| *id == reply.message_id);
            assert!(matches, "reply attached to non-matching parent");
        }
    }
}
