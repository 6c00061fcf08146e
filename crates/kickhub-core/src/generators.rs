//! Synthetic Kick event generators.
//!
//! Every generator is a plain `fn(&str) -> Envelope`: given the subscribed
//! channel name it draws fresh randomness and returns a fully formed
//! envelope addressed to that channel.

use std::fmt;
use std::str::FromStr;

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use serde::Serialize;
use uuid::Uuid;

use crate::envelope::Envelope;
use crate::fake_data::{self, Badge};

/// Signature shared by all payload generators.
pub type Generator = fn(&str) -> Envelope;

pub const CHATROOM_PREFIX: &str = "chatroom";
pub const CHANNEL_PREFIX: &str = "channel";

pub const CHAT_MESSAGE_EVENT: &str = "App\\Events\\ChatMessageEvent";
pub const SUBSCRIPTION_EVENT: &str = "App\\Events\\SubscriptionEvent";
pub const GIFTED_SUBSCRIPTIONS_EVENT: &str = "App\\Events\\GiftedSubscriptionsEvent";
pub const STREAM_HOSTED_EVENT: &str = "App\\Events\\StreamHostedEvent";
pub const STREAMER_IS_LIVE_EVENT: &str = "App\\Events\\StreamerIsLive";
pub const STOP_STREAM_BROADCAST_EVENT: &str = "App\\Events\\StopStreamBroadcast";

// Matches the chatroom id the Kick client uses for subscription alerts.
const SUBSCRIPTION_CHATROOM_ID: u32 = 2_271_287;

/// The `trigger_event` tokens a client can ask for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Chat,
    ChatCelebration,
    Subscription,
    GiftedSubscriptions,
    Raid,
    Live,
    StopBroadcast,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        Self::Chat,
        Self::ChatCelebration,
        Self::Subscription,
        Self::GiftedSubscriptions,
        Self::Raid,
        Self::Live,
        Self::StopBroadcast,
    ];

    pub fn token(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::ChatCelebration => "chat_celebration",
            Self::Subscription => "subscription",
            Self::GiftedSubscriptions => "gifted_subscriptions",
            Self::Raid => "raid",
            Self::Live => "live",
            Self::StopBroadcast => "stop_broadcast",
        }
    }

    /// Subscribed channel names starting with this prefix receive the event.
    pub fn channel_prefix(self) -> &'static str {
        match self {
            Self::Live | Self::StopBroadcast => CHANNEL_PREFIX,
            _ => CHATROOM_PREFIX,
        }
    }

    pub fn generator(self) -> Generator {
        match self {
            Self::Chat => chat_message,
            Self::ChatCelebration => celebration_message,
            Self::Subscription => subscription,
            Self::GiftedSubscriptions => gifted_subscriptions,
            Self::Raid => raid,
            Self::Live => live,
            Self::StopBroadcast => stop_broadcast,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event type: {0}")]
pub struct UnknownEventKind(pub String);

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.token() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

// ── Payloads ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatMessage {
    #[serde(rename = "AeroKickChannelId")]
    aero_kick_channel_id: String,
    id: String,
    chatroom_id: u32,
    content: String,
    #[serde(rename = "type")]
    kind: &'static str,
    created_at: String,
    sender: ChatSender,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<ChatMetadata>,
}

#[derive(Serialize)]
struct ChatSender {
    id: u32,
    username: String,
    slug: String,
    identity: Identity,
}

#[derive(Serialize)]
struct Identity {
    color: String,
    badges: Vec<Badge>,
}

#[derive(Serialize)]
struct ChatMetadata {
    celebration: Celebration,
}

#[derive(Serialize)]
struct Celebration {
    id: u32,
    #[serde(rename = "type")]
    kind: &'static str,
    total_months: u32,
    created_at: String,
}

#[derive(Serialize)]
struct SubscriptionPayload {
    chatroom_id: u32,
    username: String,
    months: u32,
}

#[derive(Serialize)]
struct GiftedSubscriptionsPayload {
    chatroom_id: u32,
    gifter_username: String,
    gifted_usernames: Vec<String>,
    gifter_total: u32,
}

#[derive(Serialize)]
struct RaidPayload {
    chatroom_id: u32,
    message: RaidMessage,
    user: RaidUser,
}

#[derive(Serialize)]
struct RaidMessage {
    #[serde(rename = "numberOfViewers")]
    number_of_viewers: u32,
}

#[derive(Serialize)]
struct RaidUser {
    id: u32,
    username: String,
}

#[derive(Serialize)]
struct LivePayload {
    livestream: Livestream,
}

#[derive(Serialize)]
struct Livestream {
    id: u32,
    session_title: String,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn build_chat<R: Rng + ?Sized>(rng: &mut R, kind: &'static str, metadata: Option<ChatMetadata>) -> ChatMessage {
    let user = fake_data::random_slug(rng);
    ChatMessage {
        aero_kick_channel_id: Uuid::now_v7().to_string(),
        id: Uuid::now_v7().to_string(),
        chatroom_id: rng.gen_range(0..10_000),
        content: fake_data::random_message(rng),
        kind,
        created_at: now_rfc3339(),
        sender: ChatSender {
            id: rng.gen_range(0..10_000),
            username: user.to_string(),
            slug: user.to_string(),
            identity: Identity {
                color: fake_data::random_color(rng),
                badges: fake_data::random_badges(rng),
            },
        },
        metadata,
    }
}

// ── Generators ─────────────────────────────────────────────────────────

pub fn chat_message(channel: &str) -> Envelope {
    let payload = build_chat(&mut rand::thread_rng(), "message", None);
    Envelope::with_payload(CHAT_MESSAGE_EVENT, channel, &payload)
}

pub fn celebration_message(channel: &str) -> Envelope {
    let mut rng = rand::thread_rng();
    let metadata = ChatMetadata {
        celebration: Celebration {
            id: rng.gen_range(0..10_000),
            kind: "subscription_renewed",
            total_months: rng.gen_range(0..12),
            created_at: now_rfc3339(),
        },
    };
    let payload = build_chat(&mut rng, "celebration", Some(metadata));
    Envelope::with_payload(CHAT_MESSAGE_EVENT, channel, &payload)
}

pub fn subscription(channel: &str) -> Envelope {
    let mut rng = rand::thread_rng();
    let payload = SubscriptionPayload {
        chatroom_id: SUBSCRIPTION_CHATROOM_ID,
        username: format!("user{}", rng.gen_range(0..1_000)),
        months: 1,
    };
    Envelope::with_payload(SUBSCRIPTION_EVENT, channel, &payload)
}

pub fn gifted_subscriptions(channel: &str) -> Envelope {
    let mut rng = rand::thread_rng();
    let gifter_total = rng.gen_range(1..=10);
    let gifted_usernames = (0..gifter_total)
        .map(|_| format!("user{}", rng.gen_range(0..1_000)))
        .collect();
    let payload = GiftedSubscriptionsPayload {
        chatroom_id: rng.gen_range(0..10_000),
        gifter_username: format!("gifter{}", rng.gen_range(0..1_000)),
        gifted_usernames,
        gifter_total,
    };
    Envelope::with_payload(GIFTED_SUBSCRIPTIONS_EVENT, channel, &payload)
}

pub fn raid(channel: &str) -> Envelope {
    let mut rng = rand::thread_rng();
    let payload = RaidPayload {
        chatroom_id: rng.gen_range(0..10_000),
        message: RaidMessage {
            number_of_viewers: rng.gen_range(1..=1_000),
        },
        user: RaidUser {
            id: rng.gen_range(0..10_000),
            username: format!("host{}", rng.gen_range(0..1_000)),
        },
    };
    Envelope::with_payload(STREAM_HOSTED_EVENT, channel, &payload)
}

fn livestream(channel: &str, is_live: bool) -> Envelope {
    let mut rng = rand::thread_rng();
    let payload = LivePayload {
        livestream: Livestream {
            id: rng.gen_range(0..10_000),
            session_title: format!("Stream {}", rng.gen_range(0..1_000)),
        },
    };
    let event = if is_live {
        STREAMER_IS_LIVE_EVENT
    } else {
        STOP_STREAM_BROADCAST_EVENT
    };
    Envelope::with_payload(event, channel, &payload)
}

pub fn live(channel: &str) -> Envelope {
    livestream(channel, true)
}

pub fn stop_broadcast(channel: &str) -> Envelope {
    livestream(channel, false)
}

/// One of chat, subscription, gifted subscriptions, raid or a live toggle,
/// chosen uniformly. Used by the all-events emitter.
pub fn random_event(channel: &str) -> Envelope {
    let mut rng = rand::thread_rng();
    match rng.gen_range(0..5) {
        0 => chat_message(channel),
        1 => subscription(channel),
        2 => gifted_subscriptions(channel),
        3 => raid(channel),
        _ => livestream(channel, rng.gen_bool(0.5)),
    }
}
