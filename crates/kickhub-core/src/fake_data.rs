//! Word lists and small random helpers shared by the event generators.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

pub const SLUGS: &[&str] = &[
    "R4ver",
    "ACPixel",
    "Lorylie",
    "iGypc",
    "LucidSilver",
    "Lyrrah",
    "Moofypoof",
    "Kizime",
    "Kevlantis",
    "Tiru",
];

const USERNAME_PLACEHOLDER: &str = "{username}";

pub const MESSAGES: &[&str] = &[
    // Game talk
    "That boss fight was insane!",
    "Wow, didn't see that plot twist coming!",
    "How did you manage that jump?!",
    "This game's graphics are next level.",
    "Been waiting to see this level for weeks!",
    // Mentions
    "Can't argue with that, {username}. Great point!",
    "@{username} Nice play! How long have you been streaming this game?",
    "Lol, {username} is totally carrying the team right now.",
    "Yo {username}, what's your best strategy here?",
    "Someone clip that moment, {username}!",
    // Support
    "First time watching - this stream is awesome!",
    "Sub goal getting closer! Let's go!",
    "Chat, we're the best community ever!",
    "Anyone else loving this game?",
    "Seriously can't believe what just happened!",
    // Banter
    "RNG gods are not on your side today!",
    "That was 200 IQ right there!",
    "Biggest fail of the century, lmao",
    "Clutch or kick, am I right?",
    "Chat, should we call that a pro gamer move?",
];

/// A chat badge as rendered by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Badge {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: &'static str,
}

// The blank entry stands for "no badge" and is never handed out.
const BADGE_POOL: &[Badge] = &[
    Badge { kind: "subscriber", text: "1 Month" },
    Badge { kind: "vip", text: "VIP" },
    Badge { kind: "og", text: "OG" },
    Badge { kind: "", text: "" },
];

const MAX_BADGES: usize = 2;

pub fn random_slug<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    SLUGS.choose(rng).copied().unwrap_or("Tiru")
}

/// Pick a chat line, filling any `{username}` mention with a random slug.
pub fn random_message<R: Rng + ?Sized>(rng: &mut R) -> String {
    let template = MESSAGES.choose(rng).copied().unwrap_or("Hello chat!");
    if template.contains(USERNAME_PLACEHOLDER) {
        let mention = random_slug(rng);
        template.replace(USERNAME_PLACEHOLDER, mention)
    } else {
        template.to_string()
    }
}

/// Zero to two distinct, non-blank badges.
pub fn random_badges<R: Rng + ?Sized>(rng: &mut R) -> Vec<Badge> {
    let wanted = rng.gen_range(0..=MAX_BADGES);
    if wanted == 0 {
        return Vec::new();
    }
    let mut pool = BADGE_POOL.to_vec();
    pool.shuffle(rng);
    pool.into_iter()
        .filter(|b| !b.kind.is_empty())
        .take(wanted)
        .collect()
}

/// `#rrggbb` with a random 24-bit value.
pub fn random_color<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("#{:06x}", rng.gen_range(0..0xFF_FFFF_u32))
}
