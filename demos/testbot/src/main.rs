//! Test Bot
//!
//! A small bot wiring up one rule of each kind the framework supports.
//!
//! # Rules
//!
//! ```text
//! "@bot hi"                 → "hi to you too <name> 🤘"
//! "you guys"                → inclusive-language nudge, once per user and channel every 4h
//! @channel / @here          → thread reply in #ops and #security
//! "12:30"                   → ephemeral "That looks like a time"
//! ".start <name>" in #incidents → "Started Incident: <name>" (regex captures)
//! ".begin <name>" in #incidents → the same, via the prefix remainder
//! "opx"                     → reacts :zero: :parking: :x:
//! "xox"                     → spells the word with letter emoji
//! :eyes: on any message     → thread reply
//! anything else @bot        → ¯\_(ツ)_/¯
//! ```
//!
//! # Usage
//!
//! ```bash
//! QUIP_BOT__TOKEN=xoxb-... QUIP_BOT__APP_TOKEN=xapp-... cargo run --package testbot
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use quip::core::SessionInfo;
use quip::framework::LetterEmojis;
use quip::prelude::*;
use regex::Regex;
use tracing::info;

#[derive(Debug, Parser)]
#[command(about = "A sample Quip bot")]
struct Cli {
    /// Configuration file to load instead of searching the default locations.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile (development, production or a custom name).
    #[arg(short, long)]
    profile: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn greet(msg: Arc<InboundMessage>) -> String {
    let name = msg.sender_name().unwrap_or("stranger");
    format!("hi to you too {name} 🤘")
}

async fn inclusive_language() -> &'static str {
    "Not a big deal but consider using “y’all”, “everyone”, or “folks” instead. \
     It’s more inclusive than “guys”. 👍"
}

async fn looks_like_a_time(msg: Arc<InboundMessage>) -> Result<OutboundAction, ResponseError> {
    Ok(msg.ephemeral("That looks like a time")?)
}

async fn start_incident(Captures(groups): Captures) -> Option<String> {
    let name = groups.get(1)?.as_deref()?;
    info!(incident = name, "Starting incident");
    Some(format!("Started Incident: {name}"))
}

async fn start_incident_prefix(Text(rest): Text) -> Option<String> {
    (!rest.is_empty()).then(|| format!("Started Incident: {rest}"))
}

async fn bad_emoji(msg: Arc<InboundMessage>) -> OutboundAction {
    msg.emoji_reaction(["+1111"])
}

async fn opx(msg: Arc<InboundMessage>) -> OutboundAction {
    msg.emoji_reaction(["zero", "parking", "x"])
}

async fn spell_xox(msg: Arc<InboundMessage>) -> OutboundAction {
    msg.emoji_word_reaction("xox")
}

async fn looking(msg: Arc<InboundMessage>) -> OutboundAction {
    msg.reply_thread("I see you looking 👀")
}

async fn shrug() -> &'static str {
    "¯\\_(ツ)_/¯"
}

fn tiers(tiers: &[&[&str]]) -> LetterEmojis {
    LetterEmojis::Tiered(
        tiers
            .iter()
            .map(|tier| tier.iter().map(|s| s.to_string()).collect())
            .collect(),
    )
}

fn flat(items: &[&str]) -> LetterEmojis {
    LetterEmojis::Flat(items.iter().map(|s| s.to_string()).collect())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder = BotRuntime::builder();
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &cli.profile {
        builder = builder.profile(profile);
    }
    let mut runtime = builder.build()?;

    runtime
        .register_primary(directed_at_bot().contains(["hi"]), greet)
        .register_primary(
            all()
                .contains(["you guys"])
                .and([all().throttled_by_conversation(), all().throttled_by_user()]),
            inclusive_language,
        );

    for (channel, group) in [("ops", "@ops-team"), ("security", "@sec")] {
        let text = format!(
            "Lots of other people in this channel, use {group} to only talk to the relevant people"
        );
        runtime.register_primary(
            all()
                .in_channel([channel])
                .or([all().contains(["@channel"]), all().contains(["@here"])]),
            move |msg: Arc<InboundMessage>| async move { msg.reply_thread(text) },
        );
    }

    runtime
        .register_primary(all().matches([Regex::new(r"\d{1,2}:\d{2}")?]), looks_like_a_time)
        .register_primary(
            all()
                .in_channel(["incidents"])
                .matches([Regex::new(r"^\.start (.+)")?]),
            start_incident,
        )
        .register_primary(
            all().in_channel(["incidents"]).starts_with([".begin"]),
            start_incident_prefix,
        )
        .register_primary(directed_at_bot().contains(["bad emoji error"]), bad_emoji)
        .register_primary(all().contains(["opx"]), opx)
        .register_primary(all().contains(["xox"]), spell_xox)
        .register_reaction("eyes", all(), looking)
        .register_fallthrough(directed_at_bot(), shrug);

    if runtime.config().letters.is_none() {
        runtime.configure_letter_map([
            ("l", tiers(&[&["l-train"], &["l-train-3877"]])),
            ("i", flat(&["information_source"])),
            ("o", flat(&["zero"])),
            ("p", flat(&["parking"])),
            ("x", tiers(&[&["x", "heavy_multiplication_x"], &["negative_squared_cross_mark"]])),
        ])?;
    }

    runtime
        .run_until(
            |session: SessionInfo| async move {
                info!(user_id = %session.user_id, "Test bot ready");
            },
            async {
                let _ = tokio::signal::ctrl_c().await;
            },
        )
        .await?;

    Ok(())
}
