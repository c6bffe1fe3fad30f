//! Follow a conversation live.

use anyhow::Result;
use chat_client::ClientConfig;
use chat_core::{Advisory, ConversationView};
use chat_types::{Message, ParticipantId, ServerId};
use std::collections::HashSet;

use super::{connect, format_message, participants};

/// Run the watch command.
pub async fn run(config: &ClientConfig, me: &str, peer: &str) -> Result<()> {
    let (me, peer) = participants(me, peer)?;
    let manager = connect(config)?;
    let mut view = manager.open(me.clone(), peer.clone()).await?;

    println!("Watching conversation with {} (Ctrl-C to stop)", peer);
    let mut printer = Printer::default();

    loop {
        tokio::select! {
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = view.borrow_and_update().clone();
                printer.print(&current, &me);
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    manager.shutdown().await;
    Ok(())
}

/// Prints what is new in each published view.
///
/// A message counts as shown when its server id or its
/// `(sender, content, timestamp)` triple has been printed before, which is
/// the same rule as [`Message::same_as`].
#[derive(Default)]
struct Printer {
    shown_ids: HashSet<ServerId>,
    shown_keys: HashSet<(ParticipantId, String, i64)>,
    advisories_seen: u64,
}

impl Printer {
    fn print(&mut self, view: &ConversationView, me: &ParticipantId) {
        for line in self.new_lines(view, me) {
            println!("{line}");
        }
        for advisory in self.new_advisories(view) {
            eprintln!("warning: {}", describe(advisory));
        }
    }

    fn new_lines(&mut self, view: &ConversationView, me: &ParticipantId) -> Vec<String> {
        let mut lines = Vec::new();
        for message in view.messages.iter() {
            if self.mark_shown(message) {
                lines.push(format_message(message, me));
            }
        }
        lines
    }

    /// Record a message as shown; false if it already was.
    fn mark_shown(&mut self, message: &Message) -> bool {
        let key = (
            message.sender().clone(),
            message.content().to_owned(),
            message.client_timestamp(),
        );
        let seen_id = message
            .server_id()
            .is_some_and(|id| self.shown_ids.contains(id));
        let seen = seen_id || self.shown_keys.contains(&key);

        if let Some(id) = message.server_id() {
            self.shown_ids.insert(id.clone());
        }
        self.shown_keys.insert(key);
        !seen
    }

    /// Advisories are bounded, so new ones are counted from the running total.
    fn new_advisories<'a>(&mut self, view: &'a ConversationView) -> &'a [Advisory] {
        let all = &view.status.advisories;
        let total = view.status.total_advised;
        let fresh = usize::try_from(total.saturating_sub(self.advisories_seen))
            .unwrap_or(usize::MAX)
            .min(all.len());
        self.advisories_seen = total;
        &all[all.len() - fresh..]
    }
}

fn describe(advisory: &Advisory) -> String {
    match advisory {
        Advisory::FetchFailed { error } => format!("history unavailable: {error}"),
        Advisory::RecordsSkipped { count } => format!("{count} history records could not be read"),
        Advisory::EventSkipped { error } => format!("live message dropped: {error}"),
        Advisory::SubscribeFailed { error } => format!("live updates unavailable: {error}"),
        Advisory::FeedDropped { reason } => format!("live updates stopped: {reason}"),
        Advisory::TeardownFailed { error } => format!("unsubscribe failed: {error}"),
        Advisory::SendFailed { error } => format!("message not stored: {error}"),
    }
}
