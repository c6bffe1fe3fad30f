//! Print the conversation key for two participants.

use anyhow::Result;
use chat_types::ConversationKey;

use super::participants;

/// Run the key command.
pub fn run(a: &str, b: &str) -> Result<()> {
    println!("{}", conversation_key(a, b)?);
    Ok(())
}

fn conversation_key(a: &str, b: &str) -> Result<ConversationKey> {
    let (a, b) = participants(a, b)?;
    Ok(ConversationKey::new(&a, &b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_order_independent() {
        let ab = conversation_key("bob", "alice").unwrap();
        assert_eq!(ab.to_string(), "alice_bob");
        assert_eq!(ab, conversation_key("alice", "bob").unwrap());
    }

    #[test]
    fn blank_ids_are_rejected() {
        assert!(run("", "bob").is_err());
    }
}
