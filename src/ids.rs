//! Id generation for conversations and sessions.
//!
//! Spec §4.6: "The agent uses its own `conversationId` deterministically
//! (auto-generated from timestamp+random if not supplied)." Reuses the
//! teacher's existing `rand` dependency rather than adding a `uuid` crate
//! solely for this.

use rand::Rng;

use crate::message::now_millis;

/// Generate a conversation id shaped `conv-<millis>-<6 random hex chars>`.
pub fn generate_conversation_id() -> String {
    format!("conv-{}-{}", now_millis(), random_suffix())
}

/// Generate a generic run/session-scoped id with a caller-chosen prefix.
pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}-{}", prefix, now_millis(), random_suffix())
}

fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| {
            let n: u8 = rng.gen_range(0..16);
            std::char::from_digit(n as u32, 16).unwrap()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_conversation_ids_are_distinct() {
        let a = generate_conversation_id();
        let b = generate_conversation_id();
        assert_ne!(a, b);
        assert!(a.starts_with("conv-"));
    }

    #[test]
    fn test_generate_id_uses_given_prefix() {
        let id = generate_id("session");
        assert!(id.starts_with("session-"));
    }

    #[test]
    fn test_random_suffix_is_six_hex_chars() {
        let suffix = random_suffix();
        assert_eq!(suffix.len(), 6);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
