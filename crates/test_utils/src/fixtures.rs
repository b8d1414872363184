//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for ledger tests. These fixtures are
//! designed to be consistent and predictable.

use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicU64, Ordering};

use core_kernel::Amount;
use domain_billing::LedgerCommand;

/// Fixture for amounts used across ledger tests
pub struct AmountFixtures;

impl AmountFixtures {
    /// The 5% service rate used in most fee examples
    pub fn standard_rate() -> Amount {
        Amount::new(dec!(0.05))
    }

    /// A round principal of 100
    pub fn hundred() -> Amount {
        Amount::new(dec!(100))
    }

    /// Parses a decimal literal, panicking on malformed input
    pub fn parse(value: &str) -> Amount {
        value
            .parse()
            .unwrap_or_else(|e| panic!("invalid fixture amount '{}': {}", value, e))
    }
}

/// Fixture for chat identifiers
pub struct ChatFixtures;

static NEXT_CHAT: AtomicU64 = AtomicU64::new(1);

impl ChatFixtures {
    /// A group chat id that no other test in the process has used
    ///
    /// Lets tests share one database without clearing it in between.
    pub fn unique_chat_id() -> String {
        format!("-100{:010}", NEXT_CHAT.fetch_add(1, Ordering::SeqCst))
    }

    /// A typical group title
    pub fn title() -> &'static str {
        "Night Shift Ops"
    }

    /// A typical acting user id
    pub fn actor_id() -> &'static str {
        "424242"
    }
}

/// Fixture for ledger commands
pub struct CommandFixtures;

impl CommandFixtures {
    /// Command for `chat_id` with an amount given as a decimal literal
    pub fn command(chat_id: &str, amount: &str) -> LedgerCommand {
        LedgerCommand::new(chat_id, AmountFixtures::parse(amount))
    }

    /// Command carrying title and actor, as a chat front-end would send it
    pub fn attributed(chat_id: &str, amount: &str) -> LedgerCommand {
        Self::command(chat_id, amount)
            .with_title(ChatFixtures::title())
            .with_actor(ChatFixtures::actor_id())
    }
}
