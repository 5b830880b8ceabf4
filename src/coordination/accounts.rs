//! The two transfer accounts and the direction of each cycle

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use std::fmt;

/// Which of the two configured accounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccountLabel {
    A,
    B,
}

impl AccountLabel {
    pub fn counterpart(self) -> Self {
        match self {
            AccountLabel::A => AccountLabel::B,
            AccountLabel::B => AccountLabel::A,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountLabel::A => "A",
            AccountLabel::B => "B",
        }
    }
}

impl fmt::Display for AccountLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An address with the key that signs for it
#[derive(Clone)]
pub struct Account {
    label: AccountLabel,
    wallet: LocalWallet,
}

impl Account {
    pub fn new(label: AccountLabel, wallet: LocalWallet) -> Self {
        Self { label, wallet }
    }

    pub fn label(&self) -> AccountLabel {
        self.label
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }

    pub(crate) fn wallet(&self) -> &LocalWallet {
        &self.wallet
    }
}

// Never print the signing key.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("label", &self.label)
            .field("address", &self.address())
            .finish()
    }
}

/// Sender and receiver of one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub sender: AccountLabel,
    pub receiver: AccountLabel,
}

impl Direction {
    /// Even cycles send A -> B, odd cycles send B -> A
    pub fn for_cycle(cycle: u64) -> Self {
        let sender = if cycle % 2 == 0 {
            AccountLabel::A
        } else {
            AccountLabel::B
        };
        Self {
            sender,
            receiver: sender.counterpart(),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.sender, self.receiver)
    }
}
