//! Resolution of the effective caller for relayed transactions
use super::types::Address;

/// What the host tells us about who sent a transaction. A relay appends the
/// original requester to the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub sender: Address,
    pub appended_sender: Option<Address>,
}

impl Envelope {
    pub fn direct(sender: Address) -> Self {
        Self {
            sender,
            appended_sender: None,
        }
    }
    pub fn relayed(forwarder: Address, requester: Address) -> Self {
        Self {
            sender: forwarder,
            appended_sender: Some(requester),
        }
    }
}

pub trait CallerResolver: Send + Sync {
    fn effective_caller(&self, envelope: &Envelope) -> Address;
}

/// No relaying: the physical sender is the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectCaller;

impl CallerResolver for DirectCaller {
    fn effective_caller(&self, envelope: &Envelope) -> Address {
        envelope.sender
    }
}

/// Honours the appended sender only when the transaction arrives through the
/// one trusted relay.
#[derive(Debug, Clone, Copy)]
pub struct TrustedForwarder {
    forwarder: Address,
}

impl TrustedForwarder {
    pub fn new(forwarder: Address) -> Self {
        Self { forwarder }
    }
    pub fn is_trusted(&self, sender: Address) -> bool {
        !sender.is_zero() && sender == self.forwarder
    }
}

impl CallerResolver for TrustedForwarder {
    fn effective_caller(&self, envelope: &Envelope) -> Address {
        match envelope.appended_sender {
            Some(requester) if self.is_trusted(envelope.sender) && !requester.is_zero() => {
                requester
            }
            _ => envelope.sender,
        }
    }
}
