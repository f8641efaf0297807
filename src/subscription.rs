use std::fmt;

use tracing::trace;

use crate::error::ClientError;
use crate::frame::Frame;

/// Number of subscription slots used when none is configured.
pub const DEFAULT_MAX_SUBSCRIPTIONS: usize = 8;

/// Prefix of the wire subscription id; slot `n` subscribes as `sub-n`.
pub const SUBSCRIPTION_PREFIX: &str = "sub-";

/// Subscription acknowledgement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    Auto,
    Client,
    ClientIndividual,
}

impl AckMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckMode::Auto => "auto",
            AckMode::Client => "client",
            AckMode::ClientIndividual => "client-individual",
        }
    }
}

/// What the client should do with a message once its handler has run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckDirective {
    /// Send ACK for the message.
    Ack,
    /// Send NACK for the message.
    Nack,
    /// Take no protocol action.
    Continue,
}

/// Callback invoked for each MESSAGE delivered to a subscription.
pub type MessageHandler = Box<dyn FnMut(&Frame) -> AckDirective>;

/// An occupied slot of the registry.
pub struct Subscription {
    id: usize,
    destination: String,
    ack_mode: AckMode,
    handler: MessageHandler,
}

impl Subscription {
    /// Slot index, which is also the numeric part of the wire id.
    pub fn id(&self) -> usize {
        self.id
    }

    /// The id sent on the wire (`sub-{id}`).
    pub fn wire_id(&self) -> String {
        wire_id(self.id)
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn ack_mode(&self) -> AckMode {
        self.ack_mode
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("destination", &self.destination)
            .field("ack_mode", &self.ack_mode)
            .finish_non_exhaustive()
    }
}

/// Format the wire subscription id for slot `id`.
pub fn wire_id(id: usize) -> String {
    format!("{}{}", SUBSCRIPTION_PREFIX, id)
}

/// Parse a `subscription` header of the form `sub-{digits}`.
///
/// Anything else (missing prefix, empty or non-digit suffix, overflow)
/// yields `None`.
pub fn parse_wire_id(value: &str) -> Option<usize> {
    let digits = value.strip_prefix(SUBSCRIPTION_PREFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Fixed-capacity table of subscription slots.
///
/// The table is sized once at construction and never grows. Slots are
/// claimed first-fit, so the lowest free index is always reused first. A
/// slot's id is its own index while occupied; a free slot holds nothing.
pub struct SubscriptionRegistry {
    slots: Vec<Option<Subscription>>,
}

impl SubscriptionRegistry {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    /// Claim the lowest free slot for a new subscription.
    ///
    /// Returns the slot index, or `ClientError::SubscriptionsFull` when every
    /// slot is occupied.
    pub fn allocate(
        &mut self,
        destination: &str,
        ack_mode: AckMode,
        handler: MessageHandler,
    ) -> Result<usize, ClientError> {
        let capacity = self.capacity();
        let (id, slot) = self
            .slots
            .iter_mut()
            .enumerate()
            .find(|(_, slot)| slot.is_none())
            .ok_or(ClientError::SubscriptionsFull { capacity })?;
        *slot = Some(Subscription {
            id,
            destination: destination.to_string(),
            ack_mode,
            handler,
        });
        Ok(id)
    }

    /// Free slot `id`, dropping its handler. Returns whether it was occupied.
    pub fn release(&mut self, id: usize) -> bool {
        self.slots
            .get_mut(id)
            .and_then(Option::take)
            .is_some()
    }

    pub fn lookup(&self, id: usize) -> Option<&Subscription> {
        self.slots.get(id).and_then(Option::as_ref)
    }

    /// Iterate over occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.slots.iter().flatten()
    }

    /// Hand a MESSAGE frame to the subscription its `subscription` header
    /// names.
    ///
    /// Returns the handler's directive, or `None` when the frame is not
    /// addressed to an occupied slot. A slot released and claimed again
    /// between the server sending a message and its arrival will accept that
    /// message: ids are plain slot indexes.
    pub fn dispatch(&mut self, frame: &Frame) -> Option<AckDirective> {
        let header = frame.get_header("subscription");
        let Some(id) = parse_wire_id(header) else {
            trace!(subscription = header, "MESSAGE not addressed to a local subscription");
            return None;
        };
        match self.slots.get_mut(id) {
            Some(Some(sub)) if sub.id == id => Some((sub.handler)(frame)),
            _ => {
                trace!(id, "MESSAGE for a free or unknown subscription slot");
                None
            }
        }
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SUBSCRIPTIONS)
    }
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("capacity", &self.capacity())
            .field("occupied", &self.iter().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> MessageHandler {
        Box::new(|_| AckDirective::Continue)
    }

    #[test]
    fn wire_id_parsing() {
        assert_eq!(parse_wire_id("sub-0"), Some(0));
        assert_eq!(parse_wire_id("sub-17"), Some(17));
        assert_eq!(parse_wire_id("sub-"), None);
        assert_eq!(parse_wire_id("sub-+1"), None);
        assert_eq!(parse_wire_id("sub-1a"), None);
        assert_eq!(parse_wire_id("1"), None);
        assert_eq!(parse_wire_id(""), None);
    }

    #[test]
    fn zero_capacity_is_always_full() {
        let mut reg = SubscriptionRegistry::new(0);
        assert_eq!(
            reg.allocate("/q", AckMode::Auto, noop()),
            Err(ClientError::SubscriptionsFull { capacity: 0 })
        );
    }

    #[test]
    fn release_of_free_slot_reports_false() {
        let mut reg = SubscriptionRegistry::new(2);
        assert!(!reg.release(0));
        assert!(!reg.release(5));
        let id = reg.allocate("/q", AckMode::Client, noop()).expect("slot");
        assert!(reg.release(id));
        assert!(reg.is_empty());
    }
}
