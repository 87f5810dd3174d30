//! Boundary between the connection state machine and the radio.
//!
//! Requests go out through [`Radio`] and never block; their outcome comes
//! back later as a [`RadioEvent`] tagged with the link it belongs to.

use crate::ble::device::BleAddress;
use crate::ble::protocol::{AttributeHandles, LinkId, NotificationKind};
use crate::error::Error;

/// Non-blocking radio requests.
///
/// An `Err` means the request was not accepted at all; a request that is
/// accepted and later fails reports through a [`RadioEvent`].
pub trait Radio {
    fn start_scan(&mut self) -> Result<(), Error>;
    fn stop_scan(&mut self) -> Result<(), Error>;
    fn connect(&mut self, link: LinkId, address: BleAddress) -> Result<(), Error>;
    fn disconnect(&mut self, link: LinkId) -> Result<(), Error>;
    fn discover(&mut self, link: LinkId) -> Result<(), Error>;
    fn subscribe(&mut self, link: LinkId, kind: NotificationKind) -> Result<(), Error>;
    fn unsubscribe(&mut self, link: LinkId, kind: NotificationKind) -> Result<(), Error>;
    fn write(&mut self, link: LinkId, payload: &[u8]) -> Result<(), Error>;
}

/// Completions and unsolicited events coming up from the radio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEvent {
    /// The BLE stack is up.
    Enabled,
    /// The BLE stack could not be brought up.
    Unavailable,
    /// Scanning stopped on its own (stack error).
    ScanFailed,
    LinkEstablished { link: LinkId },
    LinkFailed { link: LinkId },
    DiscoveryComplete { link: LinkId, handles: AttributeHandles },
    ServiceNotFound { link: LinkId },
    WriteComplete { link: LinkId, ok: bool },
    Notification { link: LinkId, kind: NotificationKind, value: u8 },
    Unsubscribed { link: LinkId, kind: NotificationKind },
    LinkDropped { link: LinkId },
}

impl RadioEvent {
    /// Link the event belongs to, if any.
    pub const fn link(&self) -> Option<LinkId> {
        match *self {
            RadioEvent::Enabled | RadioEvent::Unavailable | RadioEvent::ScanFailed => None,
            RadioEvent::LinkEstablished { link }
            | RadioEvent::LinkFailed { link }
            | RadioEvent::DiscoveryComplete { link, .. }
            | RadioEvent::ServiceNotFound { link }
            | RadioEvent::WriteComplete { link, .. }
            | RadioEvent::Notification { link, .. }
            | RadioEvent::Unsubscribed { link, .. }
            | RadioEvent::LinkDropped { link } => Some(link),
        }
    }
}
