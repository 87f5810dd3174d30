//! Typed command/notification channel over the SNES characteristics.
//!
//! At most one command write is in flight per link. Each notifying
//! characteristic has its own subscription bit; losing a subscription is
//! terminal for that characteristic until it is subscribed again.

use crate::ble::device::DeviceStatus;
use crate::ble::protocol::{AttributeHandles, Command, LinkId, NotificationKind};
use crate::ble::radio::Radio;
use crate::error::Error;

/// Decoded notification payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Telemetry {
    Status(DeviceStatus),
    DaysRecorded(u8),
    DeviceId(u8),
    MicGain(u8),
}

impl Telemetry {
    pub fn decode(kind: NotificationKind, value: u8) -> Self {
        match kind {
            NotificationKind::Status => Telemetry::Status(DeviceStatus::from(value)),
            NotificationKind::DaysRecorded => Telemetry::DaysRecorded(value),
            NotificationKind::DeviceId => Telemetry::DeviceId(value),
            NotificationKind::MicGain => Telemetry::MicGain(value),
        }
    }
}

pub struct CommandChannel {
    link: Option<LinkId>,
    handles: Option<AttributeHandles>,
    write_pending: bool,
    subscribed: u8,
}

impl CommandChannel {
    pub const fn new() -> Self {
        Self {
            link: None,
            handles: None,
            write_pending: false,
            subscribed: 0,
        }
    }

    /// Bind the channel to a link whose handles were just discovered.
    pub fn attach(&mut self, link: LinkId, handles: AttributeHandles) {
        self.link = Some(link);
        self.handles = Some(handles);
        self.write_pending = false;
        self.subscribed = 0;
    }

    /// Forget the link. Subscriptions and any pending write are dropped.
    pub fn detach(&mut self) {
        *self = Self::new();
    }

    pub fn link(&self) -> Option<LinkId> {
        self.link
    }

    pub fn handles(&self) -> Option<&AttributeHandles> {
        self.handles.as_ref()
    }

    pub fn write_pending(&self) -> bool {
        self.write_pending
    }

    pub fn is_subscribed(&self, kind: NotificationKind) -> bool {
        self.subscribed & kind.bit() != 0
    }

    fn bound_link(&self) -> Result<LinkId, Error> {
        match (self.link, self.handles) {
            (Some(link), Some(_)) => Ok(link),
            _ => Err(Error::NotConnected),
        }
    }

    /// Encode `cmd` and hand it to the radio.
    ///
    /// Fails with `NotConnected` before discovery and `WriteAlreadyPending`
    /// while the previous write has not completed. A write the radio refuses
    /// does not leave the channel blocked.
    pub fn send_command<R: Radio>(&mut self, radio: &mut R, cmd: &Command) -> Result<(), Error> {
        let link = self.bound_link()?;
        if self.write_pending {
            return Err(Error::WriteAlreadyPending);
        }
        let payload = cmd.encode()?;

        self.write_pending = true;
        if let Err(e) = radio.write(link, &payload) {
            self.write_pending = false;
            return Err(e);
        }
        Ok(())
    }

    /// The outstanding write finished, successfully or not.
    pub fn on_write_complete(&mut self) {
        self.write_pending = false;
    }

    pub fn subscribe<R: Radio>(&mut self, radio: &mut R, kind: NotificationKind) -> Result<(), Error> {
        let link = self.bound_link()?;
        if self.handles.map_or(0, |h| h.ccc(kind)) == 0 {
            return Err(Error::NotConnected);
        }
        radio.subscribe(link, kind)?;
        self.subscribed |= kind.bit();
        Ok(())
    }

    pub fn unsubscribe<R: Radio>(&mut self, radio: &mut R, kind: NotificationKind) -> Result<(), Error> {
        let link = self.bound_link()?;
        if !self.is_subscribed(kind) {
            return Ok(());
        }
        self.subscribed &= !kind.bit();
        radio.unsubscribe(link, kind)
    }

    /// Subscribe every characteristic that exposes a CCC descriptor.
    ///
    /// Stops at the first request the radio refuses.
    pub fn subscribe_all<R: Radio>(&mut self, radio: &mut R) -> Result<(), Error> {
        let handles = self.handles.ok_or(Error::NotConnected)?;
        for kind in NotificationKind::ALL {
            if handles.ccc(kind) != 0 {
                self.subscribe(radio, kind)?;
            }
        }
        Ok(())
    }

    /// The peer or the stack dropped a subscription.
    pub fn on_unsubscribed(&mut self, kind: NotificationKind) {
        self.subscribed &= !kind.bit();
    }

    /// Decode a notification. Values on unsubscribed characteristics are
    /// ignored.
    pub fn on_notification(&self, kind: NotificationKind, value: u8) -> Option<Telemetry> {
        self.is_subscribed(kind)
            .then(|| Telemetry::decode(kind, value))
    }
}

impl Default for CommandChannel {
    fn default() -> Self {
        Self::new()
    }
}
