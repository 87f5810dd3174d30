//! Connection state machine.
//!
//! Owns the single peer link and drives it through
//! scan → connect → discover → subscribe → ready → teardown. The machine
//! never waits: it issues non-blocking [`Radio`] requests and advances when
//! the matching [`RadioEvent`] is fed back by the run loop. Events tagged
//! with a link id other than the current one are ignored.
//!
//! Lifecycle notifications for the UI go out through an [`EventSink`]:
//! `Connected` once the peer is ready, then `InfosUpdated` for each
//! telemetry change, and finally `Disconnected`. A link that never reached
//! `Connected` ends with `ConnectionFailed` instead.

use crate::ble::command_channel::{CommandChannel, Telemetry};
use crate::ble::device::DeviceRecord;
use crate::ble::protocol::{Command, LinkId, NotificationKind};
use crate::ble::radio::{Radio, RadioEvent};
use crate::ble::registry::Registry;
use crate::config::{CONNECT_TIMEOUT_MS, STALE_TIMEOUT_MS};
use crate::error::{BleError, Error};
use embassy_sync::blocking_mutex::raw::RawMutex;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnState {
    Init,
    Scanning,
    Connecting,
    Connected,
    DiscoveringCharacteristics,
    Ready,
    Releasing,
    Resetting,
    TogglingRecording,
    SendingCommand,
    Disconnecting,
}

impl ConnState {
    /// Ready, or waiting for a command write to complete.
    pub const fn is_ready(self) -> bool {
        matches!(
            self,
            ConnState::Ready
                | ConnState::Releasing
                | ConnState::Resetting
                | ConnState::TogglingRecording
                | ConnState::SendingCommand
        )
    }
}

/// Requests from the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Intent {
    Connect(DeviceRecord),
    Disconnect,
    Send(Command),
}

/// Connection lifecycle as seen by the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionEvent {
    ConnectionFailed,
    Connected(DeviceRecord),
    Disconnected,
    InfosUpdated(DeviceRecord),
}

/// Receiver of [`ConnectionEvent`]s.
pub trait EventSink {
    fn emit(&mut self, event: ConnectionEvent);
}

impl<F: FnMut(ConnectionEvent)> EventSink for F {
    fn emit(&mut self, event: ConnectionEvent) {
        self(event)
    }
}

/// Observable connection state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConnectionContext {
    pub state: ConnState,
    /// `None` while scanning.
    pub active_device: Option<DeviceRecord>,
    /// Pending or established link.
    pub link: Option<LinkId>,
    /// Last microphone gain reported by the peer.
    pub mic_gain: Option<u8>,
}

pub struct ConnectionManager<'r, M: RawMutex, R: Radio, S: EventSink, const N: usize> {
    registry: &'r Registry<M, N>,
    radio: R,
    sink: S,
    ctx: ConnectionContext,
    channel: CommandChannel,
    last_link: LinkId,
    /// `Connected` was emitted for the current link.
    announced: bool,
    scan_active: bool,
    /// Teardown was asked for by the user rather than caused by the link.
    user_disconnect: bool,
    disconnect_requested: bool,
    /// Registry key of the active device's record. Differs from the
    /// device's id when the peer reported an id another collar holds.
    record_id: u32,
    /// Armed by the first tick of a connection attempt.
    connect_deadline: Option<u64>,
}

impl<'r, M: RawMutex, R: Radio, S: EventSink, const N: usize> ConnectionManager<'r, M, R, S, N> {
    pub fn new(registry: &'r Registry<M, N>, radio: R, sink: S) -> Self {
        Self {
            registry,
            radio,
            sink,
            ctx: ConnectionContext {
                state: ConnState::Init,
                active_device: None,
                link: None,
                mic_gain: None,
            },
            channel: CommandChannel::new(),
            last_link: LinkId(0),
            announced: false,
            scan_active: false,
            user_disconnect: false,
            disconnect_requested: false,
            record_id: 0,
            connect_deadline: None,
        }
    }

    pub fn state(&self) -> ConnState {
        self.ctx.state
    }

    pub fn context(&self) -> &ConnectionContext {
        &self.ctx
    }

    pub fn channel(&self) -> &CommandChannel {
        &self.channel
    }

    pub fn is_scanning(&self) -> bool {
        self.scan_active
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // ── UI side ──────────────────────────────────────────────────────────

    pub fn handle_intent(&mut self, intent: Intent) -> Result<(), Error> {
        match intent {
            Intent::Connect(device) => self.connect(device),
            Intent::Disconnect => self.disconnect(),
            Intent::Send(cmd) => self.send(cmd),
        }
    }

    /// Stop scanning and start connecting to `device`.
    ///
    /// Only valid while scanning. The freshest registry copy of the device
    /// is used when one exists.
    pub fn connect(&mut self, device: DeviceRecord) -> Result<(), Error> {
        if self.ctx.state != ConnState::Scanning {
            return Err(Error::InvalidState);
        }
        let device = self.registry.get_by_id(device.id).unwrap_or(device);

        if self.scan_active {
            if self.radio.stop_scan().is_err() {
                self.sink.emit(ConnectionEvent::ConnectionFailed);
                return Err(Error::ScanStopFailed);
            }
            self.scan_active = false;
        }

        self.last_link = self.last_link.next();
        let link = self.last_link;
        if self.radio.connect(link, device.address).is_err() {
            self.sink.emit(ConnectionEvent::ConnectionFailed);
            let _ = self.start_scan();
            return Err(Error::ConnectFailed);
        }

        self.ctx.state = ConnState::Connecting;
        self.ctx.active_device = Some(device);
        self.ctx.link = Some(link);
        self.announced = false;
        self.user_disconnect = false;
        self.record_id = device.id;
        self.connect_deadline = None;
        Ok(())
    }

    /// Tear the link down on user request. A no-op when there is no link.
    pub fn disconnect(&mut self) -> Result<(), Error> {
        self.begin_disconnect(true)
    }

    pub fn send(&mut self, cmd: Command) -> Result<(), Error> {
        if !self.ctx.state.is_ready() {
            return Err(Error::NotConnected);
        }
        self.channel.send_command(&mut self.radio, &cmd)?;
        self.ctx.state = match cmd {
            Command::Open => ConnState::Releasing,
            Command::Reset => ConnState::Resetting,
            Command::ToggleRecording => ConnState::TogglingRecording,
            _ => ConnState::SendingCommand,
        };
        Ok(())
    }

    pub fn open_collar(&mut self) -> Result<(), Error> {
        self.send(Command::Open)
    }

    pub fn reset_collar(&mut self) -> Result<(), Error> {
        self.send(Command::Reset)
    }

    pub fn toggle_recording(&mut self) -> Result<(), Error> {
        self.send(Command::ToggleRecording)
    }

    pub fn subscribe(&mut self, kind: NotificationKind) -> Result<(), Error> {
        if !self.ctx.state.is_ready() {
            return Err(Error::NotConnected);
        }
        self.channel.subscribe(&mut self.radio, kind)
    }

    pub fn unsubscribe(&mut self, kind: NotificationKind) -> Result<(), Error> {
        if !self.ctx.state.is_ready() {
            return Err(Error::NotConnected);
        }
        self.channel.unsubscribe(&mut self.radio, kind)
    }

    // ── Radio side ───────────────────────────────────────────────────────

    /// Advance the machine with one radio event.
    ///
    /// The returned error has already been handled; it is reported so the
    /// caller can log it.
    pub fn handle_radio_event(&mut self, event: RadioEvent, now: u64) -> Result<(), Error> {
        match event {
            RadioEvent::Enabled => {
                if self.ctx.state != ConnState::Init {
                    return Ok(());
                }
                self.ctx.state = ConnState::Scanning;
                self.start_scan()
            }
            RadioEvent::Unavailable => match self.ctx.state {
                ConnState::Init => Err(Error::RadioUnavailable),
                _ => Ok(()),
            },
            RadioEvent::ScanFailed => {
                self.scan_active = false;
                match self.ctx.state {
                    ConnState::Scanning => Err(Error::ScanStartFailed),
                    _ => Ok(()),
                }
            }
            _ if !self.is_current(event.link()) => Ok(()),
            RadioEvent::LinkEstablished { link } => {
                if self.ctx.state != ConnState::Connecting {
                    return Ok(());
                }
                self.ctx.state = ConnState::Connected;
                match self.radio.discover(link) {
                    Ok(()) => {
                        self.ctx.state = ConnState::DiscoveringCharacteristics;
                        Ok(())
                    }
                    Err(e) => self.begin_disconnect(false).and(Err(e)),
                }
            }
            RadioEvent::LinkFailed { .. } => {
                let was_connecting = self.ctx.state == ConnState::Connecting;
                let _ = self.finish_teardown(now);
                if was_connecting {
                    Err(Error::ConnectFailed)
                } else {
                    Ok(())
                }
            }
            RadioEvent::DiscoveryComplete { link, handles } => {
                if self.ctx.state != ConnState::DiscoveringCharacteristics {
                    return Ok(());
                }
                self.channel.attach(link, handles);
                if let Err(e) = self.channel.subscribe_all(&mut self.radio) {
                    return self.begin_disconnect(false).and(Err(e));
                }
                self.ctx.state = ConnState::Ready;
                if let Some(device) = self.ctx.active_device {
                    self.announced = true;
                    self.sink.emit(ConnectionEvent::Connected(device));
                }
                Ok(())
            }
            RadioEvent::ServiceNotFound { .. } => {
                if self.ctx.state != ConnState::DiscoveringCharacteristics {
                    return Ok(());
                }
                self.begin_disconnect(false)
                    .and(Err(Error::ServiceNotFound))
            }
            RadioEvent::WriteComplete { ok, .. } => {
                self.channel.on_write_complete();
                if self.ctx.state.is_ready() {
                    self.ctx.state = ConnState::Ready;
                }
                if ok {
                    Ok(())
                } else {
                    Err(Error::Ble(BleError::WriteFailed))
                }
            }
            RadioEvent::Notification { kind, value, .. } => {
                match self.channel.on_notification(kind, value) {
                    Some(telemetry) => self.apply_telemetry(telemetry, now),
                    None => Ok(()),
                }
            }
            RadioEvent::Unsubscribed { kind, .. } => {
                self.channel.on_unsubscribed(kind);
                Ok(())
            }
            RadioEvent::LinkDropped { .. } => self.finish_teardown(now),
        }
    }

    /// Periodic housekeeping: retry a failed scan start or a disconnect
    /// request the radio did not accept, and abandon a connection attempt
    /// that has run past [`CONNECT_TIMEOUT_MS`].
    ///
    /// The abandoned attempt ends like any other failed one: the radio
    /// reports `LinkFailed` and the UI gets `ConnectionFailed`.
    pub fn tick(&mut self, now: u64) -> Result<(), Error> {
        match (self.ctx.state, self.ctx.link) {
            (ConnState::Connecting, Some(_)) => match self.connect_deadline {
                None => {
                    self.connect_deadline = Some(now + CONNECT_TIMEOUT_MS);
                    Ok(())
                }
                Some(deadline) if now >= deadline => {
                    self.begin_disconnect(false).and(Err(Error::ConnectFailed))
                }
                Some(_) => Ok(()),
            },
            (ConnState::Scanning, _) if !self.scan_active => self.start_scan(),
            (ConnState::Disconnecting, Some(link)) if !self.disconnect_requested => {
                self.request_disconnect(link)
            }
            _ => Ok(()),
        }
    }

    // ── internals ────────────────────────────────────────────────────────

    fn is_current(&self, link: Option<LinkId>) -> bool {
        link.is_some() && link == self.ctx.link
    }

    fn start_scan(&mut self) -> Result<(), Error> {
        match self.radio.start_scan() {
            Ok(()) => {
                self.scan_active = true;
                Ok(())
            }
            Err(_) => {
                self.scan_active = false;
                Err(Error::ScanStartFailed)
            }
        }
    }

    fn begin_disconnect(&mut self, user: bool) -> Result<(), Error> {
        match self.ctx.state {
            ConnState::Init | ConnState::Scanning => return Ok(()),
            ConnState::Disconnecting => {
                self.user_disconnect |= user;
                return Ok(());
            }
            _ => {}
        }
        let Some(link) = self.ctx.link else {
            return Ok(());
        };
        self.ctx.state = ConnState::Disconnecting;
        self.user_disconnect = user;
        self.request_disconnect(link)
    }

    fn request_disconnect(&mut self, link: LinkId) -> Result<(), Error> {
        let result = self.radio.disconnect(link);
        self.disconnect_requested = result.is_ok();
        result
    }

    /// Link is gone: clean up, notify the UI and go back to scanning.
    fn finish_teardown(&mut self, now: u64) -> Result<(), Error> {
        let device = self.ctx.active_device.take();
        if self.user_disconnect {
            if device.is_some() {
                self.registry.remove(self.record_id);
            }
        } else {
            self.registry.sweep_stale(now, STALE_TIMEOUT_MS);
        }

        self.channel.detach();
        self.ctx.link = None;
        self.ctx.mic_gain = None;
        self.ctx.state = ConnState::Scanning;

        let event = if self.announced {
            ConnectionEvent::Disconnected
        } else {
            ConnectionEvent::ConnectionFailed
        };
        self.announced = false;
        self.user_disconnect = false;
        self.disconnect_requested = false;
        self.sink.emit(event);

        self.start_scan()
    }

    fn apply_telemetry(&mut self, telemetry: Telemetry, now: u64) -> Result<(), Error> {
        let Some(mut device) = self.ctx.active_device else {
            return Ok(());
        };
        match telemetry {
            Telemetry::Status(status) => device.status = status,
            Telemetry::DaysRecorded(days) => device.days_recorded = days,
            Telemetry::DeviceId(id) => {
                let id = u32::from(id);
                if id != device.id {
                    // Another collar's record under that id is left alone.
                    let free = self
                        .registry
                        .get_by_id(id)
                        .map_or(true, |other| other.address == device.address);
                    if free {
                        self.registry.remove(self.record_id);
                        self.record_id = id;
                    }
                    device.id = id;
                }
            }
            Telemetry::MicGain(gain) => self.ctx.mic_gain = Some(gain),
        }
        device.last_seen = now;
        self.ctx.active_device = Some(device);

        let stored = self.registry.upsert(
            self.record_id,
            device.rssi,
            device.days_recorded,
            device.status,
            device.address,
            now,
        );
        self.sink.emit(ConnectionEvent::InfosUpdated(device));
        stored
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════
