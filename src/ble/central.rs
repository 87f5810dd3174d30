//! SoftDevice side of the connection manager.
//!
//! One task owns the radio: it scans while nothing else is going on, runs
//! the single peer link, and reports every outcome back as a
//! [`RadioEvent`]. The state machine talks to it through [`ChannelRadio`]
//! and is itself driven by [`ble_task`].

use crate::ble::connection::{ConnectionEvent, ConnectionManager, Intent};
use crate::ble::device::{AddressKind, BleAddress};
use crate::ble::protocol::{CommandBuf, LinkId, NotificationKind};
use crate::ble::radio::{Radio, RadioEvent};
use crate::ble::snes_client::{self, Discovery, SnesClient};
use crate::ble::{now_ms, scanner, HubRegistry};
use crate::config;
use crate::error::Error;
use defmt::{debug, info, warn};
use embassy_futures::select::{select, select3, Either, Either3};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Ticker};
use nrf_softdevice::ble::{central, gatt_client, Address, AddressType, Connection};
use nrf_softdevice::raw;
use nrf_softdevice::Softdevice;

pub const REQUEST_QUEUE: usize = 8;
pub const EVENT_QUEUE: usize = 16;
pub const INTENT_QUEUE: usize = 4;
pub const UI_EVENT_QUEUE: usize = 8;

pub type RequestSender = Sender<'static, CriticalSectionRawMutex, RadioRequest, REQUEST_QUEUE>;
pub type RequestReceiver = Receiver<'static, CriticalSectionRawMutex, RadioRequest, REQUEST_QUEUE>;
pub type EventSender = Sender<'static, CriticalSectionRawMutex, RadioEvent, EVENT_QUEUE>;
pub type EventReceiver = Receiver<'static, CriticalSectionRawMutex, RadioEvent, EVENT_QUEUE>;

/// Work items for [`radio_task`].
#[derive(Clone, Debug, defmt::Format)]
pub enum RadioRequest {
    StartScan,
    StopScan,
    Connect { link: LinkId, address: BleAddress },
    Disconnect { link: LinkId },
    Discover { link: LinkId },
    Subscribe { link: LinkId, kind: NotificationKind },
    Unsubscribe { link: LinkId, kind: NotificationKind },
    Write { link: LinkId, payload: CommandBuf },
}

/// [`Radio`] implementation that queues requests for [`radio_task`].
pub struct ChannelRadio {
    requests: RequestSender,
}

impl ChannelRadio {
    pub fn new(requests: RequestSender) -> Self {
        Self { requests }
    }

    fn post(&self, request: RadioRequest, on_full: Error) -> Result<(), Error> {
        self.requests.try_send(request).map_err(|_| on_full)
    }
}

impl Radio for ChannelRadio {
    fn start_scan(&mut self) -> Result<(), Error> {
        self.post(RadioRequest::StartScan, Error::ScanStartFailed)
    }

    fn stop_scan(&mut self) -> Result<(), Error> {
        self.post(RadioRequest::StopScan, Error::ScanStopFailed)
    }

    fn connect(&mut self, link: LinkId, address: BleAddress) -> Result<(), Error> {
        self.post(RadioRequest::Connect { link, address }, Error::ConnectFailed)
    }

    fn disconnect(&mut self, link: LinkId) -> Result<(), Error> {
        self.post(RadioRequest::Disconnect { link }, Error::QueueFull)
    }

    fn discover(&mut self, link: LinkId) -> Result<(), Error> {
        self.post(RadioRequest::Discover { link }, Error::QueueFull)
    }

    fn subscribe(&mut self, link: LinkId, kind: NotificationKind) -> Result<(), Error> {
        self.post(RadioRequest::Subscribe { link, kind }, Error::QueueFull)
    }

    fn unsubscribe(&mut self, link: LinkId, kind: NotificationKind) -> Result<(), Error> {
        self.post(RadioRequest::Unsubscribe { link, kind }, Error::QueueFull)
    }

    fn write(&mut self, link: LinkId, payload: &[u8]) -> Result<(), Error> {
        let payload = CommandBuf::from_slice(payload).map_err(|_| Error::InvalidArgument)?;
        self.post(RadioRequest::Write { link, payload }, Error::QueueFull)
    }
}

fn sd_address(address: &BleAddress) -> Address {
    let kind = match address.kind {
        AddressKind::Public => AddressType::Public,
        AddressKind::RandomStatic => AddressType::RandomStatic,
        AddressKind::RandomPrivateResolvable => AddressType::RandomPrivateResolvable,
        AddressKind::RandomPrivateNonResolvable => AddressType::RandomPrivateNonResolvable,
        AddressKind::Anonymous => AddressType::Anonymous,
    };
    Address::new(kind, address.bytes)
}

/// Owns the SoftDevice radio: scanning and the peer link.
pub async fn radio_task(
    sd: &'static Softdevice,
    registry: &'static HubRegistry,
    requests: RequestReceiver,
    events: EventSender,
) -> ! {
    events.send(RadioEvent::Enabled).await;

    let mut scanning = false;
    loop {
        let request = if scanning {
            match select(scanner::scan(sd, registry), requests.receive()).await {
                Either::First(result) => {
                    scanning = false;
                    if let Err(e) = result {
                        warn!("scan stopped: {}", e);
                    }
                    events.send(RadioEvent::ScanFailed).await;
                    continue;
                }
                Either::Second(request) => request,
            }
        } else {
            requests.receive().await
        };

        match request {
            RadioRequest::StartScan => {
                info!("scan start");
                scanning = true;
            }
            RadioRequest::StopScan => {
                info!("scan stop");
                scanning = false;
            }
            RadioRequest::Connect { link, address } => {
                scanning = false;
                run_link(sd, link, &address, &requests, &events).await;
            }
            other => debug!("no link for {}", other),
        }
    }
}

/// Connect, then serve requests for `link` until it drops.
///
/// Always ends by posting either `LinkFailed` or `LinkDropped`.
async fn run_link(
    sd: &Softdevice,
    link: LinkId,
    address: &BleAddress,
    requests: &RequestReceiver,
    events: &EventSender,
) {
    info!("link {} connecting to {}", link, address);

    let peer = sd_address(address);
    let whitelist = [&peer];
    let conn_cfg = central::ConnectConfig {
        scan_config: central::ScanConfig {
            whitelist: Some(&whitelist),
            // 10 ms units. The state machine usually cancels first.
            timeout: ((config::CONNECT_TIMEOUT_MS + config::STATE_TICK_MS) / 10) as u16,
            ..Default::default()
        },
        conn_params: raw::ble_gap_conn_params_t {
            min_conn_interval: config::BLE_CONN_INTERVAL_MIN,
            max_conn_interval: config::BLE_CONN_INTERVAL_MAX,
            slave_latency: config::BLE_SLAVE_LATENCY,
            conn_sup_timeout: config::BLE_SUP_TIMEOUT,
        },
        ..Default::default()
    };

    let conn = match select(central::connect(sd, &conn_cfg), wait_disconnect(requests, link)).await {
        Either::First(Ok(conn)) => conn,
        Either::First(Err(e)) => {
            warn!("link {} connect failed: {}", link, e);
            events.send(RadioEvent::LinkFailed { link }).await;
            return;
        }
        Either::Second(()) => {
            info!("link {} connect cancelled", link);
            events.send(RadioEvent::LinkFailed { link }).await;
            return;
        }
    };
    events.send(RadioEvent::LinkEstablished { link }).await;

    let client = loop {
        match requests.receive().await {
            RadioRequest::Discover { link: l } if l == link => match snes_client::discover(&conn).await {
                Discovery::Found(client) => {
                    let handles = snes_client::handles(&client);
                    events.send(RadioEvent::DiscoveryComplete { link, handles }).await;
                    break client;
                }
                Discovery::NotFound => {
                    events.send(RadioEvent::ServiceNotFound { link }).await;
                }
                Discovery::Failed => {
                    warn!("link {} discovery failed", link);
                    let _ = conn.disconnect();
                    events.send(RadioEvent::LinkDropped { link }).await;
                    return;
                }
            },
            RadioRequest::Disconnect { link: l } if l == link => {
                let _ = conn.disconnect();
                events.send(RadioEvent::LinkDropped { link }).await;
                return;
            }
            other => debug!("link {} not discovered, ignoring {}", link, other),
        }
    };

    let mut subscribed = 0u8;
    let notifications = gatt_client::run(&conn, &client, |event| {
        let (kind, value) = snes_client::classify(event);
        if events.try_send(RadioEvent::Notification { link, kind, value }).is_err() {
            warn!("event queue full, {} notification dropped", kind);
        }
    });
    let served = serve_link(&conn, &client, link, requests, events, &mut subscribed);
    let _ = select(notifications, served).await;

    info!("link {} dropped", link);
    for kind in NotificationKind::ALL {
        if subscribed & kind.bit() != 0 {
            events.send(RadioEvent::Unsubscribed { link, kind }).await;
        }
    }
    events.send(RadioEvent::LinkDropped { link }).await;
}

async fn wait_disconnect(requests: &RequestReceiver, link: LinkId) {
    loop {
        match requests.receive().await {
            RadioRequest::Disconnect { link: l } if l == link => return,
            other => debug!("link {} connecting, ignoring {}", link, other),
        }
    }
}

/// Handle requests on an established link. Returns never; the caller
/// drops it once the link is gone.
async fn serve_link(
    conn: &Connection,
    client: &SnesClient,
    link: LinkId,
    requests: &RequestReceiver,
    events: &EventSender,
    subscribed: &mut u8,
) {
    loop {
        match requests.receive().await {
            RadioRequest::Subscribe { link: l, kind } if l == link => {
                match snes_client::set_notifications(client, kind, true).await {
                    Ok(()) => *subscribed |= kind.bit(),
                    Err(e) => {
                        warn!("link {} subscribe {} failed: {}", link, kind, e);
                        events.send(RadioEvent::Unsubscribed { link, kind }).await;
                    }
                }
            }
            RadioRequest::Unsubscribe { link: l, kind } if l == link => {
                if let Err(e) = snes_client::set_notifications(client, kind, false).await {
                    warn!("link {} unsubscribe {} failed: {}", link, kind, e);
                }
                *subscribed &= !kind.bit();
                events.send(RadioEvent::Unsubscribed { link, kind }).await;
            }
            RadioRequest::Write { link: l, payload } if l == link => {
                let result = client.cmd_write(&payload).await;
                if let Err(e) = &result {
                    warn!("link {} command write failed: {}", link, e);
                }
                events
                    .send(RadioEvent::WriteComplete { link, ok: result.is_ok() })
                    .await;
            }
            RadioRequest::Disconnect { link: l } if l == link => {
                info!("link {} disconnecting", link);
                if let Err(e) = conn.disconnect() {
                    // Already gone; gatt_client::run is about to return.
                    debug!("link {} disconnect: {}", link, e);
                }
            }
            other => debug!("link {} busy, ignoring {}", link, other),
        }
    }
}

/// Drives the connection state machine from UI intents, radio events and
/// a housekeeping tick.
pub async fn ble_task(
    registry: &'static HubRegistry,
    radio: ChannelRadio,
    intents: Receiver<'static, CriticalSectionRawMutex, Intent, INTENT_QUEUE>,
    radio_events: EventReceiver,
    ui_events: Sender<'static, CriticalSectionRawMutex, ConnectionEvent, UI_EVENT_QUEUE>,
) -> ! {
    let sink = move |event: ConnectionEvent| {
        if ui_events.try_send(event).is_err() {
            warn!("UI queue full, dropping {}", event);
        }
    };
    let mut manager = ConnectionManager::new(registry, radio, sink);
    let mut ticker = Ticker::every(Duration::from_millis(config::STATE_TICK_MS));

    loop {
        let result = match select3(intents.receive(), radio_events.receive(), ticker.next()).await {
            Either3::First(intent) => {
                info!("intent {} in {}", intent, manager.state());
                manager.handle_intent(intent)
            }
            Either3::Second(event) => {
                debug!("radio {} in {}", event, manager.state());
                manager.handle_radio_event(event, now_ms())
            }
            Either3::Third(()) => manager.tick(now_ms()),
        };

        if let Err(e) = result {
            warn!("connection: {} (now {})", e, manager.state());
        }
    }
}
