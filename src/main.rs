//! snes-hub - handheld BLE hub for Speak No Evil collar trackers.
//!
//! Target: nRF52840 with SoftDevice S140 (Central role), Nextion panel on
//! UARTE0 and four push buttons.
//!
//! Task layout:
//!   - `softdevice_task` - SoftDevice event pump
//!   - `radio_task`      - scanning and the peer link
//!   - `ble_task`        - connection state machine
//!   - `sweep_task`      - drops devices that stopped advertising
//!   - `ui_task`         - menu and Nextion rendering
//!   - `button_task` ×4  - debounced GPIO buttons
//!   - `heartbeat_task`  - status LED

#![no_std]
#![no_main]

use defmt::{info, unwrap};
use defmt_rtt as _;
use embassy_executor::Spawner;
use embassy_nrf::gpio::{AnyPin, Level, Output, OutputDrive, Pin};
use embassy_nrf::interrupt::{self, InterruptExt, Priority};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::uarte::{self, UarteTx};
use embassy_nrf::{bind_interrupts, peripherals};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, Receiver, Sender};
use embassy_time::{Duration, Ticker};
use nrf_softdevice::{raw, Softdevice};
use panic_probe as _;
use snes_hub::ble::central::{
    self, ChannelRadio, EventReceiver, EventSender, RadioRequest, RequestReceiver, EVENT_QUEUE,
    INTENT_QUEUE, REQUEST_QUEUE, UI_EVENT_QUEUE,
};
use snes_hub::ble::connection::{ConnectionEvent, Intent};
use snes_hub::ble::radio::RadioEvent;
use snes_hub::ble::{scanner, HubRegistry};
use snes_hub::config::{DISPLAY_BAUD, HEARTBEAT_MS};
use snes_hub::ui::buttons::{self, BUTTON_QUEUE};
use snes_hub::ui::{display, ButtonEvent};
use static_cell::StaticCell;

bind_interrupts!(struct Irqs {
    UARTE0_UART0 => uarte::InterruptHandler<peripherals::UARTE0>;
});

type Mutex = CriticalSectionRawMutex;

static REQUESTS: Channel<Mutex, RadioRequest, REQUEST_QUEUE> = Channel::new();
static RADIO_EVENTS: Channel<Mutex, RadioEvent, EVENT_QUEUE> = Channel::new();
static INTENTS: Channel<Mutex, Intent, INTENT_QUEUE> = Channel::new();
static UI_EVENTS: Channel<Mutex, ConnectionEvent, UI_EVENT_QUEUE> = Channel::new();
static BUTTONS: Channel<Mutex, ButtonEvent, BUTTON_QUEUE> = Channel::new();

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    info!("snes-hub starting");

    // SoftDevice reserves priorities 0, 1 and 4.
    let mut nrf_config = embassy_nrf::config::Config::default();
    nrf_config.gpiote_interrupt_priority = Priority::P2;
    nrf_config.time_interrupt_priority = Priority::P2;
    let p = embassy_nrf::init(nrf_config);
    interrupt::UARTE0_UART0.set_priority(Priority::P3);

    let sd_config = nrf_softdevice::Config {
        clock: Some(raw::nrf_clock_lf_cfg_t {
            source: raw::NRF_CLOCK_LF_SRC_RC as u8,
            rc_ctiv: 16,
            rc_temp_ctiv: 2,
            accuracy: raw::NRF_CLOCK_LF_ACCURACY_500_PPM as u8,
        }),
        conn_gap: Some(raw::ble_gap_conn_cfg_t {
            conn_count: 1,
            event_length: 24,
        }),
        conn_gatt: Some(raw::ble_gatt_conn_cfg_t { att_mtu: 23 }),
        gap_role_count: Some(raw::ble_gap_cfg_role_count_t {
            adv_set_count: 0,
            periph_role_count: 0,
            central_role_count: 1,
            central_sec_count: 0,
            _bitfield_1: raw::ble_gap_cfg_role_count_t::new_bitfield_1(0),
        }),
        ..Default::default()
    };
    let sd = Softdevice::enable(&sd_config);
    unwrap!(spawner.spawn(softdevice_task(sd)));

    let mut uart_config = uarte::Config::default();
    uart_config.parity = uarte::Parity::EXCLUDED;
    uart_config.baudrate = match DISPLAY_BAUD {
        9_600 => uarte::Baudrate::BAUD9600,
        _ => uarte::Baudrate::BAUD115200,
    };
    let display_tx = UarteTx::new(p.UARTE0, Irqs, p.P0_06, uart_config);

    static REGISTRY: StaticCell<HubRegistry> = StaticCell::new();
    let registry: &'static HubRegistry = REGISTRY.init(HubRegistry::new());

    unwrap!(spawner.spawn(radio_task(
        sd,
        registry,
        REQUESTS.receiver(),
        RADIO_EVENTS.sender()
    )));
    unwrap!(spawner.spawn(ble_task(
        registry,
        ChannelRadio::new(REQUESTS.sender()),
        INTENTS.receiver(),
        RADIO_EVENTS.receiver(),
        UI_EVENTS.sender(),
    )));
    unwrap!(spawner.spawn(sweep_task(registry)));
    unwrap!(spawner.spawn(ui_task(
        registry,
        display_tx,
        BUTTONS.receiver(),
        UI_EVENTS.receiver(),
        INTENTS.sender(),
    )));

    unwrap!(spawner.spawn(button_task(p.P0_11.degrade(), ButtonEvent::Up, BUTTONS.sender())));
    unwrap!(spawner.spawn(button_task(p.P0_12.degrade(), ButtonEvent::Down, BUTTONS.sender())));
    unwrap!(spawner.spawn(button_task(p.P0_24.degrade(), ButtonEvent::Select, BUTTONS.sender())));
    unwrap!(spawner.spawn(button_task(p.P0_25.degrade(), ButtonEvent::Trigger, BUTTONS.sender())));

    unwrap!(spawner.spawn(heartbeat_task(p.P0_13.degrade())));

    info!("all tasks running");
}

#[embassy_executor::task]
async fn softdevice_task(sd: &'static Softdevice) -> ! {
    sd.run().await
}

#[embassy_executor::task]
async fn radio_task(
    sd: &'static Softdevice,
    registry: &'static HubRegistry,
    requests: RequestReceiver,
    events: EventSender,
) -> ! {
    central::radio_task(sd, registry, requests, events).await
}

#[embassy_executor::task]
async fn ble_task(
    registry: &'static HubRegistry,
    radio: ChannelRadio,
    intents: Receiver<'static, Mutex, Intent, INTENT_QUEUE>,
    radio_events: EventReceiver,
    ui_events: Sender<'static, Mutex, ConnectionEvent, UI_EVENT_QUEUE>,
) -> ! {
    central::ble_task(registry, radio, intents, radio_events, ui_events).await
}

#[embassy_executor::task]
async fn sweep_task(registry: &'static HubRegistry) -> ! {
    scanner::sweep_task(registry).await
}

#[embassy_executor::task]
async fn ui_task(
    registry: &'static HubRegistry,
    tx: UarteTx<'static, UARTE0>,
    buttons: Receiver<'static, Mutex, ButtonEvent, BUTTON_QUEUE>,
    conn_events: Receiver<'static, Mutex, ConnectionEvent, UI_EVENT_QUEUE>,
    intents: Sender<'static, Mutex, Intent, INTENT_QUEUE>,
) -> ! {
    display::ui_task(registry, tx, buttons, conn_events, intents).await
}

#[embassy_executor::task(pool_size = 4)]
async fn button_task(
    pin: AnyPin,
    event: ButtonEvent,
    tx: Sender<'static, Mutex, ButtonEvent, BUTTON_QUEUE>,
) -> ! {
    buttons::button_task(pin, event, tx).await
}

/// Blinks the status LED (active low) while the executor is alive.
#[embassy_executor::task]
async fn heartbeat_task(pin: AnyPin) -> ! {
    let mut led = Output::new(pin, Level::High, OutputDrive::Standard);
    let mut ticker = Ticker::every(Duration::from_millis(HEARTBEAT_MS));
    loop {
        ticker.next().await;
        led.toggle();
    }
}
