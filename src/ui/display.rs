//! Nextion panel task.
//!
//! The menu renders into a [`FrameBuffer`]; each refresh tick the buffer is
//! sent in one UARTE DMA transfer. Button presses and connection events
//! update the menu in between.

use crate::ble::central::{INTENT_QUEUE, UI_EVENT_QUEUE};
use crate::ble::connection::{ConnectionEvent, Intent};
use crate::ble::{now_ms, HubRegistry};
use crate::config::{DEVICES_PER_PAGE, DISPLAY_REFRESH_MS, FRAME_BUFFER_LEN};
use crate::error::Error;
use crate::ui::buttons::BUTTON_QUEUE;
use crate::ui::menu::Menu;
use crate::ui::nextion::{FrameBuffer, Nextion};
use crate::ui::ButtonEvent;
use defmt::{debug, warn};
use embassy_futures::select::{select3, Either3};
use embassy_nrf::peripherals::UARTE0;
use embassy_nrf::uarte::UarteTx;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Receiver, Sender};
use embassy_time::{Duration, Ticker};

pub type Panel = Nextion<FrameBuffer<FRAME_BUFFER_LEN>>;

pub async fn ui_task(
    registry: &'static HubRegistry,
    mut tx: UarteTx<'static, UARTE0>,
    buttons: Receiver<'static, CriticalSectionRawMutex, ButtonEvent, BUTTON_QUEUE>,
    conn_events: Receiver<'static, CriticalSectionRawMutex, ConnectionEvent, UI_EVENT_QUEUE>,
    intents: Sender<'static, CriticalSectionRawMutex, Intent, INTENT_QUEUE>,
) -> ! {
    let mut menu = Menu::new();
    let mut panel = Panel::new(FrameBuffer::new());
    let mut ticker = Ticker::every(Duration::from_millis(DISPLAY_REFRESH_MS));

    loop {
        match select3(buttons.receive(), conn_events.receive(), ticker.next()).await {
            Either3::First(button) => {
                let intent = match button {
                    ButtonEvent::Up => {
                        menu.on_up();
                        None
                    }
                    ButtonEvent::Down => {
                        menu.on_down(registry.count());
                        None
                    }
                    ButtonEvent::Select => {
                        let target = registry.get_at(menu.selected_index());
                        menu.on_select(target, now_ms())
                    }
                    ButtonEvent::Trigger => menu.on_trigger(),
                };
                if let Some(intent) = intent {
                    if intents.try_send(intent).is_err() {
                        warn!("intent queue full, {} dropped", intent);
                    }
                }
            }
            Either3::Second(event) => {
                debug!("ui: {}", event);
                menu.on_connection_event(event);
            }
            Either3::Third(()) => {
                let count = registry.count();
                menu.tick(now_ms(), count);
                let window = registry
                    .get_window::<DEVICES_PER_PAGE>(menu.offset())
                    .unwrap_or([None; DEVICES_PER_PAGE]);

                if let Err(e) = menu.render(&window, count, &mut panel) {
                    warn!("render: {}", e);
                    menu.invalidate();
                }
                if flush(&mut tx, &mut panel).await.is_err() {
                    menu.invalidate();
                }
            }
        }
    }
}

async fn flush(tx: &mut UarteTx<'static, UARTE0>, panel: &mut Panel) -> Result<(), Error> {
    if panel.serial().is_empty() {
        return Ok(());
    }
    let result = tx.write(panel.serial().as_bytes()).await;
    panel.serial_mut().clear();
    result.map_err(|e| {
        warn!("display write: {}", e);
        Error::Display
    })
}
