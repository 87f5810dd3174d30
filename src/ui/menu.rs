//! Menu controller: cursor, pagination, confirmation popup and page flow.
//!
//! The menu is plain state owned by the UI task. Button handlers return the
//! [`Intent`] to forward to the connection state machine, if any; rendering
//! only sends what changed since the previous frame, except for the device
//! rows which are refreshed every frame.

use crate::ble::connection::{ConnectionEvent, Intent};
use crate::ble::device::DeviceRecord;
use crate::ble::protocol::Command;
use crate::config::{DEVICES_PER_PAGE, POPUP_TIMEOUT_MS};
use crate::error::Error;
use crate::ui::input_logic::{clamp, scroll_down, scroll_up, select_next, select_prev};
use crate::ui::nextion::{Nextion, SerialSink};
use crate::ui::{DeviceAction, Page};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Popup {
    action: DeviceAction,
    opened_at: u64,
}

/// What the panel currently shows.
#[derive(Default)]
struct Drawn {
    page: Option<Page>,
    action: Option<DeviceAction>,
    /// Outer `None` until the popup state was sent once.
    popup: Option<Option<DeviceAction>>,
    device: Option<DeviceRecord>,
}

pub struct Menu {
    page: Page,
    selected: usize,
    offset: usize,
    popup: Option<Popup>,
    device: Option<DeviceRecord>,
    drawn: Drawn,
}

impl Menu {
    pub fn new() -> Self {
        Self {
            page: Page::Main,
            selected: 0,
            offset: 0,
            popup: None,
            device: None,
            drawn: Drawn::default(),
        }
    }

    pub fn page(&self) -> Page {
        self.page
    }

    /// Cursor row (main page) or action index (device page).
    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Registry index of the first row on screen.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Registry index under the cursor on the main page.
    pub fn selected_index(&self) -> usize {
        self.offset + self.selected
    }

    /// Device shown on the loading or device page.
    pub fn device(&self) -> Option<DeviceRecord> {
        self.device
    }

    pub fn popup(&self) -> Option<DeviceAction> {
        self.popup.map(|p| p.action)
    }

    pub fn on_up(&mut self) {
        match self.page {
            Page::Main => (self.selected, self.offset) = scroll_up(self.selected, self.offset),
            Page::Device if self.popup.is_none() => self.selected = select_prev(self.selected),
            _ => {}
        }
    }

    pub fn on_down(&mut self, device_count: usize) {
        match self.page {
            Page::Main => {
                (self.selected, self.offset) =
                    scroll_down(self.selected, self.offset, device_count, DEVICES_PER_PAGE)
            }
            Page::Device if self.popup.is_none() => {
                self.selected = select_next(self.selected, DeviceAction::ALL.len())
            }
            _ => {}
        }
    }

    /// Main page: connect to `target` (the record at [`Self::selected_index`]).
    /// Device page: open the confirmation popup for the highlighted action.
    pub fn on_select(&mut self, target: Option<DeviceRecord>, now: u64) -> Option<Intent> {
        match self.page {
            Page::Main => {
                let device = target?;
                self.page = Page::Loading;
                self.device = Some(device);
                Some(Intent::Connect(device))
            }
            Page::Device => {
                let action = DeviceAction::from_index(self.selected)?;
                self.popup = Some(Popup {
                    action,
                    opened_at: now,
                });
                None
            }
            Page::Loading => None,
        }
    }

    /// Confirm the popup action. Does nothing without an open popup.
    pub fn on_trigger(&mut self) -> Option<Intent> {
        if self.page != Page::Device {
            return None;
        }
        let popup = self.popup.take()?;
        match popup.action {
            DeviceAction::Open => Some(Intent::Send(Command::Open)),
            DeviceAction::Reset => Some(Intent::Send(Command::Reset)),
            DeviceAction::Toggle => Some(Intent::Send(Command::ToggleRecording)),
            DeviceAction::Exit => {
                self.go_main();
                Some(Intent::Disconnect)
            }
        }
    }

    /// Close an expired popup and keep the cursor inside the list.
    pub fn tick(&mut self, now: u64, device_count: usize) {
        if let Some(popup) = self.popup {
            if now.saturating_sub(popup.opened_at) >= POPUP_TIMEOUT_MS {
                self.popup = None;
            }
        }
        if self.page == Page::Main {
            (self.selected, self.offset) =
                clamp(self.selected, self.offset, device_count, DEVICES_PER_PAGE);
        }
    }

    pub fn on_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected(device) => {
                self.page = Page::Device;
                self.selected = 0;
                self.popup = None;
                self.device = Some(device);
            }
            ConnectionEvent::InfosUpdated(device) => {
                if self.page == Page::Device {
                    self.device = Some(device);
                }
            }
            ConnectionEvent::ConnectionFailed | ConnectionEvent::Disconnected => self.go_main(),
        }
    }

    fn go_main(&mut self) {
        self.page = Page::Main;
        self.selected = 0;
        self.offset = 0;
        self.popup = None;
        self.device = None;
    }

    /// Forget what is on the panel so the next frame redraws everything.
    pub fn invalidate(&mut self) {
        self.drawn = Drawn::default();
    }

    /// Draw one frame.
    ///
    /// `window` holds the registry records from [`Self::offset`] onwards and
    /// `device_count` the registry size, both read just before the call.
    pub fn render<S: SerialSink>(
        &mut self,
        window: &[Option<DeviceRecord>; DEVICES_PER_PAGE],
        device_count: usize,
        panel: &mut Nextion<S>,
    ) -> Result<(), Error> {
        if self.drawn.page != Some(self.page) {
            panel.page(self.page)?;
            self.drawn = Drawn {
                page: Some(self.page),
                ..Drawn::default()
            };
        }

        match self.page {
            Page::Main => {
                for (slot, record) in window.iter().enumerate() {
                    match record {
                        Some(device) => panel.show_slot(slot, device, slot == self.selected)?,
                        None => panel.hide_slot(slot)?,
                    }
                }
                panel.set_more(device_count > self.offset + DEVICES_PER_PAGE)?;
            }
            Page::Loading => {
                if self.drawn.device != self.device {
                    if let Some(device) = self.device {
                        panel.show_loading(device.id)?;
                    }
                    self.drawn.device = self.device;
                }
            }
            Page::Device => {
                if self.drawn.device != self.device {
                    if let Some(device) = &self.device {
                        panel.show_device(device)?;
                    }
                    self.drawn.device = self.device;
                }
                let action = DeviceAction::from_index(self.selected);
                if self.drawn.action != action {
                    if let Some(action) = action {
                        panel.highlight_action(action)?;
                    }
                    self.drawn.action = action;
                }
                let popup = self.popup();
                if self.drawn.popup != Some(popup) {
                    panel.set_popup(popup)?;
                    self.drawn.popup = Some(popup);
                }
            }
        }
        Ok(())
    }
}

impl Default for Menu {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Unit Tests (run on host, not embedded)
// ═══════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ble::device::{AddressKind, BleAddress, DeviceStatus};
    use crate::ui::nextion::tests::Capture;

    fn rec(id: u32) -> DeviceRecord {
        DeviceRecord {
            id,
            rssi: -50,
            days_recorded: 1,
            status: DeviceStatus::Idle,
            address: BleAddress::new(AddressKind::RandomStatic, [id as u8, 0, 0, 0, 0, 0xC0]),
            last_seen: 0,
        }
    }

    fn on_device_page() -> Menu {
        let mut menu = Menu::new();
        assert!(menu.on_select(Some(rec(1)), 0).is_some());
        menu.on_connection_event(ConnectionEvent::Connected(rec(1)));
        menu
    }

    #[test]
    fn starts_on_main_page() {
        let menu = Menu::new();
        assert_eq!(menu.page(), Page::Main);
        assert_eq!(menu.selected_index(), 0);
    }

    #[test]
    fn down_pages_through_long_list() {
        let mut menu = Menu::new();
        for _ in 0..4 {
            menu.on_down(5);
        }
        assert_eq!((menu.selected(), menu.offset()), (2, 2));
        assert_eq!(menu.selected_index(), 4);
        menu.on_down(5);
        assert_eq!(menu.selected_index(), 4);

        for _ in 0..2 {
            menu.on_up();
        }
        assert_eq!((menu.selected(), menu.offset()), (0, 2));
        menu.on_up();
        assert_eq!((menu.selected(), menu.offset()), (0, 1));
    }

    #[test]
    fn select_on_main_connects_to_row_under_cursor() {
        let mut menu = Menu::new();
        menu.on_down(5);
        let intent = menu.on_select(Some(rec(7)), 0);
        assert_eq!(intent, Some(Intent::Connect(rec(7))));
        assert_eq!(menu.page(), Page::Loading);
        assert_eq!(menu.device(), Some(rec(7)));
    }

    #[test]
    fn select_on_empty_row_does_nothing() {
        let mut menu = Menu::new();
        assert_eq!(menu.on_select(None, 0), None);
        assert_eq!(menu.page(), Page::Main);
    }

    #[test]
    fn connection_failure_returns_to_main() {
        let mut menu = Menu::new();
        menu.on_select(Some(rec(1)), 0);
        menu.on_connection_event(ConnectionEvent::ConnectionFailed);
        assert_eq!(menu.page(), Page::Main);
        assert_eq!(menu.device(), None);
    }

    #[test]
    fn trigger_without_popup_is_ignored() {
        let mut menu = on_device_page();
        assert_eq!(menu.on_trigger(), None);
        assert_eq!(menu.page(), Page::Device);
    }

    #[test]
    fn popup_confirms_highlighted_action() {
        let mut menu = on_device_page();
        menu.on_down(0);
        menu.on_down(0);
        assert_eq!(menu.selected(), 2);
        assert_eq!(menu.on_select(None, 100), None);
        assert_eq!(menu.popup(), Some(DeviceAction::Toggle));

        // Navigation is frozen while the popup is open.
        menu.on_up();
        assert_eq!(menu.selected(), 2);

        assert_eq!(
            menu.on_trigger(),
            Some(Intent::Send(Command::ToggleRecording))
        );
        assert_eq!(menu.popup(), None);
        assert_eq!(menu.page(), Page::Device);
    }

    #[test]
    fn exit_disconnects_and_returns_to_main() {
        let mut menu = on_device_page();
        for _ in 0..5 {
            menu.on_down(0);
        }
        assert_eq!(menu.selected(), 3);
        menu.on_select(None, 0);
        assert_eq!(menu.on_trigger(), Some(Intent::Disconnect));
        assert_eq!(menu.page(), Page::Main);
        assert_eq!(menu.selected(), 0);
    }

    #[test]
    fn popup_times_out() {
        let mut menu = on_device_page();
        menu.on_select(None, 1_000);
        menu.tick(3_999, 0);
        assert!(menu.popup().is_some());
        menu.tick(4_000, 0);
        assert!(menu.popup().is_none());
        assert_eq!(menu.on_trigger(), None);
    }

    #[test]
    fn shrinking_list_clamps_cursor() {
        let mut menu = Menu::new();
        for _ in 0..4 {
            menu.on_down(6);
        }
        assert_eq!(menu.selected_index(), 4);
        menu.tick(0, 2);
        assert_eq!((menu.selected(), menu.offset()), (1, 0));
    }

    #[test]
    fn disconnect_event_resets_device_page() {
        let mut menu = on_device_page();
        menu.on_select(None, 0);
        menu.on_connection_event(ConnectionEvent::Disconnected);
        assert_eq!(menu.page(), Page::Main);
        assert_eq!(menu.popup(), None);
    }

    #[test]
    fn render_main_page() {
        let mut menu = Menu::new();
        let mut panel = Nextion::new(Capture::default());
        menu.on_down(4);

        let window = [Some(rec(10)), Some(rec(11)), Some(rec(12))];
        menu.render(&window, 4, &mut panel).unwrap();
        let cap = panel.serial();
        assert_eq!(cap.lines[0].as_str(), "page main");
        assert!(cap.contains("m1_pic.pic=2"));
        assert!(cap.contains("m2_pic.pic=3"));
        assert!(cap.contains("m3_title.txt=\"Device 12\""));
        assert!(cap.contains("vis more,1"));

        // Page command is not repeated on the next frame.
        panel.serial_mut().lines.clear();
        let window = [Some(rec(10)), None, None];
        menu.render(&window, 1, &mut panel).unwrap();
        let cap = panel.serial();
        assert!(!cap.contains("page main"));
        assert!(cap.contains("vis m2_pic,0"));
        assert!(cap.contains("vis m3_pic,0"));
        assert!(cap.contains("vis more,0"));
    }

    #[test]
    fn render_device_page_only_sends_changes() {
        let mut menu = on_device_page();
        let mut panel = Nextion::new(Capture::default());
        let empty = [None; DEVICES_PER_PAGE];

        menu.render(&empty, 0, &mut panel).unwrap();
        let cap = panel.serial();
        assert_eq!(cap.lines[0].as_str(), "page device");
        assert!(cap.contains("dev_title.txt=\"Device 1\""));
        assert!(cap.contains("b_open.bco=54938"));
        assert!(cap.contains("vis popup,0"));

        panel.serial_mut().lines.clear();
        menu.render(&empty, 0, &mut panel).unwrap();
        assert!(panel.serial().lines.is_empty());

        menu.on_select(None, 0);
        menu.render(&empty, 0, &mut panel).unwrap();
        assert!(panel.serial().contains("vis popup,1"));
        assert!(!panel.serial().contains("b_open.bco=54938"));
    }

    #[test]
    fn render_loading_page() {
        let mut menu = Menu::new();
        let mut panel = Nextion::new(Capture::default());
        menu.on_select(Some(rec(5)), 0);
        menu.render(&[None; DEVICES_PER_PAGE], 0, &mut panel).unwrap();
        let cap = panel.serial();
        assert_eq!(cap.lines[0].as_str(), "page loading");
        assert!(cap.contains("load_title.txt=\"Device 5\""));
    }
}
