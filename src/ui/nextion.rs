//! Nextion HMI command encoder.
//!
//! Every instruction is plain ASCII (`widget.property=value`, `page name`,
//! `vis widget,n`) followed by three `0xFF` bytes.

use core::fmt::{self, Write};

use crate::ble::device::DeviceRecord;
use crate::error::Error;
use crate::ui::{DeviceAction, Page};
use heapless::String;

/// Instruction terminator.
pub const TERMINATOR: [u8; 3] = [0xFF, 0xFF, 0xFF];

/// Background of the highlighted row / action.
pub const COLOR_SELECTED: u16 = 54938;
/// Background of everything else.
pub const COLOR_NORMAL: u16 = 65535;

/// Slot picture ids.
pub const PIC_SELECTED: u8 = 3;
pub const PIC_NORMAL: u8 = 2;

/// Widgets of one device row, after the `m{n}_` prefix.
const SLOT_FIELDS: [&str; 7] = ["title", "rssi", "rssi_val", "DS", "DS_val", "DR", "DR_val"];

/// Byte sink the panel is wired to.
pub trait SerialSink {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error>;
}

/// Accumulates one frame of instructions so it can go out in a single
/// DMA transfer.
pub struct FrameBuffer<const N: usize> {
    bytes: heapless::Vec<u8, N>,
}

impl<const N: usize> FrameBuffer<N> {
    pub const fn new() -> Self {
        Self {
            bytes: heapless::Vec::new(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn clear(&mut self) {
        self.bytes.clear();
    }
}

impl<const N: usize> Default for FrameBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SerialSink for FrameBuffer<N> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
        self.bytes.extend_from_slice(bytes).map_err(|_| Error::Display)
    }
}

pub struct Nextion<S: SerialSink> {
    serial: S,
}

impl<S: SerialSink> Nextion<S> {
    pub fn new(serial: S) -> Self {
        Self { serial }
    }

    pub fn serial(&self) -> &S {
        &self.serial
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }

    /// Format and send one instruction.
    pub fn command(&mut self, args: fmt::Arguments<'_>) -> Result<(), Error> {
        let mut line: String<64> = String::new();
        line.write_fmt(args).map_err(|_| Error::Display)?;
        self.serial.write(line.as_bytes())?;
        self.serial.write(&TERMINATOR)
    }

    pub fn page(&mut self, page: Page) -> Result<(), Error> {
        let name = match page {
            Page::Main => "main",
            Page::Loading => "loading",
            Page::Device => "device",
        };
        self.command(format_args!("page {}", name))
    }

    /// Fill and show device row `slot` (0-based, widgets `m1_*`..`m3_*`).
    pub fn show_slot(&mut self, slot: usize, device: &DeviceRecord, selected: bool) -> Result<(), Error> {
        let n = slot + 1;
        let (pic, color) = if selected {
            (PIC_SELECTED, COLOR_SELECTED)
        } else {
            (PIC_NORMAL, COLOR_NORMAL)
        };

        self.command(format_args!("m{}_pic.pic={}", n, pic))?;
        for field in SLOT_FIELDS {
            self.command(format_args!("m{}_{}.bco={}", n, field, color))?;
        }
        self.command(format_args!("m{}_title.txt=\"Device {}\"", n, device.id))?;
        self.command(format_args!("m{}_rssi_val.txt=\"{}\"", n, device.rssi))?;
        self.command(format_args!("m{}_DR_val.txt=\"{}\"", n, device.days_recorded))?;
        self.command(format_args!("m{}_DS_val.txt=\"{}\"", n, device.status.label()))?;
        self.set_slot_visible(n, true)
    }

    pub fn hide_slot(&mut self, slot: usize) -> Result<(), Error> {
        self.set_slot_visible(slot + 1, false)
    }

    fn set_slot_visible(&mut self, n: usize, visible: bool) -> Result<(), Error> {
        let v = u8::from(visible);
        self.command(format_args!("vis m{}_pic,{}", n, v))?;
        for field in SLOT_FIELDS {
            self.command(format_args!("vis m{}_{},{}", n, field, v))?;
        }
        Ok(())
    }

    /// "More devices below" marker.
    pub fn set_more(&mut self, visible: bool) -> Result<(), Error> {
        self.command(format_args!("vis more,{}", u8::from(visible)))
    }

    pub fn show_loading(&mut self, device_id: u32) -> Result<(), Error> {
        self.command(format_args!("load_title.txt=\"Device {}\"", device_id))
    }

    pub fn show_device(&mut self, device: &DeviceRecord) -> Result<(), Error> {
        self.command(format_args!("dev_title.txt=\"Device {}\"", device.id))?;
        self.command(format_args!("dev_rssi_val.txt=\"{}\"", device.rssi))?;
        self.command(format_args!("dev_DR_val.txt=\"{}\"", device.days_recorded))?;
        self.command(format_args!("dev_DS_val.txt=\"{}\"", device.status.label()))
    }

    /// Highlight `selected` among the device page actions.
    pub fn highlight_action(&mut self, selected: DeviceAction) -> Result<(), Error> {
        for action in DeviceAction::ALL {
            let color = if action == selected {
                COLOR_SELECTED
            } else {
                COLOR_NORMAL
            };
            self.command(format_args!("{}.bco={}", action_widget(action), color))?;
        }
        Ok(())
    }

    /// Show the confirmation popup for `action`, or hide it.
    pub fn set_popup(&mut self, action: Option<DeviceAction>) -> Result<(), Error> {
        match action {
            Some(action) => {
                self.command(format_args!("popup_txt.txt=\"{}\"", action_prompt(action)))?;
                self.command(format_args!("vis popup,1"))
            }
            None => self.command(format_args!("vis popup,0")),
        }
    }
}

fn action_widget(action: DeviceAction) -> &'static str {
    match action {
        DeviceAction::Open => "b_open",
        DeviceAction::Reset => "b_reset",
        DeviceAction::Toggle => "b_toggle",
        DeviceAction::Exit => "b_exit",
    }
}

fn action_prompt(action: DeviceAction) -> &'static str {
    match action {
        DeviceAction::Open => "Open collar?",
        DeviceAction::Reset => "Reset device?",
        DeviceAction::Toggle => "Toggle recording?",
        DeviceAction::Exit => "Disconnect?",
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ble::device::{AddressKind, BleAddress, DeviceStatus};
    use heapless::Vec;

    /// Collects the instructions sent to the panel, one per entry.
    #[derive(Default)]
    pub(crate) struct Capture {
        pub lines: Vec<String<64>, 128>,
        partial: String<64>,
    }

    impl Capture {
        pub fn contains(&self, line: &str) -> bool {
            self.lines.iter().any(|l| l.as_str() == line)
        }
    }

    impl SerialSink for Capture {
        fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
            if bytes == TERMINATOR {
                let line = core::mem::take(&mut self.partial);
                self.lines.push(line).map_err(|_| Error::Display)?;
            } else {
                let text = core::str::from_utf8(bytes).map_err(|_| Error::Display)?;
                self.partial.push_str(text).map_err(|_| Error::Display)?;
            }
            Ok(())
        }
    }

    fn device() -> DeviceRecord {
        DeviceRecord {
            id: 42,
            rssi: -61,
            days_recorded: 3,
            status: DeviceStatus::Recording,
            address: BleAddress::new(AddressKind::Public, [1, 2, 3, 4, 5, 6]),
            last_seen: 0,
        }
    }

    #[test]
    fn instructions_are_terminated() {
        let mut raw: Vec<u8, 32> = Vec::new();
        struct Raw<'a>(&'a mut Vec<u8, 32>);
        impl SerialSink for Raw<'_> {
            fn write(&mut self, bytes: &[u8]) -> Result<(), Error> {
                self.0.extend_from_slice(bytes).map_err(|_| Error::Display)
            }
        }
        let mut panel = Nextion::new(Raw(&mut raw));
        panel.page(Page::Main).unwrap();
        assert_eq!(raw.as_slice(), b"page main\xFF\xFF\xFF");
    }

    #[test]
    fn selected_slot() {
        let mut panel = Nextion::new(Capture::default());
        panel.show_slot(0, &device(), true).unwrap();
        let cap = panel.serial();
        assert!(cap.contains("m1_pic.pic=3"));
        assert!(cap.contains("m1_title.bco=54938"));
        assert!(cap.contains("m1_DR_val.bco=54938"));
        assert!(cap.contains("m1_title.txt=\"Device 42\""));
        assert!(cap.contains("m1_rssi_val.txt=\"-61\""));
        assert!(cap.contains("m1_DR_val.txt=\"3\""));
        assert!(cap.contains("m1_DS_val.txt=\"Recording\""));
        assert!(cap.contains("vis m1_pic,1"));
        assert!(cap.contains("vis m1_DS_val,1"));
    }

    #[test]
    fn normal_slot_and_hide() {
        let mut panel = Nextion::new(Capture::default());
        panel.show_slot(2, &device(), false).unwrap();
        panel.hide_slot(1).unwrap();
        let cap = panel.serial();
        assert!(cap.contains("m3_pic.pic=2"));
        assert!(cap.contains("m3_rssi.bco=65535"));
        assert!(cap.contains("vis m2_pic,0"));
        assert!(cap.contains("vis m2_DR_val,0"));
    }

    #[test]
    fn popup_and_actions() {
        let mut panel = Nextion::new(Capture::default());
        panel.highlight_action(DeviceAction::Toggle).unwrap();
        panel.set_popup(Some(DeviceAction::Toggle)).unwrap();
        panel.set_popup(None).unwrap();
        let cap = panel.serial();
        assert!(cap.contains("b_toggle.bco=54938"));
        assert!(cap.contains("b_open.bco=65535"));
        assert!(cap.contains("popup_txt.txt=\"Toggle recording?\""));
        assert!(cap.contains("vis popup,1"));
        assert_eq!(cap.lines.last().unwrap().as_str(), "vis popup,0");
    }

    #[test]
    fn frame_buffer_overflow_is_a_display_error() {
        let mut panel = Nextion::new(FrameBuffer::<16>::new());
        panel.page(Page::Main).unwrap();
        assert_eq!(panel.serial().as_bytes().len(), 12);
        assert_eq!(panel.page(Page::Loading), Err(Error::Display));

        panel.serial_mut().clear();
        assert!(panel.serial().is_empty());
    }

    #[test]
    fn more_marker() {
        let mut panel = Nextion::new(Capture::default());
        panel.set_more(true).unwrap();
        panel.set_more(false).unwrap();
        assert_eq!(panel.serial().lines[0].as_str(), "vis more,1");
        assert_eq!(panel.serial().lines[1].as_str(), "vis more,0");
    }
}
