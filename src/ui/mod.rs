//! User interface subsystem - Nextion serial display + physical buttons.
//!
//! The UI task owns a [`menu::Menu`] that reacts to button presses and
//! connection events, and renders registry snapshots on the panel.
//!
//! ## Components
//!
//! - **Display**: Nextion HMI panel over UARTE (ASCII commands)
//! - **Buttons**: 4 tactile switches with debouncing (UP, DOWN, SELECT, TRIGGER)

pub mod input_logic;
pub mod menu;
pub mod nextion;

#[cfg(feature = "embedded")]
pub mod buttons;
#[cfg(feature = "embedded")]
pub mod display;

/// Screens (pages) of the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Page {
    /// Device list, three per page.
    Main,
    /// Connection in progress.
    Loading,
    /// Connected device with its actions.
    Device,
}

/// Physical button events (after debouncing).
///
///   - UP/DOWN: move the cursor
///   - SELECT:  connect (main page) or ask for confirmation (device page)
///   - TRIGGER: confirm the pending action
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ButtonEvent {
    Up,
    Down,
    Select,
    Trigger,
}

/// Entries of the device page, in screen order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceAction {
    Open,
    Reset,
    Toggle,
    Exit,
}

impl DeviceAction {
    pub const ALL: [DeviceAction; 4] = [
        DeviceAction::Open,
        DeviceAction::Reset,
        DeviceAction::Toggle,
        DeviceAction::Exit,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}
