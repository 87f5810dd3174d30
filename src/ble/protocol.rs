//! Speak No Evil Service (SNES) wire protocol.
//!
//! Commands are written to the CMD characteristic as
//! `[HEADER, opcode, args...]`; the four telemetry characteristics notify a
//! single byte each.

use crate::error::Error;
use heapless::Vec;

/// First byte of every command.
pub const HEADER: u8 = 0xA5;

pub const OP_OPEN_COLLAR: u8 = 0x01;
pub const OP_RESET_DEVICE: u8 = 0x02;
pub const OP_TOGGLE_RECORDING: u8 = 0x03;
pub const OP_SHUTDOWN: u8 = 0x04;
pub const OP_START: u8 = 0x05;
pub const OP_SEND_TIME: u8 = 0x06;
pub const OP_SET_DEVICE_ID: u8 = 0x07;
pub const OP_SET_MIC_GAIN: u8 = 0x08;

/// Accepted microphone input gain steps.
pub const MIC_GAIN_MIN: u8 = 1;
pub const MIC_GAIN_MAX: u8 = 5;

/// Largest encoded command: header, opcode and a 4-byte timestamp.
pub const MAX_COMMAND_LEN: usize = 8;

pub type CommandBuf = Vec<u8, MAX_COMMAND_LEN>;

/// Commands understood by a collar tracker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    /// Release the collar.
    Open,
    Reset,
    ToggleRecording,
    Shutdown,
    Start,
    /// Current time, seconds since the Unix epoch.
    SendTime(u32),
    SetDeviceId(u8),
    SetMicGain(u8),
}

impl Command {
    pub const fn opcode(&self) -> u8 {
        match self {
            Command::Open => OP_OPEN_COLLAR,
            Command::Reset => OP_RESET_DEVICE,
            Command::ToggleRecording => OP_TOGGLE_RECORDING,
            Command::Shutdown => OP_SHUTDOWN,
            Command::Start => OP_START,
            Command::SendTime(_) => OP_SEND_TIME,
            Command::SetDeviceId(_) => OP_SET_DEVICE_ID,
            Command::SetMicGain(_) => OP_SET_MIC_GAIN,
        }
    }

    /// Build the CMD characteristic payload.
    ///
    /// Arguments follow the header and opcode; the timestamp is little-endian.
    /// A mic gain outside `MIC_GAIN_MIN..=MIC_GAIN_MAX` is rejected.
    pub fn encode(&self) -> Result<CommandBuf, Error> {
        let mut buf = CommandBuf::new();
        // Capacity covers the longest command, pushes cannot fail.
        let _ = buf.extend_from_slice(&[HEADER, self.opcode()]);
        match *self {
            Command::SendTime(epoch) => {
                let _ = buf.extend_from_slice(&epoch.to_le_bytes());
            }
            Command::SetDeviceId(id) => {
                let _ = buf.push(id);
            }
            Command::SetMicGain(gain) => {
                if !(MIC_GAIN_MIN..=MIC_GAIN_MAX).contains(&gain) {
                    return Err(Error::InvalidArgument);
                }
                let _ = buf.push(gain);
            }
            _ => {}
        }
        Ok(buf)
    }
}

/// The four notifying characteristics.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotificationKind {
    Status,
    DaysRecorded,
    DeviceId,
    MicGain,
}

impl NotificationKind {
    pub const ALL: [NotificationKind; 4] = [
        NotificationKind::Status,
        NotificationKind::DaysRecorded,
        NotificationKind::DeviceId,
        NotificationKind::MicGain,
    ];

    /// Bit used in subscription masks.
    pub const fn bit(self) -> u8 {
        match self {
            NotificationKind::Status => 1 << 0,
            NotificationKind::DaysRecorded => 1 << 1,
            NotificationKind::DeviceId => 1 << 2,
            NotificationKind::MicGain => 1 << 3,
        }
    }
}

/// Attribute handles resolved by service discovery.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AttributeHandles {
    pub cmd: u16,
    pub status: u16,
    pub status_ccc: u16,
    pub days_recorded: u16,
    pub days_recorded_ccc: u16,
    pub device_id: u16,
    pub device_id_ccc: u16,
    pub mic_gain: u16,
    pub mic_gain_ccc: u16,
}

impl AttributeHandles {
    /// CCC handle of a notifying characteristic, 0 when absent.
    pub const fn ccc(&self, kind: NotificationKind) -> u16 {
        match kind {
            NotificationKind::Status => self.status_ccc,
            NotificationKind::DaysRecorded => self.days_recorded_ccc,
            NotificationKind::DeviceId => self.device_id_ccc,
            NotificationKind::MicGain => self.mic_gain_ccc,
        }
    }
}

/// Generation number naming one connection attempt.
///
/// Radio events carry the id of the link they belong to, so anything that
/// arrives after the link was replaced can be recognised and dropped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LinkId(pub u16);

impl LinkId {
    pub const fn next(self) -> Self {
        LinkId(self.0.wrapping_add(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_commands_are_two_bytes() {
        assert_eq!(Command::Open.encode().unwrap().as_slice(), &[0xA5, 0x01]);
        assert_eq!(Command::Reset.encode().unwrap().as_slice(), &[0xA5, 0x02]);
        assert_eq!(
            Command::ToggleRecording.encode().unwrap().as_slice(),
            &[0xA5, 0x03]
        );
        assert_eq!(Command::Shutdown.encode().unwrap().as_slice(), &[0xA5, 0x04]);
        assert_eq!(Command::Start.encode().unwrap().as_slice(), &[0xA5, 0x05]);
    }

    #[test]
    fn send_time_is_little_endian() {
        let buf = Command::SendTime(0x6543_2100).encode().unwrap();
        assert_eq!(buf.as_slice(), &[0xA5, 0x06, 0x00, 0x21, 0x43, 0x65]);
    }

    #[test]
    fn set_device_id_carries_one_byte() {
        let buf = Command::SetDeviceId(12).encode().unwrap();
        assert_eq!(buf.as_slice(), &[0xA5, 0x07, 12]);
    }

    #[test]
    fn mic_gain_range_is_checked() {
        assert_eq!(
            Command::SetMicGain(3).encode().unwrap().as_slice(),
            &[0xA5, 0x08, 3]
        );
        assert!(Command::SetMicGain(1).encode().is_ok());
        assert!(Command::SetMicGain(5).encode().is_ok());
        assert_eq!(Command::SetMicGain(0).encode(), Err(Error::InvalidArgument));
        assert_eq!(Command::SetMicGain(6).encode(), Err(Error::InvalidArgument));
    }

    #[test]
    fn notification_bits_are_distinct() {
        let mask = NotificationKind::ALL.iter().fold(0u8, |m, k| m | k.bit());
        assert_eq!(mask, 0x0F);
    }

    #[test]
    fn link_id_wraps() {
        assert_eq!(LinkId(u16::MAX).next(), LinkId(0));
    }
}
