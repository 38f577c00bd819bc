//! Channel table holding the current control vector
//!
//! The blimp firmware expects one fixed-length frame per tick: a 4-byte mode
//! token followed by eight big-endian signed 16-bit channel values. This
//! module owns that table and its serialization. Updates for channels the
//! frame does not know about are dropped silently, so stale key bindings can
//! never crash the publisher.

use tracing::debug;

/// Channel index carrying the 4-byte control-mode token
pub const MODE_CHANNEL: u8 = 0;

/// Channel index carrying the flight-mode selector
pub const FLIGHT_MODE_CHANNEL: u8 = 5;

/// Number of signed 16-bit axis channels following the mode token
pub const AXIS_CHANNEL_COUNT: usize = 8;

/// Serialized frame length: mode token plus eight big-endian i16 values
pub const FRAME_LEN: usize = 4 + AXIS_CHANNEL_COUNT * 2;

/// Mode token selecting direct manual control
pub const MODE_TOKEN_MANUAL: [u8; 4] = *b"JJBM";

/// Mode token selecting reverse-kinematics control (startup default)
pub const MODE_TOKEN_REVERSE_KINEMATICS: [u8; 4] = *b"JJBA";

/// Neutral value for axis channels
pub const NEUTRAL: i16 = 0;

/// Value stored in one channel slot
///
/// Channel 0 holds a 4-byte token, channels 1..=8 hold i16 axis values. The
/// two widths are distinct variants so an update can never write a token into
/// an axis slot or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelValue {
    Mode([u8; 4]),
    Axis(i16),
}

/// Current control vector, serialized once per publish tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlState {
    // Channel 0
    mode: [u8; 4],

    // Channels 1..=8, stored in index order
    axes: [i16; AXIS_CHANNEL_COUNT],
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            mode: MODE_TOKEN_REVERSE_KINEMATICS,
            axes: [NEUTRAL; AXIS_CHANNEL_COUNT],
        }
    }
}

impl ControlState {
    /// Replaces the value of one channel
    ///
    /// Unknown channel indices and width mismatches (a token aimed at an axis
    /// slot, or an axis value aimed at channel 0) are ignored rather than
    /// rejected, so a binding for a channel this frame layout does not carry
    /// degrades to a no-op.
    pub fn update(&mut self, channel: u8, value: ChannelValue) {
        match (channel, value) {
            (MODE_CHANNEL, ChannelValue::Mode(token)) => {
                debug!("Mode token set to {:?}", token);
                self.mode = token;
            }
            (1..=8, ChannelValue::Axis(axis_value)) => {
                self.axes[usize::from(channel) - 1] = axis_value;
            }
            (channel, value) => {
                debug!(
                    "Ignoring update for unknown channel {} with value {:?}",
                    channel, value
                );
            }
        }
    }

    /// Resets an axis channel to neutral; no-op for channel 0
    pub fn reset_axis(&mut self, channel: u8) {
        self.update(channel, ChannelValue::Axis(NEUTRAL));
    }

    /// Whether releasing a key bound to this channel carries no meaning
    ///
    /// The mode token and the flight-mode selector are momentary selectors:
    /// their value persists until another press overwrites it.
    pub fn is_momentary(channel: u8) -> bool {
        channel == MODE_CHANNEL || channel == FLIGHT_MODE_CHANNEL
    }

    /// Serializes all channels in index order into one outbound frame
    pub fn serialize(&self) -> [u8; FRAME_LEN] {
        let mut frame = [0u8; FRAME_LEN];
        frame[..4].copy_from_slice(&self.mode);
        for (i, axis_value) in self.axes.iter().enumerate() {
            let offset = 4 + i * 2;
            frame[offset..offset + 2].copy_from_slice(&axis_value.to_be_bytes());
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis_field(frame: &[u8; FRAME_LEN], channel: u8) -> i16 {
        let offset = 4 + (usize::from(channel) - 1) * 2;
        i16::from_be_bytes([frame[offset], frame[offset + 1]])
    }

    #[test]
    fn default_frame_is_reverse_kinematics_with_neutral_axes() {
        let frame = ControlState::default().serialize();
        assert_eq!(frame.len(), FRAME_LEN);
        assert_eq!(&frame[..4], b"JJBA");
        assert_eq!(&frame[4..], &[0u8; 16]);
    }

    #[test]
    fn axis_update_lands_at_the_right_offset_big_endian() {
        let mut state = ControlState::default();
        state.update(1, ChannelValue::Axis(500));
        state.update(3, ChannelValue::Axis(-20));

        let frame = state.serialize();
        assert_eq!(&frame[4..6], &[0x01, 0xF4]);
        assert_eq!(axis_field(&frame, 1), 500);
        assert_eq!(axis_field(&frame, 2), 0);
        assert_eq!(axis_field(&frame, 3), -20);
    }

    #[test]
    fn mode_token_update_replaces_first_four_bytes() {
        let mut state = ControlState::default();
        state.update(MODE_CHANNEL, ChannelValue::Mode(MODE_TOKEN_MANUAL));
        assert_eq!(&state.serialize()[..4], b"JJBM");

        state.update(
            MODE_CHANNEL,
            ChannelValue::Mode(MODE_TOKEN_REVERSE_KINEMATICS),
        );
        assert_eq!(&state.serialize()[..4], b"JJBA");
    }

    #[test]
    fn unknown_channel_is_a_no_op() {
        let mut state = ControlState::default();
        state.update(9, ChannelValue::Axis(123));
        state.update(42, ChannelValue::Axis(123));
        assert_eq!(state, ControlState::default());
    }

    #[test]
    fn width_mismatch_is_a_no_op() {
        let mut state = ControlState::default();
        state.update(MODE_CHANNEL, ChannelValue::Axis(7));
        state.update(2, ChannelValue::Mode(MODE_TOKEN_MANUAL));
        assert_eq!(state, ControlState::default());
    }

    #[test]
    fn serialization_is_length_invariant() {
        let mut state = ControlState::default();
        for channel in 1..=8u8 {
            state.update(channel, ChannelValue::Axis(i16::from(channel)));
            assert_eq!(state.serialize().len(), FRAME_LEN);
        }
    }

    #[test]
    fn momentary_channels_are_mode_and_flight_mode() {
        assert!(ControlState::is_momentary(MODE_CHANNEL));
        assert!(ControlState::is_momentary(FLIGHT_MODE_CHANNEL));
        for channel in [1u8, 2, 3, 4, 6, 7, 8] {
            assert!(!ControlState::is_momentary(channel));
        }
    }
}
