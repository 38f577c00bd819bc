//! Static key-to-channel binding table
//!
//! One printable character maps to one channel update. The table is built
//! once at startup and never rebound at runtime; lookups lower-case the
//! character first so 'W' and 'w' behave identically.

use crate::machine::control_state::{
    ChannelValue, FLIGHT_MODE_CHANNEL, MODE_CHANNEL, MODE_TOKEN_MANUAL,
    MODE_TOKEN_REVERSE_KINEMATICS,
};
use crate::machine::key_machine::MachineError;
use std::collections::HashMap;
use tracing::debug;

/// Channel carrying forward/backward thrust
pub const FORWARD_CHANNEL: u8 = 1;

/// Channel carrying left/right turn
pub const TURN_CHANNEL: u8 = 2;

/// Channel carrying altitude up/down
pub const ALTITUDE_CHANNEL: u8 = 3;

/// Axis value applied while a forward/backward key is held
pub const FORWARD_STEP: i16 = 500;

/// Axis value applied while a turn key is held
pub const TURN_STEP: i16 = 500;

/// Axis value applied while an altitude key is held
pub const ALTITUDE_STEP: i16 = 20;

/// Flight-mode value the firmware interprets as "stop motors"
pub const FLIGHT_MODE_STOP: i16 = 100;

/// One entry of the binding table: the channel to touch and the value to
/// apply on press
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub channel: u8,
    pub value: ChannelValue,
}

/// Case-insensitive mapping from a pressed character to a channel update
#[derive(Debug, Clone)]
pub struct KeyBindings {
    map: HashMap<char, KeyBinding>,
}

impl KeyBindings {
    /// Builds the standard Blimpduino binding table
    pub fn default_bindings() -> Self {
        let mut map = HashMap::new();

        {
            let mut bind = |key: char, channel: u8, value: ChannelValue| {
                map.insert(key, KeyBinding { channel, value });
            };

            bind('w', FORWARD_CHANNEL, ChannelValue::Axis(FORWARD_STEP));
            bind('s', FORWARD_CHANNEL, ChannelValue::Axis(-FORWARD_STEP));
            bind('a', TURN_CHANNEL, ChannelValue::Axis(TURN_STEP));
            bind('d', TURN_CHANNEL, ChannelValue::Axis(-TURN_STEP));
            bind('q', ALTITUDE_CHANNEL, ChannelValue::Axis(ALTITUDE_STEP));
            bind('e', ALTITUDE_CHANNEL, ChannelValue::Axis(-ALTITUDE_STEP));

            bind('m', MODE_CHANNEL, ChannelValue::Mode(MODE_TOKEN_MANUAL));
            bind(
                'n',
                MODE_CHANNEL,
                ChannelValue::Mode(MODE_TOKEN_REVERSE_KINEMATICS),
            );

            bind('0', FLIGHT_MODE_CHANNEL, ChannelValue::Axis(0));
            bind('1', FLIGHT_MODE_CHANNEL, ChannelValue::Axis(1));
            bind('2', FLIGHT_MODE_CHANNEL, ChannelValue::Axis(2));
            bind('3', FLIGHT_MODE_CHANNEL, ChannelValue::Axis(3));
            bind('9', FLIGHT_MODE_CHANNEL, ChannelValue::Axis(FLIGHT_MODE_STOP));
        }

        debug!("Built default binding table with {} entries", map.len());
        Self { map }
    }

    /// Looks up the binding for a character, lower-casing it first
    pub fn lookup(&self, key: char) -> Option<&KeyBinding> {
        self.map.get(&key.to_ascii_lowercase())
    }

    /// Checks minimum requirements of the table
    pub fn validate(&self) -> Result<(), MachineError> {
        if self.map.is_empty() {
            return Err(MachineError::ConfigError(
                "Key binding table cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::default_bindings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let bindings = KeyBindings::default_bindings();
        assert_eq!(bindings.lookup('w'), bindings.lookup('W'));
        assert_eq!(bindings.lookup('q'), bindings.lookup('Q'));
    }

    #[test]
    fn unknown_characters_have_no_binding() {
        let bindings = KeyBindings::default_bindings();
        assert!(bindings.lookup('z').is_none());
        assert!(bindings.lookup('5').is_none());
        assert!(bindings.lookup(' ').is_none());
    }

    #[test]
    fn axis_keys_map_to_documented_channels_and_steps() {
        let bindings = KeyBindings::default_bindings();
        let cases = [
            ('w', FORWARD_CHANNEL, 500),
            ('s', FORWARD_CHANNEL, -500),
            ('a', TURN_CHANNEL, 500),
            ('d', TURN_CHANNEL, -500),
            ('q', ALTITUDE_CHANNEL, 20),
            ('e', ALTITUDE_CHANNEL, -20),
            ('0', FLIGHT_MODE_CHANNEL, 0),
            ('1', FLIGHT_MODE_CHANNEL, 1),
            ('2', FLIGHT_MODE_CHANNEL, 2),
            ('3', FLIGHT_MODE_CHANNEL, 3),
            ('9', FLIGHT_MODE_CHANNEL, 100),
        ];
        for (key, channel, value) in cases {
            let binding = bindings.lookup(key).expect("binding missing");
            assert_eq!(binding.channel, channel, "channel for '{}'", key);
            assert_eq!(binding.value, ChannelValue::Axis(value), "value for '{}'", key);
        }
    }

    #[test]
    fn mode_keys_map_to_tokens() {
        let bindings = KeyBindings::default_bindings();
        assert_eq!(
            bindings.lookup('m').unwrap().value,
            ChannelValue::Mode(MODE_TOKEN_MANUAL)
        );
        assert_eq!(
            bindings.lookup('n').unwrap().value,
            ChannelValue::Mode(MODE_TOKEN_REVERSE_KINEMATICS)
        );
    }

    #[test]
    fn default_table_validates() {
        assert!(KeyBindings::default_bindings().validate().is_ok());
    }
}
