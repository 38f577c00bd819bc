//! Control-state machine for the blimp link
//!
//! Owns the channel table and turns the asynchronous key-event stream into a
//! fixed-rate stream of control frames:
//!
//! 1. [`control_state`] - The 9-channel table and its wire serialization
//! 2. [`bindings`] - Static key-to-channel binding table
//! 3. [`key_machine`] - Per-tick event application, release debounce and
//!    frame publishing
//!
//! ```text
//! RawKeyEvent ──► KeyMachine ──► 20-byte frame ──► BlimpTransport
//!                 (one owner, one tick = one atomic cycle)
//! ```

pub mod bindings;
pub mod control_state;
pub mod key_machine;

// Re-export types that need to be public
pub use bindings::KeyBindings;
pub use key_machine::{run_machine_loop, KeyMachine, MachineSettings};
