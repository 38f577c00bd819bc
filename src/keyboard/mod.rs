//! Keyboard subsystem for terminal key input
//!
//! Collects raw key press/release transitions from the terminal and delivers
//! them to the key machine over an mpsc channel:
//!
//! ```text
//! Terminal ──► KeyListener ──► RawKeyEvent queue ──► KeyMachine
//!              (blocking read loop)
//! ```
//!
//! The listener runs on the blocking thread pool; dropping its event sender
//! (escape pressed) is the shutdown signal for the rest of the system.

pub mod key_collector;

// Re-export types that need to be public
pub use key_collector::{KeyId, KeyState, ListenerHandle, RawKeyEvent};
