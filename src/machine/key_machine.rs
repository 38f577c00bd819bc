//! Key machine - merges key transitions into the published control vector
//!
//! The machine is the single owner of [`ControlState`] and the
//! pending-release bookkeeping. Key events arrive over an mpsc queue and are
//! drained once per publish tick, so press/release handling, debounce
//! resolution and frame transmission happen as one atomic unit per tick.
//!
//! # State Machine
//!
//! ```text
//! Waiting ──► Applying(KeyEventBatch) ──► Publishing ──► Waiting
//!  (drain queue)   (press/release + debounce)  (serialize + send)
//! ```

use crate::keyboard::{KeyId, KeyState, RawKeyEvent};
use crate::machine::bindings::KeyBindings;
use crate::machine::control_state::{ControlState, FRAME_LEN};
use crate::transport::{BlimpTransport, TransportError};
use chrono::{DateTime, Local};
use statum::{machine, state};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// A released axis returns to neutral after this many publish periods
/// without a re-press. One period absorbs key-repeat jitter between
/// consecutive press events; two keeps rapid re-presses seamless.
pub const RELEASE_GRACE_PERIODS: u64 = 2;

// Machine settings
#[derive(Clone, Debug)]
pub struct MachineSettings {
    /// Publish period in milliseconds
    pub publish_interval_ms: u64,
}

impl Default for MachineSettings {
    fn default() -> Self {
        Self {
            publish_interval_ms: 50, // 20 Hz, the Blimpduino firmware cadence
        }
    }
}

impl MachineSettings {
    /// Debounce window for release events
    pub fn release_grace(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.publish_interval_ms * RELEASE_GRACE_PERIODS) as i64)
    }
}

// Machine errors
#[derive(Debug, thiserror::Error)]
pub enum MachineError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Transport error: {0}")]
    TransportError(#[from] TransportError),
}

/// A release waiting for its grace period to expire
#[derive(Debug, Clone)]
struct PendingRelease {
    timestamp: DateTime<Local>,
}

// Event batch for the applying state
#[derive(Debug, Clone)]
pub struct KeyEventBatch {
    pub events: Vec<RawKeyEvent>,
}

// Define machine states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum MachineState {
    Waiting,
    Applying(KeyEventBatch),
    Publishing,
}

#[machine]
#[derive(Debug)]
pub struct KeyMachine<S: MachineState> {
    // Receiver for raw key events
    event_receiver: mpsc::Receiver<RawKeyEvent>,

    // Machine settings
    settings: MachineSettings,

    // Static key binding table
    bindings: KeyBindings,

    // Current control vector
    control_state: ControlState,

    // Outbound frame transport
    transport: BlimpTransport,

    // Release debounce tracking, one entry per axis channel
    pending_releases: HashMap<u8, PendingRelease>,

    // Set once the key listener has dropped its sender
    input_closed: bool,
}

// Implementation of methods available in all states
impl<S: MachineState> KeyMachine<S> {
    // Get a reference to the current settings
    pub fn settings(&self) -> &MachineSettings {
        &self.settings
    }

    /// Whether the input source has stopped delivering events
    pub fn input_closed(&self) -> bool {
        self.input_closed
    }

    /// Serialized view of the current control vector
    pub fn current_frame(&self) -> [u8; FRAME_LEN] {
        self.control_state.serialize()
    }
}

// Implementation for Waiting state
impl KeyMachine<Waiting> {
    pub fn create(
        event_receiver: mpsc::Receiver<RawKeyEvent>,
        settings: Option<MachineSettings>,
        bindings: KeyBindings,
        transport: BlimpTransport,
    ) -> Result<Self, MachineError> {
        let settings = settings.unwrap_or_default();
        info!("Creating key machine with settings: {:?}", settings);

        bindings.validate()?;
        debug!("Binding table validated ({} entries)", bindings.len());

        Ok(Self::new(
            event_receiver,
            settings,
            bindings,
            ControlState::default(),
            transport,
            HashMap::new(),
            false, // input_closed
        ))
    }

    // Drain all queued key events and transition to Applying state
    pub fn collect_events(mut self) -> KeyMachine<Applying> {
        let mut events = Vec::new();

        loop {
            match self.event_receiver.try_recv() {
                Ok(event) => {
                    debug!("Received key event from queue: {:?}", event);
                    events.push(event);
                }
                Err(mpsc::error::TryRecvError::Empty) => {
                    break;
                }
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    // The listener stopped (escape); unwind cleanly after
                    // this cycle instead of treating it as a failure.
                    info!("Key event channel closed by listener");
                    self.input_closed = true;
                    break;
                }
            }
        }

        if !events.is_empty() {
            debug!("Collected batch of {} key events", events.len());
        }

        self.transition_with(KeyEventBatch { events })
    }
}

// Implementation for Applying state
impl KeyMachine<Applying> {
    // Apply the batch in arrival order, then resolve expired releases
    pub fn apply_events(mut self) -> KeyMachine<Publishing> {
        let events = if let Some(batch) = self.get_state_data() {
            batch.events.clone()
        } else {
            warn!("No event batch found in state data, this should not happen");
            Vec::new()
        };

        for event in &events {
            match event.state {
                KeyState::Pressed => self.handle_press(event.key),
                KeyState::Released => self.handle_release(event.key, event.timestamp),
            }
        }

        self.resolve_pending_releases(Local::now());

        self.transition()
    }

    // Press path: the only path that sets non-neutral values
    fn handle_press(&mut self, key: KeyId) {
        let KeyId::Char(c) = key else {
            debug!("Ignoring press of non-character key: {:?}", key);
            return;
        };

        let Some(binding) = self.bindings.lookup(c) else {
            debug!("Ignoring press of unbound key '{}'", c);
            return;
        };
        let binding = *binding;

        self.control_state.update(binding.channel, binding.value);

        // A re-press inside the grace window must keep the pressed value,
        // so the channel's pending release is cancelled here.
        if self.pending_releases.remove(&binding.channel).is_some() {
            debug!(
                "Cancelled pending release for channel {} on re-press",
                binding.channel
            );
        }
    }

    fn handle_release(&mut self, key: KeyId, timestamp: DateTime<Local>) {
        let KeyId::Char(c) = key else {
            debug!("Ignoring release of non-character key: {:?}", key);
            return;
        };

        let Some(binding) = self.bindings.lookup(c) else {
            debug!("Ignoring release of unbound key '{}'", c);
            return;
        };

        if ControlState::is_momentary(binding.channel) {
            // Mode selectors persist until overwritten by another press
            debug!(
                "Release of momentary channel {} carries no meaning",
                binding.channel
            );
            return;
        }

        debug!(
            "Channel {} waiting for release confirmation at {}",
            binding.channel,
            timestamp.format("%H:%M:%S.%3f")
        );
        self.pending_releases
            .insert(binding.channel, PendingRelease { timestamp });
    }

    // Reset channels whose release outlived the grace window
    fn resolve_pending_releases(&mut self, now: DateTime<Local>) {
        if self.pending_releases.is_empty() {
            return;
        }

        let grace = self.settings.release_grace();

        let expired: Vec<u8> = self
            .pending_releases
            .iter()
            .filter(|(_, pending)| now - pending.timestamp > grace)
            .map(|(channel, _)| *channel)
            .collect();

        for channel in expired {
            info!("Channel {} release confirmed, returning to neutral", channel);
            self.control_state.reset_axis(channel);
            self.pending_releases.remove(&channel);
        }
    }
}

// Implementation for Publishing state
impl KeyMachine<Publishing> {
    // Serialize and send the current frame, then transition back to Waiting
    pub async fn publish(self) -> Result<KeyMachine<Waiting>, MachineError> {
        let frame = self.control_state.serialize();

        if let Err(e) = self.transport.send(&frame).await {
            error!("Failed to publish control frame: {}", e);
            return Err(MachineError::TransportError(e));
        }

        debug!("Published {} byte control frame", frame.len());
        Ok(self.transition())
    }
}

/// Runs the fixed-rate publish loop until the input source stops
///
/// Each tick runs one full machine cycle: drain events, apply and debounce,
/// publish. Ticks the loop cannot keep pace with are skipped, never queued.
pub async fn run_machine_loop(mut machine: KeyMachine<Waiting>) -> Result<(), MachineError> {
    let interval_ms = machine.settings().publish_interval_ms;
    info!("Starting publish loop with {}ms interval", interval_ms);

    let mut interval_timer =
        tokio::time::interval(tokio::time::Duration::from_millis(interval_ms));
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Stats for performance monitoring
    let mut cycles: u64 = 0;
    let mut total_events: u64 = 0;
    let mut last_stats_time = Local::now();
    let stats_interval = chrono::Duration::seconds(30);

    loop {
        interval_timer.tick().await;

        let applying_state = machine.collect_events();

        if let Some(batch) = applying_state.get_state_data() {
            total_events += batch.events.len() as u64;
        }

        let publishing_state = applying_state.apply_events();
        machine = publishing_state.publish().await?;
        cycles += 1;

        if machine.input_closed() {
            info!("Input source stopped, publish loop finished");
            return Ok(());
        }

        // Log stats periodically
        let now = Local::now();
        if now - last_stats_time > stats_interval {
            let elapsed_seconds = (now - last_stats_time).num_seconds();
            info!(
                "Publish loop stats: {} frames, {} key events in {} seconds",
                cycles, total_events, elapsed_seconds
            );
            cycles = 0;
            total_events = 0;
            last_stats_time = now;
        }
    }
}
