//! Raw keyboard event collection from the terminal
//!
//! Reads key transitions with crossterm in a blocking loop and forwards them
//! as [`RawKeyEvent`]s with chrono timestamps. Where the terminal speaks the
//! kitty keyboard protocol we request `REPORT_EVENT_TYPES` so genuine
//! key-release events arrive; without it only presses are delivered and held
//! axes latch until the process exits.

use chrono::{DateTime, Local};
use crossterm::event::{
    read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement};
use statum::{machine, state};
use std::io::{stdout, Write};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Identity of a key as far as the control machine cares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyId {
    /// A printable character, forwarded as typed (case preserved)
    Char(char),

    /// The escape key, terminating input capture
    Escape,
}

// Key transition direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Raw key transition with precise chrono timestamp
#[derive(Debug, Clone)]
pub struct RawKeyEvent {
    pub key: KeyId,
    pub state: KeyState,
    pub timestamp: DateTime<Local>,
}

// Collector errors
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("Failed to initialize key listener: {0}")]
    InitializationError(String),

    #[error("Terminal error: {0}")]
    TerminalError(String),

    #[error("Failed to send event: {0}")]
    EventSendError(String),
}

// Define listener states using statum's state macro
#[state]
#[derive(Debug, Clone)]
pub enum ListenerState {
    Initializing,
    Listening,
}

#[machine]
#[derive(Debug)]
pub struct KeyListener<S: ListenerState> {
    // Channel for sending raw events to the machine
    event_sender: mpsc::Sender<RawKeyEvent>,

    // Whether the terminal reports real key-release events
    enhanced: bool,
}

// Implementation for Initializing state
impl KeyListener<Initializing> {
    pub fn create(event_sender: mpsc::Sender<RawKeyEvent>) -> Self {
        debug!("Creating key listener");
        Self::new(event_sender, false)
    }

    // Put the terminal into raw mode and transition to Listening state
    pub fn initialize(mut self) -> Result<KeyListener<Listening>, CollectorError> {
        info!("Initializing key listener terminal state");

        enable_raw_mode().map_err(|e| CollectorError::InitializationError(e.to_string()))?;

        match supports_keyboard_enhancement() {
            Ok(true) => {
                if let Err(e) = execute!(
                    stdout(),
                    PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
                ) {
                    warn!("Failed to enable key-release reporting: {}", e);
                } else {
                    info!("Key-release reporting enabled (kitty keyboard protocol)");
                    self.enhanced = true;
                }
            }
            Ok(false) => {
                warn!(
                    "Terminal does not report key releases; axes will latch until exit. \
                     Use a kitty-protocol terminal for full control"
                );
            }
            Err(e) => {
                warn!("Could not probe keyboard enhancement support: {}", e);
            }
        }

        info!("Key listener initialized, transitioning to Listening state");
        Ok(self.transition())
    }
}

// Implementation for Listening state
impl KeyListener<Listening> {
    // Run the blocking read loop until escape or channel loss
    pub fn run_listen_loop(&mut self) -> Result<(), CollectorError> {
        info!("Starting key listener loop");

        let result = self.listen();

        // Always hand the terminal back, even on error paths
        self.restore_terminal();
        result
    }

    fn listen(&mut self) -> Result<(), CollectorError> {
        loop {
            let event = match read() {
                Ok(event) => event,
                Err(e) => {
                    error!("Failed to read terminal event: {}", e);
                    return Err(CollectorError::TerminalError(e.to_string()));
                }
            };

            let key_event = match event {
                Event::Key(key_event) => key_event,
                other => {
                    debug!("Ignoring non-key terminal event: {:?}", other);
                    continue;
                }
            };

            // Ctrl+C reaches us as a plain key event in raw mode
            if key_event.modifiers.contains(KeyModifiers::CONTROL)
                && key_event.code == KeyCode::Char('c')
            {
                info!("Ctrl+C received, stopping key listener");
                return Ok(());
            }

            let Some(raw_event) = self.convert_key_event(&key_event) else {
                debug!("Ignoring unmapped key event: {:?}", key_event);
                continue;
            };

            // Escape ends input capture. Without release reporting the
            // release would never arrive, so stop on the press instead.
            if raw_event.key == KeyId::Escape {
                if raw_event.state == KeyState::Released || !self.enhanced {
                    info!("Escape received, stopping key listener");
                    return Ok(());
                }
                continue;
            }

            debug!(
                "Key event: {:?} {:?} at {}",
                raw_event.key,
                raw_event.state,
                raw_event.timestamp.format("%H:%M:%S.%3f")
            );

            if let Err(e) = self.event_sender.blocking_send(raw_event) {
                warn!("Key machine is gone, stopping key listener: {}", e);
                return Err(CollectorError::EventSendError(e.to_string()));
            }
        }
    }

    // Convert a crossterm key event to the internal event type
    fn convert_key_event(&self, key_event: &KeyEvent) -> Option<RawKeyEvent> {
        let now = Local::now();

        let state = match key_event.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => KeyState::Pressed,
            KeyEventKind::Release => KeyState::Released,
        };

        let key = match key_event.code {
            KeyCode::Char(c) => KeyId::Char(c),
            KeyCode::Esc => KeyId::Escape,
            _ => return None,
        };

        Some(RawKeyEvent {
            key,
            state,
            timestamp: now,
        })
    }

    fn restore_terminal(&self) {
        if self.enhanced {
            if let Err(e) = execute!(stdout(), PopKeyboardEnhancementFlags) {
                warn!("Failed to pop keyboard enhancement flags: {}", e);
            }
        }
        if let Err(e) = disable_raw_mode() {
            warn!("Failed to disable raw mode: {}", e);
        }
        info!("Terminal state restored");
    }
}

// Public interface for spawning and running the listener
//
// The handle deliberately holds no sender clone: the listener task owns the
// only sender, so its exit is what the machine observes as end of input.
pub struct ListenerHandle {}

impl ListenerHandle {
    // Create a new listener and spawn it on the blocking thread pool
    pub fn spawn(event_sender: mpsc::Sender<RawKeyEvent>) -> Result<Self, CollectorError> {
        info!("Spawning key listener");

        let listener = KeyListener::create(event_sender);

        // event::read blocks, so the loop lives on the blocking pool. When
        // it returns, the listener and its sender drop, which the machine
        // observes as end of input.
        let task_handle = tokio::task::spawn_blocking(move || match listener.initialize() {
            Ok(mut listening_state) => {
                if let Err(e) = listening_state.run_listen_loop() {
                    error!("Key listener terminated with error: {}", e);
                } else {
                    info!("Key listener finished");
                }
            }
            Err(e) => {
                error!("Failed to initialize key listener: {}", e);
            }
        });

        debug!("Blocking task spawned with handle: {:?}", task_handle);
        info!("Key listener successfully started");

        Ok(Self {})
    }
}
