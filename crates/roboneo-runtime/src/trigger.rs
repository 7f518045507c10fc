//! Expression triggers
//!
//! Input adapters push [`TriggerEvent`]s into a bounded channel. A single
//! consumer task drains it and applies the resulting switches under the
//! controller lock, so no input ever re-enters the lock from its own
//! callback.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use roboneo_core::Clock;

use crate::ExpressionController;

/// Default capacity of the trigger channel
pub const TRIGGER_CHANNEL_SIZE: usize = 32;

/// An input edge
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerEvent {
    /// The input bound to this expression went down
    Pressed(String),
    /// The input bound to this expression came back up
    Released(String),
}

impl TriggerEvent {
    /// Parse a simulator input line: `name` presses, `-name` releases
    pub fn parse_line(line: &str) -> Option<Self> {
        let line = line.trim();
        match line.strip_prefix('-') {
            Some(name) if !name.trim().is_empty() => Some(TriggerEvent::Released(name.trim().to_string())),
            Some(_) => None,
            None if !line.is_empty() => Some(TriggerEvent::Pressed(line.to_string())),
            None => None,
        }
    }
}

/// Turns input edges into expression switches.
///
/// Momentary behaviour: once every input is released the default
/// expression comes back. Sticky behaviour: the last pressed expression
/// stays.
#[derive(Clone, Debug)]
pub struct TriggerTracker {
    held: BTreeSet<String>,
    sticky: bool,
    default: Option<String>,
}

impl TriggerTracker {
    pub fn new(sticky: bool, default: Option<String>) -> Self {
        Self {
            held: BTreeSet::new(),
            sticky,
            default,
        }
    }

    /// Expression to switch to for this event, if any
    pub fn handle(&mut self, event: &TriggerEvent) -> Option<String> {
        match event {
            TriggerEvent::Pressed(name) => {
                self.held.insert(name.clone());
                Some(name.clone())
            }
            TriggerEvent::Released(name) => {
                self.held.remove(name);
                if self.held.is_empty() && !self.sticky {
                    self.default.clone()
                } else {
                    None
                }
            }
        }
    }

    /// Number of inputs currently held down
    pub fn held(&self) -> usize {
        self.held.len()
    }
}

/// Drain trigger events and apply them to the controller. Returns the
/// number of switches applied once every sender is gone.
pub fn spawn_trigger_consumer(
    controller: Arc<Mutex<ExpressionController>>,
    mut tracker: TriggerTracker,
    clock: Arc<dyn Clock>,
    mut events: mpsc::Receiver<TriggerEvent>,
) -> JoinHandle<u64> {
    tokio::spawn(async move {
        let mut applied = 0u64;
        while let Some(event) = events.recv().await {
            let Some(name) = tracker.handle(&event) else {
                continue;
            };

            let result = controller.lock().switch_to(&name, clock.now());
            match result {
                Ok(()) => applied += 1,
                Err(e) => tracing::warn!("Trigger {:?} ignored: {}", event, e),
            }
        }
        tracing::debug!("Trigger channel closed after {} switches", applied);
        applied
    })
}

/// Feed trigger events from text lines (the simulator's stdin).
/// Ends at end of input or once the consumer is gone.
pub fn spawn_line_triggers<R>(input: R, events: mpsc::Sender<TriggerEvent>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(input).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!("Trigger input failed: {}", e);
                    break;
                }
            };

            let Some(event) = TriggerEvent::parse_line(&line) else {
                continue;
            };
            tracing::debug!("Trigger input: {:?}", event);
            if events.send(event).await.is_err() {
                break;
            }
        }
    })
}
