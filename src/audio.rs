//! Byte queues between a platform audio callback pair and the bridge.
//!
//! The microphone side never blocks the capture callback: when the queue is
//! full the newest frame is dropped. The speaker side never starves the
//! playback callback: missing bytes are filled with silence.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError, error::TrySendError};

use crate::protocol::models::AudioEncoding;
use crate::sdk::{BridgeEvent, EventKind, RealtimeBridge};
use crate::{Error, Result};

pub const DEFAULT_QUEUE_FRAMES: usize = 64;
pub const PUMP_BATCH_BYTES: usize = 2048;
pub const PUMP_FLUSH_INTERVAL: Duration = Duration::from_millis(100);
pub const PUMP_IDLE_WAIT: Duration = Duration::from_millis(10);

/// Capture-side producer handle.
#[derive(Debug, Clone)]
pub struct MicrophoneFeed {
    tx: mpsc::Sender<Vec<u8>>,
}

impl MicrophoneFeed {
    /// Queue one captured frame. Returns `false` if the frame was dropped.
    pub fn push(&self, frame: Vec<u8>) -> bool {
        match self.tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(frame)) => {
                tracing::warn!("Microphone queue full, dropping {} bytes", frame.len());
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Drains the microphone queue into the bridge in batches.
pub struct AudioPump {
    bridge: RealtimeBridge,
    rx: mpsc::Receiver<Vec<u8>>,
    batch_bytes: usize,
    flush_interval: Duration,
    idle_wait: Duration,
}

/// Create a microphone queue and the pump that drains it.
#[must_use]
pub fn microphone(bridge: RealtimeBridge, capacity: usize) -> (MicrophoneFeed, AudioPump) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let pump = AudioPump {
        bridge,
        rx,
        batch_bytes: PUMP_BATCH_BYTES,
        flush_interval: PUMP_FLUSH_INTERVAL,
        idle_wait: PUMP_IDLE_WAIT,
    };
    (MicrophoneFeed { tx }, pump)
}

impl AudioPump {
    #[must_use]
    pub const fn batch_bytes(mut self, bytes: usize) -> Self {
        self.batch_bytes = bytes;
        self
    }

    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Run until every [`MicrophoneFeed`] is dropped. Returns the number of
    /// bytes handed to the bridge.
    ///
    /// Frames captured while the bridge is disconnected are discarded.
    pub async fn run(mut self) -> u64 {
        let mut buffer: Vec<u8> = Vec::with_capacity(self.batch_bytes);
        let mut last_send = Instant::now();
        let mut sent: u64 = 0;

        loop {
            let closed = match self.rx.try_recv() {
                Ok(frame) => {
                    buffer.extend_from_slice(&frame);
                    false
                }
                Err(TryRecvError::Empty) => {
                    tokio::time::sleep(self.idle_wait).await;
                    false
                }
                Err(TryRecvError::Disconnected) => true,
            };

            let due = buffer.len() >= self.batch_bytes || last_send.elapsed() >= self.flush_interval;
            if !buffer.is_empty() && (due || closed) {
                sent += self.flush(&buffer).await;
                buffer.clear();
                last_send = Instant::now();
            }

            if closed {
                tracing::debug!("Audio pump stopped after {sent} bytes");
                return sent;
            }
        }
    }

    async fn flush(&self, chunk: &[u8]) -> u64 {
        match self.bridge.send_audio(chunk).await {
            Ok(()) => chunk.len() as u64,
            Err(Error::NotConnected) => {
                tracing::trace!("Discarding {} bytes of audio while disconnected", chunk.len());
                0
            }
            Err(err) => {
                tracing::warn!("Failed to send audio: {err}");
                0
            }
        }
    }
}

/// Producer side of the playback queue, fed by decoded audio deltas.
#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    tx: mpsc::Sender<Vec<u8>>,
}

/// Consumer side of the playback queue, read by the playback callback.
#[derive(Debug)]
pub struct SpeakerFeed {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
}

#[must_use]
pub fn speaker(capacity: usize) -> (PlaybackQueue, SpeakerFeed) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (PlaybackQueue { tx }, SpeakerFeed { rx, pending: Vec::new() })
}

impl PlaybackQueue {
    /// Returns `false` if the chunk was dropped.
    pub fn push(&self, pcm: Vec<u8>) -> bool {
        match self.tx.try_send(pcm) {
            Ok(()) => true,
            Err(TrySendError::Full(pcm)) => {
                tracing::warn!("Playback queue full, dropping {} bytes", pcm.len());
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Decode `encoded` and queue it for playback.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] if the payload is not valid for `encoding`.
    #[allow(clippy::result_large_err)]
    pub fn push_encoded(&self, encoding: AudioEncoding, encoded: &str) -> Result<bool> {
        let pcm = encoding.decode(encoded)?;
        Ok(self.push(pcm))
    }

    /// Route the bridge's audio deltas into this queue.
    pub fn attach(&self, bridge: &RealtimeBridge) {
        let queue = self.clone();
        let encoding = bridge.settings().audio_encoding;
        bridge.register_event_handler(EventKind::AudioDelta, move |event| {
            let queue = queue.clone();
            async move {
                if let BridgeEvent::AudioDelta(encoded) = event {
                    queue.push_encoded(encoding, &encoded)?;
                }
                Ok(())
            }
        });
    }
}

impl SpeakerFeed {
    /// Fill `out` from queued audio, padding with silence. Returns the number
    /// of bytes that came from the queue.
    pub fn fill(&mut self, out: &mut [u8]) -> usize {
        while self.pending.len() < out.len() {
            match self.rx.try_recv() {
                Ok(chunk) => self.pending.extend_from_slice(&chunk),
                Err(_) => break,
            }
        }
        let available = self.pending.len().min(out.len());
        out[..available].copy_from_slice(&self.pending[..available]);
        out[available..].fill(0);
        self.pending.drain(..available);
        available
    }
}
