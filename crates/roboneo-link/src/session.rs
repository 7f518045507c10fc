//! Serial session roles
//!
//! The primary runs the sender role, the secondary the receiver role. The
//! two halves share nothing but the byte channel.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};

use roboneo_core::{FaceError, HalfImage};
use roboneo_wire::{DecoderStats, FrameDecoder, LinkCodec};

/// Bytes requested per channel read
pub const READ_CHUNK: usize = 1024;

/// Session configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Period of the sender schedule
    pub send_interval: Duration,
    /// Upper bound on a single channel read
    pub read_timeout: Duration,
    /// Pause after a channel fault before touching the channel again
    pub error_backoff: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            send_interval: Duration::from_millis(50), // 20 Hz
            read_timeout: Duration::from_millis(100),
            error_backoff: Duration::from_millis(250),
        }
    }
}

/// Sender statistics
#[derive(Clone, Debug, Default)]
pub struct SenderStats {
    pub frames_sent: u64,
    pub write_errors: u64,
}

/// Receiver statistics
#[derive(Clone, Debug, Default)]
pub struct ReceiverStats {
    pub bytes_read: u64,
    pub images_delivered: u64,
    /// Images dropped because the sink was still busy
    pub images_dropped: u64,
    pub read_errors: u64,
    pub read_timeouts: u64,
    pub decoder: DecoderStats,
}

/// One end of the board-to-board link
#[derive(Clone)]
pub struct SerialSession {
    codec: LinkCodec,
    config: SessionConfig,
    shutdown: watch::Receiver<bool>,
}

impl SerialSession {
    /// Create a session. Both roles return once `shutdown` turns true or
    /// its sender is dropped.
    pub fn new(codec: LinkCodec, config: SessionConfig, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            codec,
            config,
            shutdown,
        }
    }

    fn stopping(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Sender role: on every tick, encode the most recently published
    /// half-image and write it out. No acknowledgement is awaited.
    pub async fn run_sender<W>(mut self, mut writer: W, latest: watch::Receiver<HalfImage>) -> SenderStats
    where
        W: AsyncWrite + Unpin,
    {
        let mut stats = SenderStats::default();
        let mut ticker = interval(self.config.send_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            "Link sender started ({:?} per frame, {} bytes on the wire)",
            self.config.send_interval,
            self.codec.frame_len()
        );

        while !self.stopping() {
            tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let half = latest.borrow().clone();
            let frame = match self.codec.encode_half(&half) {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Link encode failed: {}", e);
                    continue;
                }
            };

            let written = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                r = write_frame(&mut writer, &frame) => r,
            };

            match written {
                Ok(()) => {
                    stats.frames_sent += 1;
                    tracing::trace!("Link frame {} sent", stats.frames_sent);
                }
                Err(e) => {
                    stats.write_errors += 1;
                    tracing::warn!("{}", FaceError::Channel(format!("write failed: {}", e)));
                    if !self.backoff().await {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            "Link sender stopped: {} frames sent, {} write errors",
            stats.frames_sent,
            stats.write_errors
        );
        stats
    }

    /// Receiver role: read with a bounded timeout, decode, and hand every
    /// validated half-image to `sink`. Returns at end of stream, on
    /// shutdown, or when the sink is closed.
    pub async fn run_receiver<R>(mut self, mut reader: R, sink: mpsc::Sender<HalfImage>) -> ReceiverStats
    where
        R: AsyncRead + Unpin,
    {
        let mut stats = ReceiverStats::default();
        let mut decoder = FrameDecoder::new(self.codec.clone());
        let mut buf = vec![0u8; READ_CHUNK];

        tracing::info!("Link receiver started");

        'outer: while !self.stopping() {
            let read = tokio::select! {
                biased;
                _ = self.shutdown.changed() => break,
                r = timeout(self.config.read_timeout, reader.read(&mut buf)) => r,
            };

            let n = match read {
                // Nothing arrived in time, look at the shutdown flag again
                Err(_) => {
                    stats.read_timeouts += 1;
                    continue;
                }
                Ok(Ok(0)) => {
                    tracing::info!("Link channel closed by peer");
                    break;
                }
                Ok(Ok(n)) => n,
                Ok(Err(e)) => {
                    stats.read_errors += 1;
                    tracing::warn!("{}", FaceError::Channel(format!("read failed: {}", e)));
                    decoder.reset();
                    if !self.backoff().await {
                        break;
                    }
                    continue;
                }
            };
            stats.bytes_read += n as u64;

            for payload in decoder.push(&buf[..n]) {
                let Some(half) = HalfImage::from_rgb_bytes(&payload) else {
                    continue;
                };
                match sink.try_send(half) {
                    Ok(()) => stats.images_delivered += 1,
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        stats.images_dropped += 1;
                        tracing::trace!("Display busy, dropping half-image");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break 'outer,
                }
            }
        }

        stats.decoder = decoder.stats().clone();
        tracing::info!(
            "Link receiver stopped: {} images, {} bytes discarded, {} tag mismatches",
            stats.images_delivered,
            stats.decoder.bytes_discarded,
            stats.decoder.tag_mismatches
        );
        stats
    }

    /// Sleep for the error backoff. `false` if shutdown arrived meanwhile.
    async fn backoff(&mut self) -> bool {
        tokio::select! {
            biased;
            _ = self.shutdown.changed() => false,
            _ = sleep(self.config.error_backoff) => !self.stopping(),
        }
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &[u8]) -> std::io::Result<()> {
    writer.write_all(frame).await?;
    writer.flush().await
}

/// Spawn the sender role as a background task
pub fn spawn_sender<W>(
    session: SerialSession,
    writer: W,
    latest: watch::Receiver<HalfImage>,
) -> JoinHandle<SenderStats>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(session.run_sender(writer, latest))
}

/// Start a background receive loop, returning the channel of decoded
/// half-images and the task handle
pub fn start_receive_loop<R>(
    session: SerialSession,
    reader: R,
    buffer_size: usize,
) -> (mpsc::Receiver<HalfImage>, JoinHandle<ReceiverStats>)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let (tx, rx) = mpsc::channel(buffer_size);
    let handle = tokio::spawn(session.run_receiver(reader, tx));
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use roboneo_core::Rgb;
    use std::collections::VecDeque;
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{duplex, ReadBuf};

    fn test_config() -> SessionConfig {
        SessionConfig {
            send_interval: Duration::from_millis(5),
            read_timeout: Duration::from_millis(20),
            error_backoff: Duration::from_millis(1),
        }
    }

    fn session(shutdown: watch::Receiver<bool>) -> SerialSession {
        SerialSession::new(LinkCodec::half_image(), test_config(), shutdown)
    }

    fn half(seed: u8) -> HalfImage {
        let mut img = HalfImage::black();
        img.set(seed as usize % 16, 3, Rgb::new(seed, 255 - seed, 7));
        img
    }

    /// Reader replaying a fixed script of chunks and errors, then EOF
    struct ScriptedReader {
        steps: VecDeque<io::Result<Vec<u8>>>,
    }

    impl AsyncRead for ScriptedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            match self.steps.pop_front() {
                Some(Ok(data)) => {
                    buf.put_slice(&data);
                    Poll::Ready(Ok(()))
                }
                Some(Err(e)) => Poll::Ready(Err(e)),
                None => Poll::Ready(Ok(())),
            }
        }
    }

    #[tokio::test]
    async fn test_sender_writes_latest_image() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_latest_tx, latest_rx) = watch::channel(half(9));
        let (local, mut remote) = duplex(64 * 1024);

        let handle = spawn_sender(session(shutdown_rx), local, latest_rx);

        let codec = LinkCodec::half_image();
        let mut frame = vec![0u8; codec.frame_len()];
        remote.read_exact(&mut frame).await.unwrap();
        let payload = codec.decode(&frame).unwrap();
        assert_eq!(payload, half(9).as_rgb_bytes().as_slice());

        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();
        assert!(stats.frames_sent >= 1);
        assert_eq!(stats.write_errors, 0);
    }

    #[tokio::test]
    async fn test_sender_exits_when_peer_never_reads() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (_latest_tx, latest_rx) = watch::channel(half(1));
        // Too small for one frame, so the first write blocks
        let (local, _remote) = duplex(64);

        let handle = spawn_sender(session(shutdown_rx), local, latest_rx);
        sleep(Duration::from_millis(20)).await;
        shutdown_tx.send(true).unwrap();

        let stats = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(stats.frames_sent, 0);
    }

    #[tokio::test]
    async fn test_receiver_drops_garbage_and_delivers_in_order() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let codec = LinkCodec::half_image();
        let (mut local, remote) = duplex(64 * 1024);

        let (mut images, handle) = start_receive_loop(session(shutdown_rx), remote, 8);

        let mut stream = vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00];
        stream.extend(codec.encode_half(&half(1)).unwrap());
        stream.extend(codec.encode_half(&half(2)).unwrap());
        local.write_all(&stream).await.unwrap();
        drop(local);

        assert_eq!(images.recv().await.unwrap(), half(1));
        assert_eq!(images.recv().await.unwrap(), half(2));

        let stats = handle.await.unwrap();
        assert_eq!(stats.images_delivered, 2);
        assert_eq!(stats.decoder.bytes_discarded, 5);
        assert!(images.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_receiver_resets_buffer_after_read_error() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let codec = LinkCodec::half_image();
        let first = codec.encode_half(&half(3)).unwrap();
        let second = codec.encode_half(&half(4)).unwrap();

        let reader = ScriptedReader {
            steps: VecDeque::from(vec![
                Ok(first[..400].to_vec()),
                Err(io::Error::new(io::ErrorKind::Other, "line noise")),
                Ok(second),
            ]),
        };

        let (tx, mut rx) = mpsc::channel(4);
        let stats = session(shutdown_rx).run_receiver(reader, tx).await;

        assert_eq!(rx.recv().await.unwrap(), half(4));
        assert_eq!(stats.read_errors, 1);
        assert_eq!(stats.images_delivered, 1);
        // The partial frame was flushed, not scanned against the next one
        assert_eq!(stats.decoder.tag_mismatches, 0);
        assert_eq!(stats.decoder.bytes_discarded, 400);
    }

    #[tokio::test]
    async fn test_stalled_receiver_shuts_down_promptly() {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = SessionConfig {
            read_timeout: Duration::from_secs(30),
            ..test_config()
        };
        let (_local, remote) = duplex(1024);

        let session = SerialSession::new(LinkCodec::half_image(), config, shutdown_rx);
        let (_images, handle) = start_receive_loop(session, remote, 1);

        sleep(Duration::from_millis(10)).await;
        shutdown_tx.send(true).unwrap();

        let stats = timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
        assert_eq!(stats.images_delivered, 0);
    }

    #[tokio::test]
    async fn test_receiver_drops_images_when_sink_full() {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let codec = LinkCodec::half_image();
        let mut stream = Vec::new();
        for seed in 0..3 {
            stream.extend(codec.encode_half(&half(seed)).unwrap());
        }
        let steps = stream.chunks(READ_CHUNK).map(|c| Ok(c.to_vec())).collect();

        let (tx, mut rx) = mpsc::channel(1);
        let stats = session(shutdown_rx)
            .run_receiver(ScriptedReader { steps }, tx)
            .await;

        assert_eq!(stats.images_delivered + stats.images_dropped, 3);
        assert_eq!(rx.recv().await.unwrap(), half(0));
    }
}
