//! Face runtime
//!
//! Primary: a render loop ticks at the update rate, asks the controller for
//! the current face, shows it locally and publishes the right half for the
//! link sender. Secondary: shows whatever half-images the link receiver
//! delivers.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};

use roboneo_core::{Clock, FrameBuffer, HalfImage};
use roboneo_link::{spawn_sender, start_receive_loop, SerialSession};
use roboneo_wire::LinkCodec;

use crate::{
    spawn_trigger_consumer, Display, ExpressionController, RuntimeConfig, TriggerEvent,
    TriggerTracker, TRIGGER_CHANNEL_SIZE,
};

/// Render loop statistics
#[derive(Clone, Debug, Default)]
pub struct RenderStats {
    pub ticks: u64,
    pub frames_shown: u64,
    pub playback_errors: u64,
    pub display_errors: u64,
    pub last_tick_duration: Duration,
}

/// Secondary display loop statistics
#[derive(Clone, Debug, Default)]
pub struct MirrorStats {
    pub halves_shown: u64,
    pub display_errors: u64,
}

/// The primary board: controller, triggers and render loop
pub struct Face {
    controller: Arc<Mutex<ExpressionController>>,
    tracker: TriggerTracker,
    clock: Arc<dyn Clock>,
    render_interval: Duration,
    default: Option<String>,
}

impl Face {
    pub fn new(config: &RuntimeConfig, clock: Arc<dyn Clock>) -> Self {
        let controller = ExpressionController::new(config.expression_names(), config.frame_cache_limit);
        Face {
            controller: Arc::new(Mutex::new(controller)),
            tracker: TriggerTracker::new(config.sticky, config.default.clone()),
            clock,
            render_interval: config.render_interval(),
            default: config.default.clone(),
        }
    }

    pub fn controller(&self) -> Arc<Mutex<ExpressionController>> {
        Arc::clone(&self.controller)
    }

    /// Bind assets from a directory, then show the default expression.
    /// A missing directory is logged; the face still runs on placeholders.
    pub fn prepare(&self, assets_dir: &Path) -> usize {
        let mut controller = self.controller.lock();

        tracing::info!("Loading expressions from {}", assets_dir.display());
        let loaded = match controller.load_assets_from_dir(assets_dir) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("{}", e);
                0
            }
        };

        if let Some(default) = &self.default {
            if let Err(e) = controller.switch_to(default, self.clock.now()) {
                tracing::error!("Default expression unavailable: {}", e);
            }
        }
        loaded
    }

    /// Start the trigger consumer; returns the sending end for input
    /// adapters
    pub fn start_triggers(&self) -> mpsc::Sender<TriggerEvent> {
        let (tx, rx) = mpsc::channel(TRIGGER_CHANNEL_SIZE);
        spawn_trigger_consumer(
            self.controller(),
            self.tracker.clone(),
            Arc::clone(&self.clock),
            rx,
        );
        tx
    }

    /// One render tick. The controller lock covers only the frame fetch.
    fn render_tick(
        &self,
        display: &mut dyn Display,
        frame: &mut FrameBuffer,
        halves: Option<&watch::Sender<HalfImage>>,
        stats: &mut RenderStats,
    ) {
        let now = self.clock.now();
        {
            let mut controller = self.controller.lock();
            match controller.current_frame(now) {
                Ok(current) => frame.clone_from(current),
                // Keep showing the last good frame
                Err(e) => {
                    stats.playback_errors += 1;
                    tracing::warn!("{}", e);
                }
            }
        }

        match display.show(frame) {
            Ok(()) => stats.frames_shown += 1,
            Err(e) => {
                stats.display_errors += 1;
                tracing::warn!("{}", e);
            }
        }

        if let Some(halves) = halves {
            let (_, right) = frame.split_halves();
            halves.send_replace(right);
        }
    }

    /// Run the render loop until shutdown, then stop playback and tear the
    /// display down
    pub async fn run_render_loop(
        &self,
        mut display: Box<dyn Display>,
        halves: Option<watch::Sender<HalfImage>>,
        mut shutdown: watch::Receiver<bool>,
    ) -> RenderStats {
        let mut stats = RenderStats::default();
        let mut frame = FrameBuffer::black();
        let mut ticker = interval(self.render_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!("Render loop running at {:?} per frame", self.render_interval);
        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }

            let started = std::time::Instant::now();
            self.render_tick(display.as_mut(), &mut frame, halves.as_ref(), &mut stats);
            stats.ticks += 1;
            stats.last_tick_duration = started.elapsed();
        }

        self.controller.lock().shutdown();
        if let Err(e) = display.teardown() {
            tracing::warn!("Display teardown failed: {}", e);
        }
        tracing::info!(
            "Render loop stopped after {} ticks ({} playback errors)",
            stats.ticks,
            stats.playback_errors
        );
        stats
    }
}

/// Run the primary board. With a link writer the right half is relayed
/// to the secondary.
pub async fn run_primary<W>(
    config: &RuntimeConfig,
    face: Face,
    display: Box<dyn Display>,
    link: Option<W>,
    shutdown: watch::Receiver<bool>,
) -> RenderStats
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (halves, sender) = match link {
        Some(writer) => {
            let (tx, rx) = watch::channel(HalfImage::black());
            let session = SerialSession::new(LinkCodec::half_image(), config.session_config(), shutdown.clone());
            (Some(tx), Some(spawn_sender(session, writer, rx)))
        }
        None => (None, None),
    };

    let stats = face.run_render_loop(display, halves, shutdown).await;

    if let Some(sender) = sender {
        match sender.await {
            Ok(link) => tracing::debug!("Link sender: {:?}", link),
            Err(e) => tracing::warn!("Link sender task failed: {}", e),
        }
    }
    stats
}

/// Run the secondary board: show received half-images until shutdown or
/// the link closes
pub async fn run_secondary<R>(
    config: &RuntimeConfig,
    mut display: Box<dyn Display>,
    link: R,
    shutdown: watch::Receiver<bool>,
) -> MirrorStats
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let session = SerialSession::new(LinkCodec::half_image(), config.session_config(), shutdown);
    let (mut halves, receiver) = start_receive_loop(session, link, 4);

    let mut stats = MirrorStats::default();
    while let Some(half) = halves.recv().await {
        match display.show_half(&half) {
            Ok(()) => stats.halves_shown += 1,
            Err(e) => {
                stats.display_errors += 1;
                tracing::warn!("{}", e);
            }
        }
    }

    match receiver.await {
        Ok(link) => tracing::debug!("Link receiver: {:?}", link),
        Err(e) => tracing::warn!("Link receiver task failed: {}", e),
    }
    if let Err(e) = display.teardown() {
        tracing::warn!("Display teardown failed: {}", e);
    }
    stats
}
