//! Expression controller
//!
//! The only place that starts or stops an [`Animation`], which keeps at
//! most one of them playing. Callers wrap it in a mutex shared by the
//! render loop and the trigger consumer.

use std::collections::BTreeMap;
use std::path::Path;

use roboneo_anim::{source_for_path, Animation, FrameSource};
use roboneo_core::{FaceError, FaceResult, FrameBuffer, Rgb, Timestamp};

/// Shown while no animation is active: two yellow diagonals on black
pub fn placeholder_pattern() -> FrameBuffer {
    let mut frame = FrameBuffer::black();
    frame.draw_line((0, 0), (16, 16), Rgb::YELLOW);
    frame.draw_line((16, 0), (32, 16), Rgb::YELLOW);
    frame
}

pub struct ExpressionController {
    /// Every configured expression, bound to an animation or not
    slots: BTreeMap<String, Option<Animation>>,
    active: Option<String>,
    cache_limit: usize,
    placeholder: FrameBuffer,
}

impl ExpressionController {
    pub fn new<I, S>(names: I, cache_limit: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: names.into_iter().map(|n| (n.into(), None)).collect(),
            active: None,
            cache_limit,
            placeholder: placeholder_pattern(),
        }
    }

    /// Make `name` the active expression and start its animation.
    ///
    /// Switching to the already active expression does nothing. An
    /// expression without an asset becomes active but shows the
    /// placeholder.
    pub fn switch_to(&mut self, name: &str, now: Timestamp) -> FaceResult<()> {
        if !self.slots.contains_key(name) {
            return Err(FaceError::UnknownExpression(name.to_string()));
        }
        if self.active.as_deref() == Some(name) {
            return Ok(());
        }

        if let Some(current) = self.active_animation_mut() {
            current.stop();
        }

        tracing::debug!("Switching to expression {}", name);
        self.active = Some(name.to_string());

        match self.slots.get_mut(name).and_then(Option::as_mut) {
            Some(animation) => animation.start(now),
            None => tracing::warn!("No animation bound to {}", name),
        }
        Ok(())
    }

    /// Frame of the active animation at `now`, or the placeholder
    pub fn current_frame(&mut self, now: Timestamp) -> FaceResult<&FrameBuffer> {
        let active = self.active.as_deref();
        match active.and_then(|n| self.slots.get_mut(n)).and_then(Option::as_mut) {
            Some(animation) => animation.get_frame(now),
            None => Ok(&self.placeholder),
        }
    }

    /// Bind or replace the animation of `name`. Never starts playback.
    ///
    /// On failure the previously bound animation stays in place.
    pub fn load_asset(&mut self, name: &str, source: Box<dyn FrameSource>) -> FaceResult<()> {
        let Some(slot) = self.slots.get_mut(name) else {
            return Err(FaceError::UnknownExpression(name.to_string()));
        };

        tracing::info!("Loading expression {} from {}", name, source.name());
        let animation = Animation::load(source, self.cache_limit)?;

        if let Some(previous) = slot.as_mut() {
            if previous.is_playing() {
                tracing::warn!("Stopping the playing animation of {} to replace it", name);
                previous.stop();
            }
        }
        *slot = Some(animation);
        Ok(())
    }

    /// Load every `<expression>.gif` or `<expression>.ppm` in `dir`.
    /// Returns how many loaded.
    ///
    /// Files that name no configured expression and assets that fail to
    /// load are logged and skipped.
    pub fn load_assets_from_dir(&mut self, dir: &Path) -> FaceResult<usize> {
        let entries = std::fs::read_dir(dir).map_err(|e| FaceError::asset(dir.display().to_string(), e))?;

        let mut paths: Vec<_> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        let mut loaded = 0;
        for path in paths {
            let Some(source) = source_for_path(&path) else {
                tracing::debug!("Skipping non-asset file {}", path.display());
                continue;
            };
            let Some(name) = path.file_stem().and_then(|s| s.to_str()).map(str::to_string) else {
                continue;
            };
            if !self.slots.contains_key(&name) {
                tracing::error!(
                    "Could not map file {} to any configured expression",
                    path.display()
                );
                continue;
            }

            match self.load_asset(&name, source) {
                Ok(()) => loaded += 1,
                Err(e) => tracing::error!("Failed to load {}: {}", path.display(), e),
            }
        }
        Ok(loaded)
    }

    /// Stop the active animation (teardown)
    pub fn shutdown(&mut self) {
        if let Some(animation) = self.active_animation_mut() {
            tracing::info!("Stopping the current animation");
            animation.stop();
        }
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn has_asset(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Some(_)))
    }

    pub fn is_playing(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Some(a)) if a.is_playing())
    }

    /// Number of animations currently playing (never more than one)
    pub fn playing_count(&self) -> usize {
        self.slots
            .values()
            .flatten()
            .filter(|a| a.is_playing())
            .count()
    }

    fn active_animation_mut(&mut self) -> Option<&mut Animation> {
        let name = self.active.as_deref()?;
        self.slots.get_mut(name)?.as_mut()
    }
}
