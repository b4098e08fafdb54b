//! Narration playback.
//!
//! Drives a single audio clip through `Idle -> Loading -> Ready ->
//! Playing <-> Paused -> Ended`. Binding a new clip releases the previous
//! sink and overwrites the cache file, so clips never accumulate on disk.

use anyhow::{anyhow, Context, Result};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
}

impl PlaybackState {
    pub fn status_text(&self) -> &'static str {
        match self {
            Self::Idle => "No narration yet",
            Self::Loading => "Generating...",
            Self::Ready => "Ready to play",
            Self::Playing => "Playing...",
            Self::Paused => "Paused",
            Self::Ended => "Finished",
        }
    }
}

pub struct AudioPlayer {
    state: PlaybackState,
    clip: Option<Vec<u8>>,
    clip_path: Option<PathBuf>,
    output: Option<(OutputStream, OutputStreamHandle)>,
    sink: Option<Sink>,
}

impl AudioPlayer {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            clip: None,
            clip_path: None,
            output: None,
            sink: None,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Where the current clip was saved, usable as a download affordance.
    pub fn clip_path(&self) -> Option<&Path> {
        self.clip_path.as_deref()
    }

    pub fn has_clip(&self) -> bool {
        self.clip.is_some()
    }

    /// Mark a narration fetch as in flight.
    pub fn begin_loading(&mut self) {
        self.stop_sink();
        self.state = PlaybackState::Loading;
    }

    /// A narration fetch failed; fall back to idle.
    pub fn fail_loading(&mut self) {
        self.state = PlaybackState::Idle;
    }

    /// Bind freshly fetched clip bytes, replacing any previous clip and
    /// its cache file.
    pub fn bind_clip(&mut self, bytes: Vec<u8>, cache_dir: &Path) -> Result<()> {
        self.stop_sink();
        fs::create_dir_all(cache_dir)
            .with_context(|| format!("creating cache dir {}", cache_dir.display()))?;
        let path = cache_dir.join("narration.mp3");
        fs::write(&path, &bytes)
            .with_context(|| format!("writing narration clip to {}", path.display()))?;
        debug!(bytes = bytes.len(), path = %path.display(), "narration clip bound");
        self.clip = Some(bytes);
        self.clip_path = Some(path);
        self.state = PlaybackState::Ready;
        Ok(())
    }

    /// Start or resume playback of the bound clip.
    pub fn play(&mut self) -> Result<()> {
        match self.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                if let Some(sink) = &self.sink {
                    sink.play();
                    self.state = PlaybackState::Playing;
                }
                Ok(())
            }
            PlaybackState::Ready | PlaybackState::Ended => self.start_sink(),
            PlaybackState::Idle | PlaybackState::Loading => Ok(()),
        }
    }

    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            if let Some(sink) = &self.sink {
                sink.pause();
            }
            self.state = PlaybackState::Paused;
        }
    }

    /// Poll the sink for natural end of playback. Called on the UI tick.
    pub fn tick(&mut self) {
        if self.state == PlaybackState::Playing {
            let drained = self.sink.as_ref().map(|s| s.empty()).unwrap_or(true);
            if drained {
                self.stop_sink();
                self.state = PlaybackState::Ended;
            }
        }
    }

    /// Drop the clip and any playback; used on session reset.
    pub fn release(&mut self) {
        self.stop_sink();
        self.clip = None;
        self.clip_path = None;
        self.state = PlaybackState::Idle;
    }

    fn start_sink(&mut self) -> Result<()> {
        let bytes = self
            .clip
            .clone()
            .ok_or_else(|| anyhow!("no narration clip bound"))?;
        if self.output.is_none() {
            let stream = OutputStream::try_default().context("opening audio output device")?;
            self.output = Some(stream);
        }
        let handle = match &self.output {
            Some((_, handle)) => handle,
            None => return Err(anyhow!("audio output unavailable")),
        };
        let sink = Sink::try_new(handle).context("creating audio sink")?;
        let source = Decoder::new(Cursor::new(bytes)).context("decoding narration clip")?;
        sink.append(source);
        sink.play();
        self.sink = Some(sink);
        self.state = PlaybackState::Playing;
        Ok(())
    }

    fn stop_sink(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Device-backed playback is not exercised here; these cover the clip
    // lifecycle and the transitions that do not need an output device.

    #[test]
    fn bind_clip_writes_and_overwrites_cache_file() {
        let dir = std::env::temp_dir().join("study-tutor-test-audio");
        let mut player = AudioPlayer::new();

        player.bind_clip(vec![1, 2, 3], &dir).unwrap();
        assert_eq!(player.state(), PlaybackState::Ready);
        let path = player.clip_path().unwrap().to_path_buf();
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);

        // A new clip reuses the same file rather than leaking a new one.
        player.bind_clip(vec![9, 9], &dir).unwrap();
        assert_eq!(player.clip_path().unwrap(), path.as_path());
        assert_eq!(fs::read(&path).unwrap(), vec![9, 9]);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn loading_transitions() {
        let mut player = AudioPlayer::new();
        assert_eq!(player.state(), PlaybackState::Idle);

        player.begin_loading();
        assert_eq!(player.state(), PlaybackState::Loading);

        player.fail_loading();
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn release_returns_to_idle_and_drops_clip() {
        let dir = std::env::temp_dir().join("study-tutor-test-audio-release");
        let mut player = AudioPlayer::new();
        player.bind_clip(vec![1], &dir).unwrap();
        assert!(player.has_clip());

        player.release();
        assert_eq!(player.state(), PlaybackState::Idle);
        assert!(!player.has_clip());
        assert!(player.clip_path().is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn play_without_clip_is_a_no_op() {
        let mut player = AudioPlayer::new();
        player.play().unwrap();
        assert_eq!(player.state(), PlaybackState::Idle);
    }

    #[test]
    fn pause_outside_playing_is_a_no_op() {
        let mut player = AudioPlayer::new();
        player.pause();
        assert_eq!(player.state(), PlaybackState::Idle);
    }
}
