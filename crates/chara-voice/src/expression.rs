//! Facial expression state machine.
//!
//! Combines the emotion channel, auto blink, and lip sync into per-channel
//! weights pushed through an [`ExpressionSink`]. Two scheduling domains write
//! here (the per-frame tick and the speech queue), so the state lives behind
//! a mutex and the delayed emotion apply carries a generation id: a newer
//! `play_emotion` call invalidates any apply still waiting on the eye-open
//! delay, and the stale apply is dropped when it fires.

use crate::blink::AutoBlink;
use crate::screenplay::Emotion;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// Damping for mouth movement while a non-neutral emotion is showing.
const LIP_SYNC_NEUTRAL_SCALE: f32 = 0.5;
const LIP_SYNC_EMOTION_SCALE: f32 = 0.25;

/// VRM-style expression channels the pipeline writes. `Ih`/`Ou`/`Ee`/`Oh` are
/// part of the mouth vocabulary; the amplitude sampler currently drives `Aa`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExpressionChannel {
    Neutral,
    Happy,
    Angry,
    Sad,
    Relaxed,
    Blink,
    Aa,
    Ih,
    Ou,
    Ee,
    Oh,
}

impl ExpressionChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpressionChannel::Neutral => "neutral",
            ExpressionChannel::Happy => "happy",
            ExpressionChannel::Angry => "angry",
            ExpressionChannel::Sad => "sad",
            ExpressionChannel::Relaxed => "relaxed",
            ExpressionChannel::Blink => "blink",
            ExpressionChannel::Aa => "aa",
            ExpressionChannel::Ih => "ih",
            ExpressionChannel::Ou => "ou",
            ExpressionChannel::Ee => "ee",
            ExpressionChannel::Oh => "oh",
        }
    }
}

impl From<Emotion> for ExpressionChannel {
    fn from(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Neutral => ExpressionChannel::Neutral,
            Emotion::Happy => ExpressionChannel::Happy,
            Emotion::Angry => ExpressionChannel::Angry,
            Emotion::Sad => ExpressionChannel::Sad,
            Emotion::Relaxed => ExpressionChannel::Relaxed,
        }
    }
}

/// Render-side collaborator receiving channel weights in [0, 1].
pub trait ExpressionSink: Send + Sync {
    fn set_weight(&self, channel: ExpressionChannel, weight: f32);
}

/// In-memory sink holding the latest weight per channel. Usable as a staging
/// buffer for a render bridge and as the assertion point in headless tests.
#[derive(Debug, Default)]
pub struct WeightTable {
    weights: Mutex<HashMap<ExpressionChannel, f32>>,
}

impl WeightTable {
    pub fn get(&self, channel: ExpressionChannel) -> f32 {
        self.weights
            .lock()
            .unwrap()
            .get(&channel)
            .copied()
            .unwrap_or(0.0)
    }
}

impl ExpressionSink for WeightTable {
    fn set_weight(&self, channel: ExpressionChannel, weight: f32) {
        self.weights.lock().unwrap().insert(channel, weight);
    }
}

struct LipSyncTarget {
    channel: ExpressionChannel,
    value: f32,
}

struct ExpressionState {
    auto_blink: AutoBlink,
    current_emotion: Emotion,
    current_lip_sync: Option<LipSyncTarget>,
    /// Bumped on every `play_emotion`; a scheduled apply only lands if its
    /// generation is still current.
    apply_generation: u64,
}

/// Handle to the expression state machine. Cloning shares the state; every
/// method takes `&self` and locks internally, so the speech queue and the
/// frame tick can both hold a handle.
#[derive(Clone)]
pub struct EmoteController {
    sink: Arc<dyn ExpressionSink>,
    state: Arc<Mutex<ExpressionState>>,
}

impl EmoteController {
    pub fn new(sink: Arc<dyn ExpressionSink>) -> Self {
        let state = ExpressionState {
            auto_blink: AutoBlink::new(sink.clone()),
            current_emotion: Emotion::Neutral,
            current_lip_sync: None,
            apply_generation: 0,
        };
        Self {
            sink,
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Switch the emotion channel. The previous non-neutral channel is zeroed
    /// first. A non-neutral target disables auto blink and is applied only
    /// after the eyes are guaranteed open; neutral re-enables auto blink and
    /// takes effect immediately.
    pub fn play_emotion(&self, emotion: Emotion) {
        let mut state = self.state.lock().unwrap();

        if state.current_emotion != Emotion::Neutral {
            self.sink
                .set_weight(ExpressionChannel::from(state.current_emotion), 0.0);
        }
        state.apply_generation += 1;

        if emotion == Emotion::Neutral {
            state.auto_blink.set_enabled(true);
            state.current_emotion = emotion;
            return;
        }

        let delay = state.auto_blink.set_enabled(false);
        state.current_emotion = emotion;
        let generation = state.apply_generation;
        drop(state);

        let channel = ExpressionChannel::from(emotion);
        if delay <= 0.0 {
            self.sink.set_weight(channel, 1.0);
            return;
        }

        debug!("deferring {} apply for {:.0}ms", channel.as_str(), delay * 1000.0);
        let sink = Arc::clone(&self.sink);
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f32(delay)).await;
            let state = state.lock().unwrap();
            if state.apply_generation == generation {
                sink.set_weight(channel, 1.0);
            } else {
                debug!("dropping stale {} apply", channel.as_str());
            }
        });
    }

    /// Stage a lip-sync weight for the next frame, zeroing the previously
    /// staged mouth channel.
    pub fn lip_sync(&self, channel: ExpressionChannel, value: f32) {
        let mut state = self.state.lock().unwrap();
        if let Some(prev) = state.current_lip_sync.take() {
            self.sink.set_weight(prev.channel, 0.0);
        }
        state.current_lip_sync = Some(LipSyncTarget { channel, value });
    }

    /// Per-frame tick: advance the blink timer and apply the staged lip-sync
    /// weight, damped while a non-neutral emotion is showing.
    pub fn update(&self, delta: f32) {
        if delta < 0.0 {
            warn!("ignoring negative frame delta: {delta}");
            return;
        }

        let mut state = self.state.lock().unwrap();
        state.auto_blink.update(delta);

        if let Some(ref target) = state.current_lip_sync {
            let scale = if state.current_emotion == Emotion::Neutral {
                LIP_SYNC_NEUTRAL_SCALE
            } else {
                LIP_SYNC_EMOTION_SCALE
            };
            self.sink.set_weight(target.channel, target.value * scale);
        }
    }

    pub fn current_emotion(&self) -> Emotion {
        self.state.lock().unwrap().current_emotion
    }

    /// Whether auto blink is currently enabled (for debugging and tests).
    pub fn blink_enabled(&self) -> bool {
        self.state.lock().unwrap().auto_blink.is_enabled()
    }
}
