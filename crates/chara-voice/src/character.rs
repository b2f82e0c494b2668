//! The talking character: amplitude sampler + expression state machine.
//!
//! This is the model object with the scene graph cut away. Rendering and the
//! audio device stay behind [`ExpressionSink`] and [`AudioPlayer`]; everything
//! here runs headless.

use crate::error::VoiceResult;
use crate::expression::{EmoteController, ExpressionChannel, ExpressionSink};
use crate::lip_sync::LipSync;
use crate::playback::AudioPlayer;
use crate::screenplay::Screenplay;
use std::sync::Arc;

/// Cloneable handle to one character. Clones share the lip-sync tap and the
/// expression state, so the speech queue and the frame loop can each hold one.
#[derive(Clone)]
pub struct Character {
    lip_sync: LipSync,
    emote: EmoteController,
}

impl Character {
    pub fn new(player: Arc<dyn AudioPlayer>, sink: Arc<dyn ExpressionSink>) -> Self {
        Self {
            lip_sync: LipSync::new(player),
            emote: EmoteController::new(sink),
        }
    }

    pub fn emote(&self) -> &EmoteController {
        &self.emote
    }

    pub fn lip_sync(&self) -> &LipSync {
        &self.lip_sync
    }

    /// Speak one segment: switch the emotion channel, then play the audio and
    /// wait for it to end naturally.
    pub async fn speak(&self, audio: Vec<u8>, screenplay: &Screenplay) -> VoiceResult<()> {
        self.emote.play_emotion(screenplay.emotion);
        let handle = self.lip_sync.play_bytes(audio)?;
        handle.finished().await;
        Ok(())
    }

    /// Per-frame tick: sample the live amplitude into the mouth channel, then
    /// advance blink and expression timers.
    pub fn update(&self, delta: f32) {
        let frame = self.lip_sync.sample();
        self.emote.lip_sync(ExpressionChannel::Aa, frame.volume);
        self.emote.update(delta);
    }
}
