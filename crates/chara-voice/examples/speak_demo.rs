//! Talking-character demo: type reply lines, hear them spoken in order.
//!
//! Each line is segmented, synthesized under the 1s fetch cooldown, and played
//! back in submission order while a frame task derives blink/mouth weights.
//! Inline `[happy]`/`[sad]`/... tags switch the emotion channel.
//!
//! Set `TTS_API_URL` (and optionally `TTS_API_KEY`) in `.env` for real
//! synthesis; without them a placeholder backend keeps the pipeline silent.

use anyhow::Result;
use chara_voice::{
    text_to_screenplay, AudioPlayer, Character, ExpressionChannel, FrameConfig, FrameDriver,
    KoeiromapTts, PlaceholderTts, RodioPlayer, SilentPlayer, Speaker, SpeakerConfig, TtsBackend,
    VoiceParam, WeightTable,
};
use std::io::BufRead;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let tts: Arc<dyn TtsBackend> = match KoeiromapTts::from_env() {
        Ok(t) => {
            info!("Using the koeiromap-style TTS endpoint from TTS_API_URL.");
            Arc::new(t)
        }
        Err(e) => {
            info!("Using PlaceholderTts ({e}); segments will be silent.");
            Arc::new(PlaceholderTts)
        }
    };

    let player: Arc<dyn AudioPlayer> = match RodioPlayer::new() {
        Ok(p) => Arc::new(p),
        Err(e) => {
            info!("No audio device ({e}); running silent.");
            Arc::new(SilentPlayer)
        }
    };

    let weights = Arc::new(WeightTable::default());
    let character = Character::new(player, weights.clone());
    let driver = FrameDriver::start(character.clone(), FrameConfig::default());
    let speaker = Speaker::spawn(tts, character, SpeakerConfig::default());
    let param = VoiceParam::default();

    info!("Type a reply per line (e.g. \"今天天气很好。[happy]你喜欢吗？\"). Ctrl+D to quit.");

    for line in std::io::stdin().lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        for (i, play) in text_to_screenplay(&line, &param).into_iter().enumerate() {
            let message = play.talk.message.clone();
            let weights = Arc::clone(&weights);
            speaker.speak(
                play,
                Some(Box::new(move || info!("segment {i}: {message}"))),
                Some(Box::new(move || {
                    info!(
                        "segment {i} done (blink {:.2}, mouth {:.2})",
                        weights.get(ExpressionChannel::Blink),
                        weights.get(ExpressionChannel::Aa),
                    )
                })),
            )?;
        }
    }

    driver.stop();
    speaker.shutdown().await;
    Ok(())
}
