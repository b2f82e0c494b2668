//! Reply text → ordered, emotion-tagged speech segments.
//!
//! A reply is split on sentence-ending punctuation (`。．！？` or newline),
//! keeping the delimiter on the preceding piece. Each piece may carry an inline
//! `[tag]`; a known tag overrides the sticky emotion for the rest of the reply,
//! anything else is stripped and ignored. Pure functions, no I/O.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[(.*?)\]").expect("valid tag regex"));

/// Model-side emotion presets. A segment without an explicit tag inherits the
/// previous segment's emotion within the same reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Angry,
    Sad,
    Relaxed,
}

impl Emotion {
    /// Parse an inline tag. Case-sensitive exact match; anything else is not a tag.
    pub fn parse_tag(tag: &str) -> Option<Emotion> {
        match tag {
            "neutral" => Some(Emotion::Neutral),
            "happy" => Some(Emotion::Happy),
            "angry" => Some(Emotion::Angry),
            "sad" => Some(Emotion::Sad),
            "relaxed" => Some(Emotion::Relaxed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Neutral => "neutral",
            Emotion::Happy => "happy",
            Emotion::Angry => "angry",
            Emotion::Sad => "sad",
            Emotion::Relaxed => "relaxed",
        }
    }
}

/// Speaking style passed to the synthesis API. `Fear` and `Surprised` are part
/// of the API vocabulary but unreachable from the current emotion set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TalkStyle {
    Talk,
    Happy,
    Sad,
    Angry,
    Fear,
    Surprised,
}

impl TalkStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            TalkStyle::Talk => "talk",
            TalkStyle::Happy => "happy",
            TalkStyle::Sad => "sad",
            TalkStyle::Angry => "angry",
            TalkStyle::Fear => "fear",
            TalkStyle::Surprised => "surprised",
        }
    }
}

impl From<Emotion> for TalkStyle {
    fn from(emotion: Emotion) -> Self {
        match emotion {
            Emotion::Angry => TalkStyle::Angry,
            Emotion::Happy => TalkStyle::Happy,
            Emotion::Sad => TalkStyle::Sad,
            Emotion::Neutral | Emotion::Relaxed => TalkStyle::Talk,
        }
    }
}

/// Speaker position on the synthesis voice map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceParam {
    pub speaker_x: f32,
    pub speaker_y: f32,
}

impl Default for VoiceParam {
    fn default() -> Self {
        Self {
            speaker_x: 3.0,
            speaker_y: 3.0,
        }
    }
}

/// One spoken sentence with its synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Talk {
    pub style: TalkStyle,
    pub speaker_x: f32,
    pub speaker_y: f32,
    pub message: String,
}

/// One speech segment: what to say plus the facial expression to show while
/// saying it. Produced as an ordered list per reply; immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Screenplay {
    pub emotion: Emotion,
    pub talk: Talk,
}

/// Split a reply on `。．！？` or newline, keeping the delimiter as the suffix
/// of the preceding piece. Empty pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    for ch in text.chars() {
        current.push(ch);
        if matches!(ch, '。' | '．' | '！' | '？' | '\n') {
            pieces.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Convert split pieces into screenplays, resolving `[tag]`s and the sticky
/// emotion. The sticky emotion starts at `Neutral` on every call: one call per
/// reply, fresh reply, fresh state.
pub fn texts_to_screenplay(texts: &[String], param: &VoiceParam) -> Vec<Screenplay> {
    let mut screenplays = Vec::with_capacity(texts.len());
    let mut prev_emotion = Emotion::Neutral;

    for text in texts {
        let tag = TAG_RE
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str());
        let message = TAG_RE.replace_all(text, "").into_owned();

        let emotion = match tag.and_then(Emotion::parse_tag) {
            Some(tagged) => {
                prev_emotion = tagged;
                tagged
            }
            None => prev_emotion,
        };

        screenplays.push(Screenplay {
            emotion,
            talk: Talk {
                style: TalkStyle::from(emotion),
                speaker_x: param.speaker_x,
                speaker_y: param.speaker_y,
                message,
            },
        });
    }

    screenplays
}

/// Full reply → screenplays in one step.
pub fn text_to_screenplay(text: &str, param: &VoiceParam) -> Vec<Screenplay> {
    texts_to_screenplay(&split_sentences(text), param)
}
