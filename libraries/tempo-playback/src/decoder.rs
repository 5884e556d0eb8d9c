//! Payload decoding and validation
//!
//! Servers hand out audio as base64. Some of them send a text placeholder
//! ("Audio data for ...") instead of real audio, so every payload is
//! classified by its leading bytes before it reaches the engine.

use crate::engine::AudioEngine;
use crate::error::{PayloadRejection, PlaybackError, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Standard alphabet, padding optional (browsers' `atob` behaves the same)
const FORGIVING_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Case-insensitive marker of a placeholder payload
const PLACEHOLDER_MARKER: &[u8] = b"audio data";

/// Container recognised from a payload's signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// MP3 with a leading ID3v2 tag
    Id3,
    /// RIFF/WAV
    Wav,
    /// Ogg container
    Ogg,
    /// Native FLAC
    Flac,
    /// Bare MPEG audio frame
    Mpeg,
}

impl AudioFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Id3 | AudioFormat::Mpeg => "audio/mpeg",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Flac => "audio/flac",
        }
    }
}

/// Classification of decoded bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Audio(AudioFormat),
    Placeholder,
    Unrecognized,
}

/// Validated audio bytes, ready to hand to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    bytes: Arc<[u8]>,
    format: AudioFormat,
}

impl AudioPayload {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Identify a container by its leading bytes
pub fn detect_format(bytes: &[u8]) -> Option<AudioFormat> {
    match bytes {
        [b'I', b'D', b'3', ..] => Some(AudioFormat::Id3),
        [b'R', b'I', b'F', b'F', ..] => Some(AudioFormat::Wav),
        [b'O', b'g', b'g', b'S', ..] => Some(AudioFormat::Ogg),
        [b'f', b'L', b'a', b'C', ..] => Some(AudioFormat::Flac),
        [0xFF, 0xFB | 0xFA | 0xF3 | 0xF2, ..] => Some(AudioFormat::Mpeg),
        _ => None,
    }
}

/// Whether decoded bytes start with the placeholder marker
pub fn is_placeholder(bytes: &[u8]) -> bool {
    bytes
        .get(..PLACEHOLDER_MARKER.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(PLACEHOLDER_MARKER))
}

/// Classify decoded bytes
///
/// Anything that is neither a known signature nor a placeholder is
/// unrecognized and will be refused, whatever its size.
pub fn classify(bytes: &[u8]) -> PayloadKind {
    if let Some(format) = detect_format(bytes) {
        PayloadKind::Audio(format)
    } else if is_placeholder(bytes) {
        PayloadKind::Placeholder
    } else {
        PayloadKind::Unrecognized
    }
}

/// Decode base64, tolerating whitespace, missing padding and a `data:` URI prefix
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    let body = match encoded.split_once(";base64,") {
        Some((prefix, body)) if prefix.starts_with("data:") => body,
        _ => encoded,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    FORGIVING_BASE64
        .decode(compact.as_bytes())
        .map_err(|_| PlaybackError::InvalidAudioPayload(PayloadRejection::NotBase64))
}

/// Decode and validate a base64 payload
pub fn decode_payload(encoded: &str) -> Result<AudioPayload> {
    let bytes = decode_base64(encoded)?;
    if bytes.is_empty() {
        return Err(PlaybackError::InvalidAudioPayload(PayloadRejection::Empty));
    }

    match classify(&bytes) {
        PayloadKind::Audio(format) => {
            debug!(?format, size = bytes.len(), "Payload validated");
            Ok(AudioPayload {
                bytes: bytes.into(),
                format,
            })
        }
        PayloadKind::Placeholder => Err(PlaybackError::InvalidAudioPayload(
            PayloadRejection::Placeholder,
        )),
        PayloadKind::Unrecognized => Err(PlaybackError::InvalidAudioPayload(
            PayloadRejection::UnrecognizedFormat,
        )),
    }
}

/// Decode, validate and load a base64 payload into the engine
pub async fn load_encoded(engine: &AudioEngine, encoded: &str) -> Result<AudioPayload> {
    let payload = decode_payload(encoded)?;
    engine.load(&payload).await?;
    Ok(payload)
}
