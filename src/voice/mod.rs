//! Voice synthesis and cloning (ElevenLabs)

pub mod elevenlabs;

pub use elevenlabs::{AudioSample, ElevenLabsClient, ElevenLabsError, VoiceInfo, VoiceSettings};
