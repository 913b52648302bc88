//! ISO-BMFF audio container engine: parses MP4 byte streams into a box tree,
//! extracts the audio elementary stream (ADTS or MP3), remuxes it into a
//! standalone M4A container, and packages raw AAC bitstreams back into MP4.

use thiserror::Error;

pub mod bit;
pub mod r#box;
pub mod descriptor;
pub mod extract;
pub mod finder;
pub mod mux;
pub mod sample;

#[cfg(test)]
pub(crate) mod test_support;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error")]
    Io(#[from] std::io::Error),

    #[error("malformed container: {0}")]
    MalformedContainer(&'static str),

    #[error("no trak with a soun handler")]
    NoAudioTrack,

    #[error("sample table mismatch: stsz holds {expected} samples, chunks map {actual}")]
    SampleTableMismatch { expected: u64, actual: u64 },

    #[error("unsupported object type indication: {0:#04x}")]
    UnsupportedCodec(u8),

    #[error("unsupported sample rate: {0}")]
    UnsupportedSampleRate(u32),

    #[error("read past end of buffer")]
    BufferUnderrun,
}

pub type Result<T> = std::result::Result<T, Error>;

pub use crate::{
    descriptor::{audio_specific_config, Codec},
    extract::{extract_audio, extract_raw_audio, RawAudio},
    mux::aac_to_m4a,
    r#box::parse,
};
