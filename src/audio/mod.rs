//! Audio decoding and the short-time Fourier transform.
//!
//! - Decoding via Symphonia (WAV, MP3, FLAC, AAC)
//! - STFT via RustFFT, one column per video frame
//! - Synthetic signals for tests and benches

pub mod loader;
pub mod stft;
pub mod synth;

pub use loader::{load_audio, AudioClip, AudioError};
pub use stft::{compute_spectrogram, Spectrogram, StftError};
pub use synth::{generate_gated_tone, generate_sine, generate_sweep, generate_white_noise};
