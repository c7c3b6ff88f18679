//! Short-time Fourier transform producing the normalized magnitude matrix.
//!
//! The transform uses an FFT of `2 * bands` samples, a periodic Hann window
//! and a hop of one video frame (`sample_rate / fps` samples). The signal is
//! zero padded by half a window on both sides so frame `t` is centered on
//! sample `t * hop`. Only the first `bands` bins are kept and the whole
//! matrix is divided by its global maximum.

use rustfft::{num_complex::Complex, FftPlanner};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StftError {
    #[error("Hop size is zero (sample rate {sample_rate} Hz at {fps} fps)")]
    ZeroHop { sample_rate: u32, fps: u32 },

    #[error("Frequency band count must be positive")]
    NoBands,

    #[error("Column {index} has {len} bins, expected {expected}")]
    RaggedColumn {
        index: usize,
        len: usize,
        expected: usize,
    },
}

/// Magnitude matrix, stored frame by frame.
#[derive(Debug, Clone)]
pub struct Spectrogram {
    bins: usize,
    frames: usize,
    sample_rate: u32,
    data: Vec<f32>,
}

impl Spectrogram {
    /// Build from per-frame columns that are already normalized.
    pub fn from_columns(sample_rate: u32, columns: &[Vec<f32>]) -> Result<Self, StftError> {
        let bins = columns.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(bins * columns.len());
        for (index, column) in columns.iter().enumerate() {
            if column.len() != bins {
                return Err(StftError::RaggedColumn {
                    index,
                    len: column.len(),
                    expected: bins,
                });
            }
            data.extend_from_slice(column);
        }
        Ok(Self {
            bins,
            frames: columns.len(),
            sample_rate,
            data,
        })
    }

    /// All-zero matrix, i.e. a silent track.
    pub fn silent(sample_rate: u32, bins: usize, frames: usize) -> Self {
        Self {
            bins,
            frames,
            sample_rate,
            data: vec![0.0; bins * frames],
        }
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Magnitudes of frame `t`, one per bin.
    pub fn frame(&self, t: usize) -> &[f32] {
        &self.data[t * self.bins..(t + 1) * self.bins]
    }

    pub fn iter_frames(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on zero, and a zero-bin matrix has no data anyway
        self.data.chunks_exact(self.bins.max(1))
    }

    /// Center frequency in Hz of every bin, evenly spaced from 0 to Nyquist.
    pub fn frequency_axis(&self) -> Vec<f32> {
        let nyquist = (self.sample_rate / 2) as f32;
        match self.bins {
            0 => Vec::new(),
            1 => vec![0.0],
            n => (0..n)
                .map(|b| nyquist * b as f32 / (n - 1) as f32)
                .collect(),
        }
    }

    pub fn max_magnitude(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }
}

/// Periodic Hann window of length `n`.
fn hann_window(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| 0.5 - 0.5 * (std::f32::consts::TAU * i as f32 / n as f32).cos())
        .collect()
}

/// Compute the normalized spectrogram of a mono signal.
///
/// At most `max_frames` frames are produced.
pub fn compute_spectrogram(
    samples: &[f32],
    sample_rate: u32,
    fps: u32,
    bands: usize,
    max_frames: usize,
) -> Result<Spectrogram, StftError> {
    if bands == 0 {
        return Err(StftError::NoBands);
    }
    let hop = sample_rate.checked_div(fps).unwrap_or(0) as usize;
    if hop == 0 {
        return Err(StftError::ZeroHop { sample_rate, fps });
    }

    let n_fft = bands * 2;
    let pad = n_fft / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let available = if padded.len() >= n_fft {
        1 + (padded.len() - n_fft) / hop
    } else {
        0
    };
    let frames = available.min(max_frames);

    let window = hann_window(n_fft);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);
    let mut buffer = vec![Complex::new(0.0f32, 0.0); n_fft];
    let mut scratch = vec![Complex::new(0.0f32, 0.0); fft.get_inplace_scratch_len()];

    let mut data = Vec::with_capacity(frames * bands);
    for t in 0..frames {
        let start = t * hop;
        for ((slot, &s), &w) in buffer
            .iter_mut()
            .zip(&padded[start..start + n_fft])
            .zip(&window)
        {
            *slot = Complex::new(s * w, 0.0);
        }
        fft.process_with_scratch(&mut buffer, &mut scratch);
        data.extend(buffer[..bands].iter().map(|c| c.norm()));
    }

    let mut spectrogram = Spectrogram {
        bins: bands,
        frames,
        sample_rate,
        data,
    };
    let peak = spectrogram.max_magnitude();
    if peak > 0.0 {
        spectrogram.data.iter_mut().for_each(|m| *m /= peak);
    }

    log::debug!(
        "STFT: {} frames x {} bins (n_fft {}, hop {}), peak {:.3}",
        frames,
        bands,
        n_fft,
        hop,
        peak
    );
    Ok(spectrogram)
}
