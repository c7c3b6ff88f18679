//! Asymmetric exponential moving averages.

/// Attack/release blend weights for one smoothed quantity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmaRates {
    /// Weight of a rising sample.
    pub up: f32,
    /// Weight of a falling (or equal) sample.
    pub down: f32,
}

/// Blend `new_value` into `previous`, using `alpha_up` when rising and
/// `alpha_down` otherwise.
#[inline]
pub fn smooth(previous: f32, new_value: f32, alpha_up: f32, alpha_down: f32) -> f32 {
    let alpha = if new_value > previous {
        alpha_up
    } else {
        alpha_down
    };
    alpha * new_value + (1.0 - alpha) * previous
}

/// [`smooth`] applied per channel.
pub fn smooth_vec<const N: usize>(
    previous: [f32; N],
    new_value: [f32; N],
    rates: EmaRates,
) -> [f32; N] {
    std::array::from_fn(|i| smooth(previous[i], new_value[i], rates.up, rates.down))
}

/// A scalar EMA that owns its previous value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    value: f32,
    rates: EmaRates,
}

impl Ema {
    pub fn new(initial: f32, rates: EmaRates) -> Self {
        Self {
            value: initial,
            rates,
        }
    }

    pub fn update(&mut self, sample: f32) -> f32 {
        self.value = smooth(self.value, sample, self.rates.up, self.rates.down);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }
}

/// Independent EMAs over a fixed number of channels.
#[derive(Debug, Clone, PartialEq)]
pub struct EmaBank {
    values: Vec<f32>,
    rates: EmaRates,
}

impl EmaBank {
    pub fn new(channels: usize, rates: EmaRates) -> Self {
        Self {
            values: vec![0.0; channels],
            rates,
        }
    }

    /// Extra samples are ignored, missing ones leave their channel untouched.
    pub fn update(&mut self, samples: &[f32]) -> &[f32] {
        for (value, &sample) in self.values.iter_mut().zip(samples) {
            *value = smooth(*value, sample, self.rates.up, self.rates.down);
        }
        &self.values
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_attack_weight_applies_when_rising() {
        assert_relative_eq!(smooth(0.0, 1.0, 0.8, 0.2), 0.8);
    }

    #[test]
    fn test_release_weight_applies_when_falling() {
        assert_relative_eq!(smooth(1.0, 0.0, 0.8, 0.2), 0.8);
    }

    #[test]
    fn test_repeat_input_is_fixed_point() {
        let mut value = 0.37;
        for _ in 0..100 {
            value = smooth(value, 0.37, 0.9, 0.1);
        }
        assert_relative_eq!(value, 0.37);
    }

    #[test]
    fn test_ema_converges_to_constant_input() {
        let mut ema = Ema::new(
            0.0,
            EmaRates {
                up: 0.3,
                down: 0.05,
            },
        );
        for _ in 0..200 {
            ema.update(1.0);
        }
        assert_relative_eq!(ema.value(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_vector_variant_is_per_channel() {
        let rates = EmaRates { up: 0.5, down: 0.25 };
        let out = smooth_vec([0.0, 1.0, 0.5], [1.0, 0.0, 0.5], rates);
        assert_eq!(out, [0.5, 0.75, 0.5]);
    }

    #[test]
    fn test_bank_tracks_channels_independently() {
        let mut bank = EmaBank::new(2, EmaRates { up: 0.5, down: 0.5 });
        bank.update(&[1.0, 0.0]);
        assert_eq!(bank.update(&[1.0, 0.0]), &[0.75, 0.0]);
    }
}
