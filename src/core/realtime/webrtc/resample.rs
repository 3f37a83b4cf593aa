//! Streaming mono sample-rate conversion with rubato.
//!
//! Audio callbacks deliver arbitrary chunk sizes while `SincFixedIn` wants a
//! fixed input length, so input is buffered until a full chunk is available.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use tracing::debug;

use crate::core::realtime::base::{TransportError, TransportResult};

/// Input chunks are 20 ms long, one PCMU frame's worth of time.
const CHUNKS_PER_SECOND: u32 = 50;

/// Mono resampler that keeps filter state across calls.
pub struct StreamResampler {
    /// `None` when the rates match
    inner: Option<SincFixedIn<f32>>,
    pending: Vec<f32>,
    input_rate: u32,
    output_rate: u32,
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> TransportResult<Self> {
        if input_rate == 0 || output_rate == 0 {
            return Err(TransportError::Media(
                "Sample rates must be greater than 0".into(),
            ));
        }

        let inner = if input_rate == output_rate {
            None
        } else {
            // Speech band only; a short filter keeps per-callback latency low
            let params = SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 128,
                window: WindowFunction::BlackmanHarris2,
            };
            let chunk_size = (input_rate / CHUNKS_PER_SECOND).max(1) as usize;
            let resampler = SincFixedIn::<f32>::new(
                output_rate as f64 / input_rate as f64,
                1.0,
                params,
                chunk_size,
                1,
            )
            .map_err(|e| TransportError::Media(format!("Failed to create resampler: {e}")))?;
            Some(resampler)
        };

        debug!("Created resampler: {} Hz -> {} Hz", input_rate, output_rate);
        Ok(Self {
            inner,
            pending: Vec::new(),
            input_rate,
            output_rate,
        })
    }

    pub fn input_rate(&self) -> u32 {
        self.input_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// Resample `input`, appending whatever full chunks produce to `output`.
    /// A partial chunk stays buffered for the next call.
    pub fn process(&mut self, input: &[f32], output: &mut Vec<f32>) -> TransportResult<()> {
        let Some(resampler) = self.inner.as_mut() else {
            output.extend_from_slice(input);
            return Ok(());
        };

        self.pending.extend_from_slice(input);
        let mut consumed = 0;
        while self.pending.len() - consumed >= resampler.input_frames_next() {
            let needed = resampler.input_frames_next();
            let chunk = &self.pending[consumed..consumed + needed];
            let resampled = resampler
                .process(&[chunk], None)
                .map_err(|e| TransportError::Media(format!("Resampling failed: {e}")))?;
            if let Some(channel) = resampled.first() {
                output.extend_from_slice(channel);
            }
            consumed += needed;
        }
        self.pending.drain(..consumed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rates_rejected() {
        assert!(StreamResampler::new(0, 8_000).is_err());
        assert!(StreamResampler::new(48_000, 0).is_err());
    }

    #[test]
    fn test_matching_rates_pass_through() {
        let mut resampler = StreamResampler::new(8_000, 8_000).unwrap();
        let mut output = Vec::new();
        resampler.process(&[0.1, 0.2, 0.3], &mut output).unwrap();
        assert_eq!(output, vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_downsample_buffers_partial_chunks() {
        let mut resampler = StreamResampler::new(48_000, 8_000).unwrap();
        let mut output = Vec::new();

        // Less than one 20 ms chunk produces nothing yet
        resampler.process(&[0.25; 500], &mut output).unwrap();
        assert!(output.is_empty());

        // Five chunks in uneven pieces
        resampler.process(&[0.25; 460], &mut output).unwrap();
        for _ in 0..4 {
            resampler.process(&[0.25; 960], &mut output).unwrap();
        }
        assert!(
            (700..=820).contains(&output.len()),
            "unexpected output length {}",
            output.len()
        );
    }

    #[test]
    fn test_upsample_grows_output() {
        let mut resampler = StreamResampler::new(8_000, 48_000).unwrap();
        let mut output = Vec::new();
        resampler.process(&[0.5; 1_600], &mut output).unwrap();
        assert!(output.len() > 1_600 * 5);
    }
}
