//! Chunked sample rate conversion for narration streams
//!
//! Decoded packets vary in size; rubato's fixed-input resampler wants whole
//! chunks. Input is buffered per channel until a chunk is ready, and `flush()`
//! pushes out whatever remains at end of stream.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Input frames per resampler call
const CHUNK_FRAMES: usize = 1024;

/// Streaming converter for interleaved stereo f32
pub struct StreamResampler {
    /// `None` when both rates match
    inner: Option<FastFixedIn<f32>>,
    pending: [Vec<f32>; 2],
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32) -> Result<Self> {
        if input_rate == output_rate {
            debug!("Narration already at {} Hz, no resampling", output_rate);
            return Ok(Self {
                inner: None,
                pending: [Vec::new(), Vec::new()],
            });
        }

        debug!("Resampling narration {} Hz -> {} Hz", input_rate, output_rate);
        let inner = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Cubic,
            CHUNK_FRAMES,
            2,
        )
        .map_err(|e| Error::Audio(format!("Failed to create resampler: {}", e)))?;

        Ok(Self {
            inner: Some(inner),
            pending: [
                Vec::with_capacity(CHUNK_FRAMES * 2),
                Vec::with_capacity(CHUNK_FRAMES * 2),
            ],
        })
    }

    /// Convert `stereo`, returning every full chunk's output
    pub fn push(&mut self, stereo: &[f32]) -> Result<Vec<f32>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(stereo.to_vec());
        };

        for frame in stereo.chunks_exact(2) {
            self.pending[0].push(frame[0]);
            self.pending[1].push(frame[1]);
        }

        let mut out = Vec::new();
        while self.pending[0].len() >= inner.input_frames_next() {
            let needed = inner.input_frames_next();
            let chunk = [&self.pending[0][..needed], &self.pending[1][..needed]];
            let planar = inner
                .process(&chunk[..], None)
                .map_err(|e| Error::Audio(format!("Resampling failed: {}", e)))?;
            interleave_into(&planar, &mut out);
            for channel in &mut self.pending {
                channel.drain(..needed);
            }
        }
        Ok(out)
    }

    /// Convert the buffered tail at end of stream
    pub fn flush(&mut self) -> Result<Vec<f32>> {
        let Some(inner) = self.inner.as_mut() else {
            return Ok(Vec::new());
        };
        if self.pending[0].is_empty() {
            return Ok(Vec::new());
        }

        let chunk = [&self.pending[0][..], &self.pending[1][..]];
        let planar = inner
            .process_partial(Some(&chunk[..]), None)
            .map_err(|e| Error::Audio(format!("Resampling failed: {}", e)))?;
        for channel in &mut self.pending {
            channel.clear();
        }

        let mut out = Vec::new();
        interleave_into(&planar, &mut out);
        Ok(out)
    }
}

fn interleave_into(planar: &[Vec<f32>], out: &mut Vec<f32>) {
    if let [left, right] = planar {
        out.reserve(left.len() * 2);
        for (l, r) in left.iter().zip(right) {
            out.push(*l);
            out.push(*r);
        }
    }
}
