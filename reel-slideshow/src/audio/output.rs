//! Narration output using cpal
//!
//! The device callback drains a ring of interleaved stereo f32 samples at the
//! device rate. An empty ring plays silence. Streams are built on the thread that
//! keeps them alive, since cpal streams cannot move between threads.

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use ringbuf::traits::{Consumer, Observer};
use ringbuf::HeapCons;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Names of the host's output devices
pub fn list_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices: Vec<String> = host
        .output_devices()
        .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
        .filter_map(|device| device.name().ok())
        .collect();
    debug!("Found {} output devices", devices.len());
    Ok(devices)
}

/// An opened output device and the stream format it will be driven with
pub struct OutputDevice {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl OutputDevice {
    /// Open `name`, or the default device when `None` or not present
    pub fn open(name: Option<&str>) -> Result<Self> {
        let host = cpal::default_host();

        let named = match name {
            Some(name) => {
                let found = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
                    .find(|d| d.name().ok().as_deref() == Some(name));
                if found.is_none() {
                    warn!("Output device '{}' not found, using default", name);
                }
                found
            }
            None => None,
        };

        let device = match named {
            Some(device) => device,
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device".to_string()))?,
        };

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let sample_format = supported.sample_format();
        let config = supported.config();

        info!(
            "Narration output: {} ({} Hz, {} channels, {:?})",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            config.channels,
            sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Build a paused stream that plays from `ring`
    ///
    /// Stream errors are passed to `on_error` from the audio thread.
    pub fn build_stream(
        &self,
        ring: HeapCons<f32>,
        on_error: Arc<dyn Fn(String) + Send + Sync>,
    ) -> Result<Stream> {
        match self.sample_format {
            SampleFormat::F32 => self.build::<f32>(ring, on_error),
            SampleFormat::I16 => self.build::<i16>(ring, on_error),
            SampleFormat::U16 => self.build::<u16>(ring, on_error),
            other => Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            ))),
        }
    }

    fn build<T>(
        &self,
        mut ring: HeapCons<f32>,
        on_error: Arc<dyn Fn(String) + Send + Sync>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = self.config.channels as usize;
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    fill_from_ring(data, channels, &mut ring);
                },
                move |err| {
                    error!("Narration stream error: {}", err);
                    on_error(err.to_string());
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

/// Write one device buffer from stereo ring samples
///
/// Mono devices get the average of both sides; channels past the second are
/// silent. Returns the number of frames that had audio.
fn fill_from_ring<T, C>(data: &mut [T], channels: usize, ring: &mut C) -> usize
where
    T: Sample + FromSample<f32>,
    C: Consumer<Item = f32>,
{
    let mut played = 0;
    for frame in data.chunks_mut(channels.max(1)) {
        let (left, right) = if ring.occupied_len() >= 2 {
            played += 1;
            (
                ring.try_pop().unwrap_or_default(),
                ring.try_pop().unwrap_or_default(),
            )
        } else {
            (0.0, 0.0)
        };

        if frame.len() == 1 {
            frame[0] = T::from_sample(((left + right) * 0.5).clamp(-1.0, 1.0));
            continue;
        }
        for (channel, slot) in frame.iter_mut().enumerate() {
            let value = match channel {
                0 => left,
                1 => right,
                _ => 0.0,
            };
            *slot = T::from_sample(value.clamp(-1.0, 1.0));
        }
    }
    played
}

#[cfg(test)]
mod tests {
    use super::*;
    use ringbuf::traits::{Producer, Split};
    use ringbuf::HeapRb;

    fn ring_with(samples: &[f32]) -> HeapCons<f32> {
        let (mut prod, cons) = HeapRb::<f32>::new(64).split();
        assert_eq!(prod.push_slice(samples), samples.len());
        cons
    }

    #[test]
    fn test_fill_stereo_then_silence() {
        let mut ring = ring_with(&[0.25, -0.25, 0.5, -0.5]);
        let mut data = [1.0f32; 6];

        let played = fill_from_ring(&mut data, 2, &mut ring);

        assert_eq!(played, 2);
        assert_eq!(data, [0.25, -0.25, 0.5, -0.5, 0.0, 0.0]);
    }

    #[test]
    fn test_fill_mono_device_averages() {
        let mut ring = ring_with(&[0.2, 0.6]);
        let mut data = [0.0f32; 1];

        fill_from_ring(&mut data, 1, &mut ring);

        assert!((data[0] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_fill_extra_channels_silent_and_clamped() {
        let mut ring = ring_with(&[2.0, -2.0]);
        let mut data = [9i16; 4];

        fill_from_ring(&mut data, 4, &mut ring);

        assert_eq!(data[0], i16::MAX);
        assert!(data[1] <= -i16::MAX);
        assert_eq!(&data[2..], &[0, 0]);
    }

    #[test]
    fn test_fill_unsigned_silence_is_midpoint() {
        let mut ring = ring_with(&[]);
        let mut data = [0u16; 2];

        assert_eq!(fill_from_ring(&mut data, 2, &mut ring), 0);
        assert_eq!(data, [u16::EQUILIBRIUM, u16::EQUILIBRIUM]);
    }
}
