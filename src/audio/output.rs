// Audio output using cpal
// Feeds the device callback through a ring buffer

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, Stream, StreamConfig, SupportedStreamConfig};
use ringbuf::{HeapRb, traits::{Consumer, Observer, Producer, Split}};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{PlayerError, Result};

type RingProducer = ringbuf::HeapProd<f32>;
type RingConsumer = ringbuf::HeapCons<f32>;

/// How long a full buffer may stay full before the device is written off.
const STALL_TIMEOUT: Duration = Duration::from_secs(2);

/// How long `clear` waits for a running callback to throw the old samples away.
const CLEAR_TIMEOUT: Duration = Duration::from_millis(100);

/// Output parameters taken from the settings file.
#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub buffer_ms: u32,
    pub volume: f32,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            buffer_ms: 250,
            volume: 1.0,
        }
    }
}

/// An open output device. Dropping it stops the stream.
///
/// Not `Send`: cpal streams must stay on the thread that built them.
pub struct AudioOutput {
    stream: Stream,
    producer: RingProducer,
    clear_flag: Arc<AtomicBool>,
    paused: bool,
    source_channels: usize,
    channels: usize,
}

impl AudioOutput {
    /// Open the default device for a stream with the given geometry.
    pub fn open(sample_rate: u32, source_channels: usize, options: OutputOptions) -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| PlayerError::DeviceUnavailable("no output device available".into()))?;

        let config = Self::pick_config(&device, sample_rate, source_channels)?;
        if config.sample_rate().0 != sample_rate {
            log::warn!(
                "[Output] Device does not support {} Hz, playing at {} Hz",
                sample_rate,
                config.sample_rate().0
            );
        }

        let channels = config.channels() as usize;
        let capacity = (options.buffer_ms as usize * config.sample_rate().0 as usize / 1000 * channels)
            .max(channels * 1152);
        let (producer, consumer) = HeapRb::<f32>::new(capacity).split();
        let volume = options.volume.clamp(0.0, 1.0);
        let clear_flag = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&clear_flag);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                Self::build_stream::<f32>(&device, &config.config(), consumer, volume, flag)?
            }
            cpal::SampleFormat::I16 => {
                Self::build_stream::<i16>(&device, &config.config(), consumer, volume, flag)?
            }
            cpal::SampleFormat::U16 => {
                Self::build_stream::<u16>(&device, &config.config(), consumer, volume, flag)?
            }
            format => {
                return Err(PlayerError::DeviceUnavailable(format!(
                    "unsupported sample format: {:?}",
                    format
                )))
            }
        };

        stream
            .play()
            .map_err(|e| PlayerError::DeviceUnavailable(format!("failed to start stream: {}", e)))?;

        Ok(Self {
            stream,
            producer,
            clear_flag,
            paused: false,
            source_channels: source_channels.max(1),
            channels,
        })
    }

    /// Prefer a config running at the track's own rate; fall back to the device default.
    fn pick_config(
        device: &cpal::Device,
        sample_rate: u32,
        channels: usize,
    ) -> Result<SupportedStreamConfig> {
        let wanted = SampleRate(sample_rate);
        if let Ok(ranges) = device.supported_output_configs() {
            let mut fallback = None;
            for range in ranges {
                if range.min_sample_rate() > wanted || range.max_sample_rate() < wanted {
                    continue;
                }
                if range.channels() as usize == channels {
                    return Ok(range.with_sample_rate(wanted));
                }
                fallback.get_or_insert(range.with_sample_rate(wanted));
            }
            if let Some(config) = fallback {
                return Ok(config);
            }
        }

        device
            .default_output_config()
            .map_err(|e| PlayerError::DeviceUnavailable(format!("no usable output config: {}", e)))
    }

    fn build_stream<T: cpal::SizedSample + cpal::FromSample<f32>>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut consumer: RingConsumer,
        volume: f32,
        clear_flag: Arc<AtomicBool>,
    ) -> Result<Stream> {
        device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    fill_buffer(data, &mut consumer, volume, &clear_flag);
                },
                move |err| {
                    log::error!("[Output] Audio output error: {}", err);
                },
                None,
            )
            .map_err(|e| PlayerError::DeviceUnavailable(format!("failed to build output stream: {}", e)))
    }

    /// Write interleaved samples, waiting for buffer space as needed.
    ///
    /// Channel counts that differ from the device are remapped: missing channels
    /// repeat the last source channel, extra source channels are dropped.
    pub fn write_blocking(&mut self, samples: &[f32]) -> Result<()> {
        let mapped;
        let mut remaining: &[f32] = if self.source_channels == self.channels {
            samples
        } else {
            mapped = remap_channels(samples, self.source_channels, self.channels);
            &mapped
        };

        let mut last_progress = Instant::now();
        while !remaining.is_empty() {
            let written = self.producer.push_slice(remaining);
            if written > 0 {
                remaining = &remaining[written..];
                last_progress = Instant::now();
            } else if last_progress.elapsed() > STALL_TIMEOUT {
                return Err(PlayerError::DeviceUnavailable("output stopped consuming samples".into()));
            } else {
                // Buffer full, wait a bit
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        Ok(())
    }

    /// Throw away everything written but not yet played (after a seek).
    ///
    /// The callback does the draining. While the stream runs this waits briefly for
    /// it, so samples written afterwards are not caught by the same clear.
    pub fn clear(&self) {
        self.clear_flag.store(true, Ordering::SeqCst);
        if !self.paused {
            self.wait_for_clear();
        }
    }

    /// Stop or restart the device stream. Buffered samples stay put while paused.
    pub fn set_paused(&mut self, paused: bool) {
        if paused == self.paused {
            return;
        }
        let result = if paused {
            self.stream.pause().map_err(|e| e.to_string())
        } else {
            self.stream.play().map_err(|e| e.to_string())
        };
        match result {
            Ok(()) => {
                self.paused = paused;
                if !paused {
                    // A clear requested while paused must land before new samples arrive
                    self.wait_for_clear();
                }
            }
            Err(e) => {
                let action = if paused { "pause" } else { "resume" };
                log::warn!("[Output] Could not {} stream: {}", action, e);
            }
        }
    }

    fn wait_for_clear(&self) {
        let started = Instant::now();
        while self.clear_flag.load(Ordering::SeqCst) && started.elapsed() < CLEAR_TIMEOUT {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// Wait until everything written so far has been handed to the device.
    pub fn drain(&self) {
        let started = Instant::now();
        while self.producer.occupied_len() > 0 && started.elapsed() < STALL_TIMEOUT {
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

/// Device callback body: honour a pending clear, then pop samples or play silence.
fn fill_buffer<T: cpal::SizedSample + cpal::FromSample<f32>>(
    data: &mut [T],
    consumer: &mut RingConsumer,
    volume: f32,
    clear_flag: &AtomicBool,
) {
    if clear_flag.swap(false, Ordering::SeqCst) {
        while consumer.try_pop().is_some() {}
    }
    for sample in data.iter_mut() {
        let value = consumer.try_pop().unwrap_or(0.0) * volume;
        *sample = T::from_sample(value);
    }
}

fn remap_channels(samples: &[f32], from: usize, to: usize) -> Vec<f32> {
    let frames = samples.len() / from;
    let mut out = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        for ch in 0..to {
            out.push(frame[ch.min(from - 1)]);
        }
    }
    out
}
