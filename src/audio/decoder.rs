// Audio decoder using Symphonia
// Reads an MPEG bitstream packet by packet; one packet is one frame.

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::fs::File;
use std::path::Path;

use crate::error::{PlayerError, Result};

/// Samples per MPEG-1 Layer III frame, used when the container doesn't say.
const DEFAULT_FRAMES_PER_PACKET: u64 = 1152;

/// Bad packets tolerated in a row before the stream is declared corrupt.
const MAX_CONSECUTIVE_DECODE_ERRORS: u32 = 8;

/// Frame geometry of an audio stream, as needed to build a `Track`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamInfo {
    pub sample_rate: u32,
    pub channels: usize,
    pub frames_per_packet: u64,
    pub frame_count: u64,
    pub ms_per_frame: f64,
    pub duration_ms: f64,
}

pub struct AudioDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
    frames_per_packet: u64,
    n_frames: Option<u64>,
    decode_errors: u32,
    needs_reset: bool,
    format_change_logged: bool,
}

impl AudioDecoder {
    /// Open an audio file and prepare for decoding
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PlayerError::NotFound(path.display().to_string()),
            _ => PlayerError::Io(e),
        })?;
        Self::from_file(file, path)
    }

    /// Wrap an already opened byte stream. `path` only supplies the format hint.
    pub fn from_file(file: File, path: &Path) -> Result<Self> {
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| PlayerError::Unsupported(format!("{}: {}", path.display(), e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlayerError::Unsupported(format!("{}: no audio track", path.display())))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);
        let frames_per_packet = track
            .codec_params
            .max_frames_per_packet
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_FRAMES_PER_PACKET);
        let n_frames = track.codec_params.n_frames;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| PlayerError::Unsupported(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            frames_per_packet,
            n_frames,
            decode_errors: 0,
            needs_reset: false,
            format_change_logged: false,
        })
    }

    /// Probe a file for its frame geometry.
    ///
    /// Containers that don't report a length are walked packet by packet.
    pub fn probe(path: &Path) -> Result<StreamInfo> {
        let mut decoder = Self::open(path)?;
        let ms_per_frame = decoder.frames_per_packet as f64 * 1000.0 / decoder.sample_rate as f64;

        let frame_count = match decoder.n_frames {
            Some(samples) => samples.div_ceil(decoder.frames_per_packet),
            None => {
                let mut count = 0u64;
                while decoder.skip_next()? {
                    count += 1;
                }
                count
            }
        };

        Ok(StreamInfo {
            sample_rate: decoder.sample_rate,
            channels: decoder.channels,
            frames_per_packet: decoder.frames_per_packet,
            frame_count,
            ms_per_frame,
            duration_ms: frame_count as f64 * ms_per_frame,
        })
    }

    /// Rate the stream opened with. The output is built for it and never changes.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Decode the next frame into interleaved f32 samples.
    /// Returns None at end of stream.
    pub fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        if self.needs_reset {
            // Skipped packets leave stale bit-reservoir state behind
            self.decoder.reset();
            self.needs_reset = false;
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(None);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(PlayerError::Corrupt(format!("failed to read frame: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            return match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    self.decode_errors = 0;
                    let spec = *decoded.spec();
                    if (spec.rate != self.sample_rate || spec.channels.count() != self.channels)
                        && !self.format_change_logged
                    {
                        log::warn!(
                            "[Decoder] Stream switched to {} Hz, {} ch mid-track; output stays at {} Hz, {} ch",
                            spec.rate,
                            spec.channels.count(),
                            self.sample_rate,
                            self.channels
                        );
                        self.format_change_logged = true;
                    }

                    let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buffer.copy_interleaved_ref(decoded);
                    Ok(Some(buffer.samples().to_vec()))
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    // A lone bad frame plays as silence so the frame count stays aligned
                    self.decode_errors += 1;
                    if self.decode_errors > MAX_CONSECUTIVE_DECODE_ERRORS {
                        return Err(PlayerError::Corrupt(format!(
                            "{} undecodable frames in a row: {}",
                            self.decode_errors, e
                        )));
                    }
                    log::warn!("[Decoder] Decode error (playing silence): {}", e);
                    Ok(Some(vec![0.0; self.frames_per_packet as usize * self.channels]))
                }
                Err(e) => Err(PlayerError::Corrupt(format!("decode failed: {}", e))),
            };
        }
    }

    /// Read past the next frame without decoding it.
    /// Returns false at end of stream.
    pub fn skip_next(&mut self) -> Result<bool> {
        loop {
            match self.format.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => {
                    self.needs_reset = true;
                    return Ok(true);
                }
                Ok(_) => continue,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.needs_reset = true;
                    continue;
                }
                Err(e) => return Err(PlayerError::Corrupt(format!("failed to skip frame: {}", e))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_is_not_found() {
        let err = AudioDecoder::open(Path::new("/definitely/not/here.mp3"))
            .err()
            .expect("missing file must fail");
        assert!(matches!(err, PlayerError::NotFound(_)));
    }

    /// 16-bit PCM WAV, `samples` frames of a quiet ramp.
    fn write_wav(path: &Path, sample_rate: u32, channels: u16, samples: u32) {
        let data_len = samples * u32::from(channels) * 2;
        let mut bytes = Vec::with_capacity(44 + data_len as usize);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&(sample_rate * u32::from(channels) * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..samples * u32::from(channels) {
            bytes.extend_from_slice(&((i % 64) as i16).to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_geometry_stays_at_open_values_while_decoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 8000, 1, 4000);

        let mut decoder = AudioDecoder::open(&path).unwrap();
        assert_eq!(decoder.sample_rate(), 8000);
        assert_eq!(decoder.channels(), 1);

        let mut total = 0;
        while let Some(samples) = decoder.decode_next().unwrap() {
            total += samples.len();
            assert_eq!(decoder.sample_rate(), 8000);
            assert_eq!(decoder.channels(), 1);
        }
        assert_eq!(total, 4000);
        assert!(!decoder.format_change_logged);

        let info = AudioDecoder::probe(&path).unwrap();
        assert_eq!(info.sample_rate, 8000);
        assert_eq!(info.channels, 1);
        assert!((info.duration_ms - 500.0).abs() < info.ms_per_frame + 1e-9);
    }

    #[test]
    fn test_open_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, b"this is not an mpeg stream at all").unwrap();

        let err = AudioDecoder::open(&path).err().expect("garbage must fail");
        assert!(matches!(err, PlayerError::Unsupported(_)));
    }
}
