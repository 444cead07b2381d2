// Frame sources: the decoder + output pair behind one playing track
use crate::audio::decoder::AudioDecoder;
use crate::audio::output::{AudioOutput, OutputOptions};
use crate::error::Result;
use crate::library::Track;

/// Opens sessions for tracks. Shared by every playback thread.
pub trait FrameSource: Send + Sync {
    fn open(&self, track: &Track) -> Result<Box<dyn Session>>;
}

/// The open stream, decoder and output for one track.
///
/// Owned by the playback thread that opened it. `close` consumes the handle,
/// so nothing can touch a session after it has been closed.
pub trait Session {
    /// Decode the next frame. `None` at end of stream.
    fn decode_next(&mut self) -> Result<Option<Vec<f32>>>;

    /// Read past the next frame without decoding it. False at end of stream.
    fn skip_next(&mut self) -> Result<bool>;

    /// Hand decoded samples to the output device.
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Let already written audio finish playing.
    fn drain(&mut self) {}

    /// Drop written audio that has not played yet.
    fn flush(&mut self) {}

    /// Hold or restart the device without losing buffered audio.
    fn set_paused(&mut self, _paused: bool) {}

    fn close(self: Box<Self>);
}

/// Symphonia decoding into the default cpal device.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderFrameSource {
    options: OutputOptions,
}

impl DecoderFrameSource {
    pub fn new(options: OutputOptions) -> Self {
        Self { options }
    }
}

impl FrameSource for DecoderFrameSource {
    fn open(&self, track: &Track) -> Result<Box<dyn Session>> {
        let stream = track.open_stream()?;
        let decoder = AudioDecoder::from_file(stream, &track.file_path)?;
        let output = AudioOutput::open(decoder.sample_rate(), decoder.channels(), self.options)?;
        log::debug!(
            "[Player] Opened session for {:?} ({} Hz, {} ch)",
            track.file_path,
            decoder.sample_rate(),
            decoder.channels()
        );
        Ok(Box::new(DecoderSession { decoder, output }))
    }
}

struct DecoderSession {
    decoder: AudioDecoder,
    output: AudioOutput,
}

impl Session for DecoderSession {
    fn decode_next(&mut self) -> Result<Option<Vec<f32>>> {
        self.decoder.decode_next()
    }

    fn skip_next(&mut self) -> Result<bool> {
        self.decoder.skip_next()
    }

    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.output.write_blocking(samples)
    }

    fn drain(&mut self) {
        self.output.drain();
    }

    fn flush(&mut self) {
        self.output.clear();
    }

    fn set_paused(&mut self, paused: bool) {
        self.output.set_paused(paused);
    }

    fn close(self: Box<Self>) {
        // Dropping the output stops the device stream; the file closes with the decoder
        drop(self);
    }
}
