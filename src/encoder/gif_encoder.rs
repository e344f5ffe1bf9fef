use gif::{DisposalMethod, Encoder, Frame, Repeat};
use std::time::Duration;

use super::{ChunkBuffer, EncodedStream, EncoderSpec, OutputFormat};
use crate::error::{ReelError, ReelResult};
use crate::renderer::Canvas;

/// Animated GIF output. Each frame gets its own quantized palette.
///
/// A frame's delay is only known once the next frame arrives, so one frame is
/// held back until then (or until `finish`).
pub struct GifEncoder {
    encoder: Encoder<ChunkBuffer>,
    width: u16,
    height: u16,
    speed: i32,
    frame_interval: Duration,
    pending: Option<(Frame<'static>, Duration)>,
    frames_written: u64,
}

fn centiseconds(t: Duration) -> u64 {
    ((t.as_micros() + 5_000) / 10_000) as u64
}

impl GifEncoder {
    pub fn new(spec: &EncoderSpec) -> ReelResult<Self> {
        let width = u16::try_from(spec.width)
            .map_err(|_| ReelError::encoder_init(format!("GIF width {} exceeds 65535", spec.width)))?;
        let height = u16::try_from(spec.height)
            .map_err(|_| ReelError::encoder_init(format!("GIF height {} exceeds 65535", spec.height)))?;

        // No global palette; every frame carries a local one
        let mut encoder = Encoder::new(ChunkBuffer::new(), width, height, &[])
            .map_err(|e| ReelError::encoder_init(format!("Failed to create GIF encoder: {}", e)))?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ReelError::encoder_init(format!("Failed to set GIF loop: {}", e)))?;

        // Quality 0-100 maps to NeuQuant speed 30 (fast) .. 1 (best)
        let speed = 30 - (spec.quality.min(100) as i32 * 29 / 100);

        Ok(Self {
            encoder,
            width,
            height,
            speed,
            frame_interval: spec.spacing.interval(),
            pending: None,
            frames_written: 0,
        })
    }

    pub fn add_frame(&mut self, canvas: &Canvas, timestamp: Duration) -> ReelResult<()> {
        if canvas.width() != self.width as usize || canvas.height() != self.height as usize {
            return Err(ReelError::encoder_runtime(format!(
                "Frame size {}x{} does not match encoder size {}x{}",
                canvas.width(),
                canvas.height(),
                self.width,
                self.height
            )));
        }

        let mut pixels = canvas.data().to_vec();
        let mut frame = Frame::from_rgba_speed(self.width, self.height, &mut pixels, self.speed);
        frame.dispose = DisposalMethod::Keep;

        if let Some((previous, started)) = self.pending.take() {
            self.write(previous, started, timestamp)?;
        }
        self.pending = Some((frame, timestamp));
        Ok(())
    }

    /// Delay is derived from rounded absolute times so centisecond rounding
    /// never accumulates drift.
    fn write(&mut self, mut frame: Frame<'static>, start: Duration, end: Duration) -> ReelResult<()> {
        let delay = centiseconds(end).saturating_sub(centiseconds(start));
        frame.delay = delay.clamp(1, u16::MAX as u64) as u16;

        self.encoder
            .write_frame(&frame)
            .map_err(|e| ReelError::encoder_runtime(format!("Failed to write GIF frame: {}", e)))?;
        self.frames_written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> ReelResult<EncodedStream> {
        if let Some((last, started)) = self.pending.take() {
            let end = started + self.frame_interval;
            self.write(last, started, end)?;
        }

        tracing::debug!(frames = self.frames_written, "GIF encoder finished");

        let buffer = self
            .encoder
            .into_inner()
            .map_err(|e| ReelError::encoder_runtime(format!("Failed to finalize GIF: {}", e)))?;

        Ok(EncodedStream {
            chunks: buffer.into_chunks(),
            mime_type: OutputFormat::Gif.mime_type(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Color;
    use crate::schedule::FrameSpacing;

    fn spec(fps: u32) -> EncoderSpec {
        EncoderSpec {
            width: 8,
            height: 6,
            spacing: FrameSpacing::per_second(fps),
            quality: 50,
            format: OutputFormat::Gif,
        }
    }

    #[test]
    fn test_encodes_decodable_gif() {
        let mut encoder = GifEncoder::new(&spec(10)).unwrap();
        let mut canvas = Canvas::new(8, 6);
        for i in 0..3u64 {
            canvas.fill(if i % 2 == 0 { Color::RED } else { Color::WHITE });
            encoder.add_frame(&canvas, Duration::from_millis(i * 100)).unwrap();
        }
        let stream = encoder.finish().unwrap();
        assert_eq!(stream.mime_type, "image/gif");

        let bytes: Vec<u8> = stream.chunks.concat();
        assert!(bytes.starts_with(b"GIF89a"));

        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(bytes.as_slice()).unwrap();
        let mut delays = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            delays.push(frame.delay);
        }
        assert_eq!(delays, vec![10, 10, 10]);
    }

    #[test]
    fn test_rejects_mismatched_canvas() {
        let mut encoder = GifEncoder::new(&spec(30)).unwrap();
        let canvas = Canvas::new(4, 4);
        let err = encoder.add_frame(&canvas, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ReelError::EncoderRuntime { .. }));
    }

    #[test]
    fn test_delay_rounding_does_not_drift() {
        // 30 fps: 3.33cs per frame, rounded per absolute time -> 3,4,3,...
        assert_eq!(centiseconds(FrameSpacing::per_second(30).offset(1)), 3);
        assert_eq!(centiseconds(FrameSpacing::per_second(30).offset(30)), 100);
    }
}
