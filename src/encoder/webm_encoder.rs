use rav1e::prelude::*;
use std::io::Write;
use std::time::Duration;

use super::{ChunkBuffer, EncodedStream, EncoderSpec, OutputFormat};
use crate::error::{ReelError, ReelResult};
use crate::renderer::Canvas;

// Matroska element IDs
const EBML_HEADER: u64 = 0x1A45DFA3;
const SEGMENT: u64 = 0x18538067;
const INFO: u64 = 0x1549A966;
const TIMESTAMP_SCALE: u64 = 0x2AD7B1;
const MUXING_APP: u64 = 0x4D80;
const WRITING_APP: u64 = 0x5741;
const TRACKS: u64 = 0x1654AE6B;
const TRACK_ENTRY: u64 = 0xAE;
const CLUSTER: u64 = 0x1F43B675;
const CLUSTER_TIMESTAMP: u64 = 0xE7;
const SIMPLE_BLOCK: u64 = 0xA3;

const APP_NAME: &str = concat!("storyreel-", env!("CARGO_PKG_VERSION"));

/// Clusters are cut on the first keyframe after this many milliseconds.
const CLUSTER_TARGET_MS: i64 = 5_000;
/// Block timestamps are signed 16-bit offsets from the cluster timestamp.
const MAX_BLOCK_OFFSET_MS: i64 = i16::MAX as i64;
/// Upper bound on the gap between keyframes, in seconds of video.
const MAX_KEYFRAME_SECONDS: f64 = 10.0;

/// AV1 in a streamed WebM container, written to memory.
///
/// The segment and every cluster use unknown sizes, so the byte stream can be
/// cut into chunks at cluster boundaries as it is produced.
pub struct WebmEncoder {
    out: ChunkBuffer,
    encoder: rav1e::Context<u8>,
    width: usize,
    height: usize,
    /// Presentation time of each submitted frame, indexed by frame number
    timestamps: Vec<Duration>,
    cluster_timestamp: Option<i64>,
    packets: u64,
}

impl WebmEncoder {
    pub fn new(spec: &EncoderSpec) -> ReelResult<Self> {
        // AV1 requires dimensions to be multiples of 8 for proper alignment
        let padded_width = spec.width.div_ceil(8) * 8;
        let padded_height = spec.height.div_ceil(8) * 8;
        let quality = spec.quality.min(100);

        // Quality: 0-100 (higher is better)
        // Map to quantizer: 0-255 (lower is better quality)
        let quantizer = ((100 - quality) as usize * 255 / 100).clamp(20, 200);
        let min_quantizer = (quantizer / 2).clamp(10, 200) as u8;

        // Map quality to speed preset: 0 (slow/best) to 10 (fast/worst)
        let speed = if quality < 40 {
            10
        } else if quality < 70 {
            8 - ((quality - 40) / 15)
        } else {
            5 - ((quality - 70) / 15)
        };

        let max_keyint = ((spec.spacing.fps() * MAX_KEYFRAME_SECONDS).round() as u64).clamp(1, 300);
        let (tb_num, tb_den) = spec.spacing.time_base();

        let cfg = Config::new()
            .with_encoder_config(EncoderConfig {
                width: padded_width,
                height: padded_height,
                time_base: Rational::new(tb_num, tb_den),
                speed_settings: SpeedSettings::from_preset(speed),
                quantizer,
                min_quantizer,
                max_key_frame_interval: max_keyint,
                min_key_frame_interval: max_keyint.min(12),
                // One packet out per frame in, in presentation order
                low_latency: true,
                ..Default::default()
            })
            .with_threads(num_cpus::get());

        let encoder = cfg
            .new_context()
            .map_err(|e| ReelError::encoder_init(format!("Failed to create AV1 encoder: {:?}", e)))?;

        tracing::debug!(
            width = padded_width,
            height = padded_height,
            speed,
            quantizer,
            max_keyint,
            "AV1 encoder ready"
        );

        let mut webm = Self {
            out: ChunkBuffer::new(),
            encoder,
            width: padded_width,
            height: padded_height,
            timestamps: Vec::new(),
            cluster_timestamp: None,
            packets: 0,
        };

        let header = webm.header(spec);
        webm.out
            .write_all(&header)
            .map_err(|e| ReelError::encoder_init(format!("Failed to write WebM header: {}", e)))?;

        Ok(webm)
    }

    pub fn add_frame(&mut self, canvas: &Canvas, timestamp: Duration) -> ReelResult<()> {
        let mut frame = self.encoder.new_frame();
        self.fill_planes(canvas, &mut frame);
        self.timestamps.push(timestamp);

        self.encoder
            .send_frame(frame)
            .map_err(|e| ReelError::encoder_runtime(format!("Failed to send frame to encoder: {:?}", e)))?;

        self.drain()
    }

    pub fn finish(mut self) -> ReelResult<EncodedStream> {
        // Flush encoder and write remaining packets
        self.encoder.flush();
        self.drain()?;

        tracing::debug!(
            frames = self.timestamps.len(),
            packets = self.packets,
            bytes = self.out.len(),
            "WebM encoder finished"
        );

        Ok(EncodedStream {
            chunks: self.out.into_chunks(),
            mime_type: OutputFormat::Webm.mime_type(),
        })
    }

    fn drain(&mut self) -> ReelResult<()> {
        loop {
            match self.encoder.receive_packet() {
                Ok(packet) => {
                    let pts = self.packet_time_ms(packet.input_frameno);
                    let is_key = packet.frame_type == FrameType::KEY;
                    self.write_block(&packet.data, pts, is_key)?;
                    self.packets += 1;
                }
                // Frame consumed without a packet yet; keep polling
                Err(EncoderStatus::Encoded) => continue,
                Err(EncoderStatus::LimitReached) | Err(EncoderStatus::NeedMoreData) => break,
                Err(e) => {
                    return Err(ReelError::encoder_runtime(format!("Encoder error: {:?}", e)));
                }
            }
        }
        Ok(())
    }

    fn packet_time_ms(&self, frameno: u64) -> i64 {
        self.timestamps
            .get(frameno as usize)
            .map(|t| t.as_millis() as i64)
            .unwrap_or(0)
    }

    fn write_block(&mut self, data: &[u8], pts: i64, is_key: bool) -> ReelResult<()> {
        let needs_cluster = match self.cluster_timestamp {
            None => true,
            Some(start) => {
                let offset = pts - start;
                (is_key && offset >= CLUSTER_TARGET_MS) || !(i16::MIN as i64..=MAX_BLOCK_OFFSET_MS).contains(&offset)
            }
        };
        if needs_cluster {
            self.start_cluster(pts)?;
        }

        let relative = (pts - self.cluster_timestamp.unwrap_or(pts)) as i16;

        let mut block = Vec::with_capacity(data.len() + 4);
        block.push(0x81); // Track 1
        block.extend_from_slice(&relative.to_be_bytes());
        block.push(if is_key { 0x80 } else { 0x00 });
        block.extend_from_slice(data);

        let mut element = Vec::with_capacity(block.len() + 12);
        put_element(&mut element, SIMPLE_BLOCK, &block);
        self.emit(&element)
    }

    fn start_cluster(&mut self, timestamp: i64) -> ReelResult<()> {
        // Each cluster starts a new chunk; the header travels with the first one
        if self.cluster_timestamp.is_some() {
            self.out.cut();
        }
        self.cluster_timestamp = Some(timestamp);

        let mut data = Vec::new();
        put_id(&mut data, CLUSTER);
        data.push(0x01);
        data.extend_from_slice(&[0xFF; 7]); // Unknown size
        put_uint(&mut data, CLUSTER_TIMESTAMP, timestamp.max(0) as u64);
        self.emit(&data)
    }

    fn emit(&mut self, bytes: &[u8]) -> ReelResult<()> {
        self.out
            .write_all(bytes)
            .map_err(|e| ReelError::encoder_runtime(format!("Failed to write WebM data: {}", e)))
    }

    fn header(&self, spec: &EncoderSpec) -> Vec<u8> {
        let mut out = Vec::new();

        let mut ebml = Vec::new();
        put_uint(&mut ebml, 0x4286, 1); // EBMLVersion
        put_uint(&mut ebml, 0x42F7, 1); // EBMLReadVersion
        put_uint(&mut ebml, 0x42F2, 4); // EBMLMaxIDLength
        put_uint(&mut ebml, 0x42F3, 8); // EBMLMaxSizeLength
        put_string(&mut ebml, 0x4282, "webm"); // DocType
        put_uint(&mut ebml, 0x4287, 4); // DocTypeVersion
        put_uint(&mut ebml, 0x4285, 2); // DocTypeReadVersion
        put_element(&mut out, EBML_HEADER, &ebml);

        // Segment with unknown size for streaming
        put_id(&mut out, SEGMENT);
        out.push(0x01);
        out.extend_from_slice(&[0xFF; 7]);

        let mut info = Vec::new();
        put_uint(&mut info, TIMESTAMP_SCALE, 1_000_000); // 1ms
        put_string(&mut info, MUXING_APP, APP_NAME);
        put_string(&mut info, WRITING_APP, APP_NAME);
        put_element(&mut out, INFO, &info);

        let mut video = Vec::new();
        put_uint(&mut video, 0xB0, self.width as u64); // PixelWidth
        put_uint(&mut video, 0xBA, self.height as u64); // PixelHeight
        if self.width != spec.width || self.height != spec.height {
            // Crop the alignment padding back off on playback
            put_uint(&mut video, 0x54AA, (self.height - spec.height) as u64); // PixelCropBottom
            put_uint(&mut video, 0x54DD, (self.width - spec.width) as u64); // PixelCropRight
        }

        let mut track = Vec::new();
        put_uint(&mut track, 0xD7, 1); // TrackNumber
        put_uint(&mut track, 0x73C5, 1); // TrackUID
        put_uint(&mut track, 0x83, 1); // TrackType (video)
        put_string(&mut track, 0x86, "V_AV1"); // CodecID
        put_uint(&mut track, 0x23E383, spec.spacing.interval().as_nanos() as u64); // DefaultDuration
        put_element(&mut track, 0xE0, &video);

        let mut tracks = Vec::new();
        put_element(&mut tracks, TRACK_ENTRY, &track);
        put_element(&mut out, TRACKS, &tracks);

        out
    }

    fn fill_planes(&self, canvas: &Canvas, frame: &mut Frame<u8>) {
        let data = canvas.data();
        let canvas_width = canvas.width();
        let canvas_height = canvas.height();

        // Padding outside the canvas is black
        let rgb_at = |x: usize, y: usize| -> (i32, i32, i32) {
            if x < canvas_width && y < canvas_height {
                let idx = (y * canvas_width + x) * 4;
                (data[idx] as i32, data[idx + 1] as i32, data[idx + 2] as i32)
            } else {
                (0, 0, 0)
            }
        };

        // Luma plane, honoring stride and origin
        let y_stride = frame.planes[0].cfg.stride;
        let y_xorigin = frame.planes[0].cfg.xorigin;
        let y_yorigin = frame.planes[0].cfg.yorigin;
        for y in 0..self.height {
            let row_start = (y + y_yorigin) * y_stride + y_xorigin;
            for x in 0..self.width {
                let (r, g, b) = rgb_at(x, y);
                // RGB to YUV conversion (ITU-R BT.601)
                let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
                frame.planes[0].data[row_start + x] = y_val.clamp(0, 255) as u8;
            }
        }

        // Chroma planes with 2x2 subsampling
        let u_stride = frame.planes[1].cfg.stride;
        let u_xorigin = frame.planes[1].cfg.xorigin;
        let u_yorigin = frame.planes[1].cfg.yorigin;
        let v_stride = frame.planes[2].cfg.stride;
        let v_xorigin = frame.planes[2].cfg.xorigin;
        let v_yorigin = frame.planes[2].cfg.yorigin;
        for y in (0..self.height).step_by(2) {
            let uv_y = y / 2;
            let u_row = (uv_y + u_yorigin) * u_stride + u_xorigin;
            let v_row = (uv_y + v_yorigin) * v_stride + v_xorigin;

            for x in (0..self.width).step_by(2) {
                let uv_x = x / 2;
                let (r, g, b) = rgb_at(x, y);

                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;

                frame.planes[1].data[u_row + uv_x] = u_val.clamp(0, 255) as u8;
                frame.planes[2].data[v_row + uv_x] = v_val.clamp(0, 255) as u8;
            }
        }
    }
}

/// Element ID bytes; IDs already carry their own length marker.
fn put_id(buf: &mut Vec<u8>, id: u64) {
    let len = (8 - id.leading_zeros() as usize / 8).max(1);
    buf.extend_from_slice(&id.to_be_bytes()[8 - len..]);
}

/// EBML variable-size integer.
fn put_size(buf: &mut Vec<u8>, size: u64) {
    // Width n holds up to 2^(7n) - 2; all-ones is reserved for "unknown"
    let len = (1..=8usize).find(|&n| size < (1u64 << (7 * n)) - 1).unwrap_or(8);
    let marked = size | (1u64 << (7 * len));
    buf.extend_from_slice(&marked.to_be_bytes()[8 - len..]);
}

fn put_element(buf: &mut Vec<u8>, id: u64, data: &[u8]) {
    put_id(buf, id);
    put_size(buf, data.len() as u64);
    buf.extend_from_slice(data);
}

fn put_uint(buf: &mut Vec<u8>, id: u64, value: u64) {
    let len = (8 - value.leading_zeros() as usize / 8).max(1);
    put_element(buf, id, &value.to_be_bytes()[8 - len..]);
}

fn put_string(buf: &mut Vec<u8>, id: u64, s: &str) {
    put_element(buf, id, s.as_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::Color;
    use crate::schedule::FrameSpacing;

    #[test]
    fn test_ebml_varints() {
        let mut buf = Vec::new();
        put_size(&mut buf, 5);
        assert_eq!(buf, vec![0x85]);

        buf.clear();
        put_size(&mut buf, 127);
        assert_eq!(buf, vec![0x40, 0x7F]);

        buf.clear();
        put_size(&mut buf, 0x3FFF);
        assert_eq!(buf, vec![0x20, 0x3F, 0xFF]);

        buf.clear();
        put_id(&mut buf, CLUSTER);
        assert_eq!(buf, vec![0x1F, 0x43, 0xB6, 0x75]);

        buf.clear();
        put_uint(&mut buf, 0xD7, 0);
        assert_eq!(buf, vec![0xD7, 0x81, 0x00]);

        buf.clear();
        put_uint(&mut buf, TIMESTAMP_SCALE, 1_000_000);
        assert_eq!(buf, vec![0x2A, 0xD7, 0xB1, 0x83, 0x0F, 0x42, 0x40]);
    }

    #[test]
    fn test_small_clip_produces_webm() {
        let spec = EncoderSpec {
            width: 20,
            height: 12,
            spacing: FrameSpacing::per_second(10),
            quality: 10,
            format: OutputFormat::Webm,
        };
        let mut encoder = WebmEncoder::new(&spec).unwrap();
        let mut canvas = Canvas::new(20, 12);
        for i in 0..3u64 {
            canvas.fill(if i == 1 { Color::RED } else { Color::BLACK });
            encoder.add_frame(&canvas, spec.spacing.offset(i)).unwrap();
        }
        let stream = encoder.finish().unwrap();
        assert_eq!(stream.mime_type, "video/webm");

        let bytes = stream.chunks.concat();
        assert_eq!(&bytes[..4], &[0x1A, 0x45, 0xDF, 0xA3]);
        let clusters = bytes.windows(4).filter(|w| *w == [0x1F, 0x43, 0xB6, 0x75]).count();
        assert!(clusters >= 1);
    }
}
