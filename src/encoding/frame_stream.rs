//! Frame stream container
//!
//! A minimal timestamped video container:
//!
//! ```text
//! magic    "SCNFRMS1"
//! width    u32 LE
//! height   u32 LE
//! scale    i32 LE    timescale of every pts below
//! format   u8        pixel format of raw payloads
//! codec    [u8; 4]   "png " or "raw "
//! frames   { pts: i64 LE, len: u32 LE, payload: [u8; len] }*
//! ```
//!
//! Frames are stored in append order with their explicit timestamps, so
//! readers sort by pts rather than by position.

use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::capture::pool::{PixelBuffer, PixelFormat};
use crate::capture::traits::Resolution;
use crate::recorder::timestamp::MediaTime;
use crate::recorder::writer::{FinalizeCallback, MediaWriter, TrackSettings};
use crate::utils::error::WriterError;

pub const MAGIC: &[u8; 8] = b"SCNFRMS1";

/// Container identifier accepted by [`FrameStreamWriter`]
pub const CONTAINER: &str = "scnf";

/// Per-frame payload encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCodec {
    Png,
    Raw,
}

impl FrameCodec {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.to_ascii_lowercase().as_str() {
            "png" => Some(FrameCodec::Png),
            "raw" => Some(FrameCodec::Raw),
            _ => None,
        }
    }

    fn tag(&self) -> [u8; 4] {
        match self {
            FrameCodec::Png => *b"png ",
            FrameCodec::Raw => *b"raw ",
        }
    }

    fn from_tag(tag: [u8; 4]) -> Option<Self> {
        match &tag {
            b"png " => Some(FrameCodec::Png),
            b"raw " => Some(FrameCodec::Raw),
            _ => None,
        }
    }
}

fn format_tag(format: PixelFormat) -> u8 {
    match format {
        PixelFormat::Bgra8 => 0,
        PixelFormat::Rgba8 => 1,
        PixelFormat::Argb8 => 2,
    }
}

fn format_from_tag(tag: u8) -> Option<PixelFormat> {
    match tag {
        0 => Some(PixelFormat::Bgra8),
        1 => Some(PixelFormat::Rgba8),
        2 => Some(PixelFormat::Argb8),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamState {
    Created,
    Open,
    Writing,
    InputFinished,
    Finalized,
}

struct StreamInner {
    state: StreamState,
    file: Option<BufWriter<File>>,
    codec: FrameCodec,
    track: Option<TrackSettings>,
    frames: u64,
}

/// File-backed [`MediaWriter`] producing a frame stream container
pub struct FrameStreamWriter {
    inner: Mutex<StreamInner>,
}

impl FrameStreamWriter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StreamInner {
                state: StreamState::Created,
                file: None,
                codec: FrameCodec::Raw,
                track: None,
                frames: 0,
            }),
        }
    }

    /// Frames written so far
    pub fn frames_written(&self) -> u64 {
        self.inner.lock().frames
    }
}

impl Default for FrameStreamWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaWriter for FrameStreamWriter {
    fn open(&self, path: &Path, container: &str, track: &TrackSettings) -> Result<(), WriterError> {
        let mut inner = self.inner.lock();
        if inner.state != StreamState::Created {
            return Err(WriterError::InvalidState("writer already opened".to_string()));
        }
        if container != CONTAINER {
            return Err(WriterError::Unsupported(format!("container {:?}", container)));
        }
        let codec = FrameCodec::from_id(&track.codec)
            .ok_or_else(|| WriterError::Unsupported(format!("codec {:?}", track.codec)))?;
        if track.timescale <= 0 || track.size.width == 0 || track.size.height == 0 {
            return Err(WriterError::Unsupported(format!(
                "track {} @ timescale {}",
                track.size, track.timescale
            )));
        }

        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(MAGIC)?;
        file.write_all(&track.size.width.to_le_bytes())?;
        file.write_all(&track.size.height.to_le_bytes())?;
        file.write_all(&track.timescale.to_le_bytes())?;
        file.write_all(&[format_tag(track.pixel_format)])?;
        file.write_all(&codec.tag())?;

        inner.file = Some(file);
        inner.codec = codec;
        inner.track = Some(track.clone());
        inner.state = StreamState::Open;
        tracing::debug!("Frame stream opened at {:?} ({:?})", path, codec);
        Ok(())
    }

    fn start_session(&self, base_time: MediaTime) -> Result<(), WriterError> {
        let mut inner = self.inner.lock();
        if inner.state != StreamState::Open {
            return Err(WriterError::InvalidState("writer is not open".to_string()));
        }
        if base_time.value != 0 {
            return Err(WriterError::Unsupported(
                "sessions must start at time zero".to_string(),
            ));
        }
        inner.state = StreamState::Writing;
        Ok(())
    }

    fn is_ready_for_more_data(&self) -> bool {
        self.inner.lock().state == StreamState::Writing
    }

    fn append(&self, buffer: &PixelBuffer, presentation_time: MediaTime) -> bool {
        let (codec, track) = {
            let inner = self.inner.lock();
            match (&inner.track, inner.state) {
                (Some(track), StreamState::Writing) => (inner.codec, track.clone()),
                _ => return false,
            }
        };
        if buffer.size() != track.size || presentation_time.timescale != track.timescale {
            tracing::warn!(
                "Frame {} @ timescale {} does not match track",
                buffer.size(),
                presentation_time.timescale
            );
            return false;
        }

        // Compress outside the lock so concurrent appends overlap
        let encoded = match codec {
            FrameCodec::Png => match encode_png(buffer) {
                Ok(bytes) => Some(bytes),
                Err(e) => {
                    tracing::warn!("PNG encode failed: {}", e);
                    return false;
                }
            },
            FrameCodec::Raw => None,
        };
        let payload = encoded.as_deref().unwrap_or_else(|| buffer.data());
        let Some(header) = record_header(presentation_time, payload.len()) else {
            tracing::warn!(
                "Frame payload of {} bytes exceeds the record size limit",
                payload.len()
            );
            return false;
        };

        let mut inner = self.inner.lock();
        if inner.state != StreamState::Writing {
            return false;
        }
        let Some(file) = inner.file.as_mut() else {
            return false;
        };
        let written = file
            .write_all(&header)
            .and_then(|_| file.write_all(payload));

        match written {
            Ok(()) => {
                inner.frames += 1;
                true
            }
            Err(e) => {
                tracing::error!("Frame stream write failed: {}", e);
                false
            }
        }
    }

    fn mark_input_finished(&self) {
        let mut inner = self.inner.lock();
        if inner.state == StreamState::Writing {
            inner.state = StreamState::InputFinished;
        }
    }

    fn finalize(&self, on_complete: FinalizeCallback) {
        let (file, frames) = {
            let mut inner = self.inner.lock();
            if inner.state != StreamState::InputFinished {
                drop(inner);
                on_complete(Err(WriterError::InvalidState(
                    "finalize before input finished".to_string(),
                )));
                return;
            }
            inner.state = StreamState::Finalized;
            (inner.file.take(), inner.frames)
        };

        std::thread::spawn(move || {
            let result = match file {
                Some(file) => file
                    .into_inner()
                    .map_err(|e| WriterError::Io(e.into_error()))
                    .and_then(|file| file.sync_all().map_err(WriterError::from)),
                None => Err(WriterError::InvalidState("no open file".to_string())),
            };
            if result.is_ok() {
                tracing::debug!("Frame stream finalized with {} frames", frames);
            }
            on_complete(result);
        });
    }
}

/// `pts` and payload length of one frame record; `None` when the payload
/// does not fit the u32 length field
fn record_header(presentation_time: MediaTime, payload_len: usize) -> Option<[u8; 12]> {
    let len = u32::try_from(payload_len).ok()?;
    let mut header = [0u8; 12];
    header[..8].copy_from_slice(&presentation_time.value.to_le_bytes());
    header[8..].copy_from_slice(&len.to_le_bytes());
    Some(header)
}

fn encode_png(buffer: &PixelBuffer) -> Result<Vec<u8>, WriterError> {
    let size = buffer.size();
    let format = buffer.format();

    let mut rgba = Vec::with_capacity(buffer.data().len());
    for px in buffer.data().chunks_exact(4) {
        rgba.extend_from_slice(&format.to_rgba([px[0], px[1], px[2], px[3]]));
    }

    let mut out = Vec::new();
    let mut encoder = png::Encoder::new(&mut out, size.width, size.height);
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .map_err(|e| WriterError::Encode(e.to_string()))?;
    writer
        .write_image_data(&rgba)
        .map_err(|e| WriterError::Encode(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| WriterError::Encode(e.to_string()))?;
    Ok(out)
}

/// Header of a frame stream file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHeader {
    pub size: Resolution,
    pub timescale: i32,
    pub pixel_format: PixelFormat,
    pub codec: FrameCodec,
}

/// One stored frame
#[derive(Debug, Clone)]
pub struct StoredFrame {
    pub presentation_time: MediaTime,
    pub payload: Vec<u8>,
}

fn read_array<const N: usize>(reader: &mut impl Read) -> std::io::Result<[u8; N]> {
    let mut bytes = [0u8; N];
    reader.read_exact(&mut bytes)?;
    Ok(bytes)
}

/// Read a frame stream file back
pub fn read_stream(path: &Path) -> Result<(StreamHeader, Vec<StoredFrame>), WriterError> {
    let mut reader = BufReader::new(File::open(path)?);

    let magic: [u8; 8] = read_array(&mut reader)?;
    if &magic != MAGIC {
        return Err(WriterError::Unsupported("not a frame stream".to_string()));
    }
    let width = u32::from_le_bytes(read_array(&mut reader)?);
    let height = u32::from_le_bytes(read_array(&mut reader)?);
    let timescale = i32::from_le_bytes(read_array(&mut reader)?);
    let [format] = read_array::<1>(&mut reader)?;
    let pixel_format = format_from_tag(format)
        .ok_or_else(|| WriterError::Unsupported(format!("pixel format tag {}", format)))?;
    let codec = FrameCodec::from_tag(read_array(&mut reader)?)
        .ok_or_else(|| WriterError::Unsupported("codec tag".to_string()))?;

    let header = StreamHeader {
        size: Resolution::new(width, height),
        timescale,
        pixel_format,
        codec,
    };

    let mut frames = Vec::new();
    loop {
        let pts = match read_array::<8>(&mut reader) {
            Ok(bytes) => i64::from_le_bytes(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        };
        let len = u32::from_le_bytes(read_array(&mut reader)?) as usize;
        let mut payload = vec![0u8; len];
        reader.read_exact(&mut payload)?;
        frames.push(StoredFrame {
            presentation_time: MediaTime {
                value: pts,
                timescale,
            },
            payload,
        });
    }

    Ok((header, frames))
}
