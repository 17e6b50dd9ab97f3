// wave-frames -- Reading wave PCM input into fixed-size encoder frames.
// Copyright (c) 2016 Kevin Brothaler and the riff-wave project authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Driving a block encoder from an [`AudioSource`].
//!
//! The output is laid out as:
//!
//! Part        | Source
//! ----------- | ----------------------------------------------------------
//! ID3v2 tag   | [`BlockCodec::id3v2_tag`], or else the tag found in the input.
//! frames      | [`BlockCodec::encode`] for every frame of the input.
//! flush       | [`BlockCodec::flush`].
//! ID3v1 tag   | [`BlockCodec::id3v1_tag`], at most 128 bytes.
//!
//! Once everything is written, the first frame after the ID3v2 tag is
//! overwritten with [`BlockCodec::vbr_header`], if the codec has one.

use std::io;
use std::io::{Read, Seek, SeekFrom, Write};
use std::result;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{PcmFormat, ReadError, DEFAULT_FRAME_SIZE};
use super::config::WriterConfig;
use super::source::{AudioSource, Frame};

/// The size of an ID3v1 tag.
pub const ID3V1_TAG_SIZE: usize = 128;

// MARK: Error types

/// An error reported by a [`BlockCodec`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The codec's output did not fit in its buffer.
    #[error("output buffer is not big enough")]
    BufferTooSmall,
    /// The codec failed with an error code of its own.
    #[error("internal error: error code={0}")]
    Internal(i32),
}

/// Represents an error that occurred while encoding a source.
#[derive(Debug, Error)]
pub enum WriteError {
    /// Reading the input failed.
    #[error("Read error: {0}")]
    Read(#[from] ReadError),
    /// The codec failed.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    /// Writing the output failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Represents a result when encoding a source.
pub type WriteResult<T> = result::Result<T, WriteError>;

// MARK: Codec

/// A block encoder. It consumes samples in frames of a fixed size and
/// appends its output to a byte buffer.
pub trait BlockCodec {
    /// The number of samples per channel the codec consumes at once.
    fn frame_size(&self) -> usize {
        DEFAULT_FRAME_SIZE
    }

    /// Called once before the first frame, with the format of the input and
    /// the number of sample frames it is expected to hold.
    fn begin(&mut self, format: &PcmFormat, num_samples: Option<u64>) -> Result<(), CodecError> {
        let _ = (format, num_samples);
        Ok(())
    }

    /// Encodes one frame. The last frame of a stream may be short.
    fn encode(&mut self, left: &[i32], right: &[i32], out: &mut Vec<u8>) -> Result<(), CodecError>;

    /// Encodes anything the codec still holds.
    fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), CodecError>;

    fn id3v2_tag(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn id3v1_tag(&mut self) -> Option<Vec<u8>> {
        None
    }

    /// A header frame describing the finished stream, written over the first
    /// frame of the output.
    fn vbr_header(&mut self) -> Option<Vec<u8>> {
        None
    }
}

// MARK: Driver

/// What [`EncodeDriver::run`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EncodeSummary {
    /// The number of frames handed to the codec.
    pub frames: u64,
    /// The number of samples per channel handed to the codec.
    pub samples: u64,
    /// The number of bytes appended to the output.
    pub bytes_written: u64,
    /// The size of the leading ID3v2 tag; the audio starts here.
    pub audio_offset: u64,
}

/// Runs the read, encode and write loop for one source.
pub struct EncodeDriver<C, W>
    where C: BlockCodec,
          W: Write + Seek
{
    codec: C,
    writer: W,
    config: WriterConfig,
    out: Vec<u8>,
}

impl<C, W> EncodeDriver<C, W>
    where C: BlockCodec,
          W: Write + Seek
{
    pub fn new(codec: C, writer: W, config: WriterConfig) -> EncodeDriver<C, W> {
        EncodeDriver {
            codec,
            writer,
            config,
            out: Vec::new(),
        }
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Returns the codec and the writer.
    pub fn into_inner(self) -> (C, W) {
        (self.codec, self.writer)
    }

    /// Encodes everything `source` holds. The writer should be positioned at
    /// the start of an empty output.
    pub fn run<R: Read>(&mut self, source: &mut AudioSource<R>) -> WriteResult<EncodeSummary> {
        let mut summary = EncodeSummary::default();

        self.codec.begin(source.pcm_format(), source.num_samples())?;

        let id3v2 = match self.codec.id3v2_tag() {
            Some(tag) => Some(tag),
            None => source.old_tag().map(<[u8]>::to_vec),
        };
        if let Some(tag) = id3v2 {
            debug!(len = tag.len(), "writing id3v2 tag");
            self.writer.write_all(&tag)?;
            summary.audio_offset = tag.len() as u64;
            summary.bytes_written += tag.len() as u64;
        }
        self.flush_if_configured()?;

        let mut frame = Frame::new(self.codec.frame_size());
        loop {
            let count = source.next_frame(&mut frame)?;
            if count == 0 {
                break;
            }

            self.out.clear();
            self.codec.encode(frame.left(), frame.right(), &mut self.out)?;
            self.writer.write_all(&self.out)?;
            self.flush_if_configured()?;

            summary.frames += 1;
            summary.samples += count as u64;
            summary.bytes_written += self.out.len() as u64;
        }

        self.out.clear();
        self.codec.flush(&mut self.out)?;
        self.writer.write_all(&self.out)?;
        summary.bytes_written += self.out.len() as u64;
        self.flush_if_configured()?;

        if let Some(tag) = self.codec.id3v1_tag() {
            if tag.len() > ID3V1_TAG_SIZE {
                warn!(len = tag.len(), "id3v1 tag is larger than {} bytes, not writing it",
                      ID3V1_TAG_SIZE);
            } else {
                self.writer.write_all(&tag)?;
                summary.bytes_written += tag.len() as u64;
            }
        }
        self.flush_if_configured()?;

        if let Some(header) = self.codec.vbr_header() {
            if let Err(err) = self.write_vbr_header(&header, summary.audio_offset) {
                warn!(%err, "can't update the vbr header frame");
            }
        }
        self.flush_if_configured()?;

        info!(frames = summary.frames, samples = summary.samples,
              bytes = summary.bytes_written, "encoded source");
        Ok(summary)
    }

    fn write_vbr_header(&mut self, header: &[u8], offset: u64) -> io::Result<()> {
        self.writer.seek(SeekFrom::Start(offset))?;
        self.writer.write_all(header)?;
        self.writer.seek(SeekFrom::End(0))?;
        Ok(())
    }

    fn flush_if_configured(&mut self) -> io::Result<()> {
        if self.config.flush_write {
            self.writer.flush()?;
        }
        Ok(())
    }
}

// MARK: Tests
