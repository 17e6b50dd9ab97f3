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

//! Reads wave and raw PCM input and hands it to a block-based encoder in
//! fixed-size frames.
//!
//! A block encoder (an MP3 encoder, for example) consumes audio in frames of a
//! fixed number of samples per channel, usually 1152. Input files, on the
//! other hand, deliver samples in whatever width, byte order and signedness
//! they were recorded in. This library sits in between:
//!
//! 1. The wave header is parsed once, when the source is opened.
//! 2. Raw sample bytes are read and unpacked into full-scale `i32` samples.
//! 3. The samples are de-interleaved into a per-channel [`FrameBuffer`],
//!    which discards the leading and trailing [`SkipWindow`] of the stream.
//! 4. [`AudioSource::next_frame`] serves frames of the requested size until
//!    the input is exhausted.
//!
//! The encoder itself is not part of this library. It plugs in through the
//! [`BlockCodec`] trait, and [`EncodeDriver`] runs the read/encode/write loop
//! for one file. [`batch::run_jobs`] runs several files in parallel, one
//! thread per file.
//!
//! # The wave file format
//!
//! The wave file format starts with the RIFF file header:
//!
//! Offset | Size | Data       |    Description
//! -----: | ---: | ---------- | ----------------------------------------------
//!      0 |    4 | "RIFF"     | Identifies the main chunk.
//!      4 |    4 | chunk size | The size of the rest of the file. Not validated.
//!      8 |    4 | "WAVE"     | Indicates that this is a wave file.
//!
//! Subchunks follow, each made of a four byte tag, a little-endian 32-bit
//! length and the body. Bodies of odd length are followed by a padding byte.
//! Two subchunks are required:
//!
//! * The "fmt " subchunk, which describes the samples.
//! * The "data" subchunk, which contains the samples themselves.
//!
//! ## The "fmt " subchunk
//!
//! Offset | Size | Data            | Description
//! -----: | ---: | --------------- | -----------------------------------------
//!      0 |    2 | format          | 1 for integer PCM, 3 for IEEE float, 0xFFFE for extensible.
//!      2 |    2 | num channels    | Only mono and stereo are accepted.
//!      4 |    4 | sample rate     | The sample rate per second.
//!      8 |    4 | byte rate       | Ignored.
//!     12 |    2 | block align     | Ignored.
//!     14 |    2 | bits per sample | 8, 16, 24 or 32.
//!
//! Extensible files continue with:
//!
//! Offset | Size | Data            | Description
//! -----: | ---: | --------------- | -----------------------------------------
//!     16 |    2 | extra info size | Ignored.
//!     18 |    2 | valid bits      | Ignored; samples are read at their container width.
//!     20 |    4 | channel mask    | Ignored.
//!     24 |    2 | sub format      | The first two bytes of the sub format GUID, which replace `format`.
//!
//! ## The "data" subchunk
//!
//! Scanning stops at the "data" subchunk. Anything after it, such as a LIST
//! INFO chunk or an ID3 tag, is never read, and the declared data length is
//! used to stop reading samples before that trailing metadata.
//!
//! 8-bit wave data is unsigned; wider data is signed little-endian, or IEEE
//! float for format 3.
//!
//! See also:
//!
//! * [Multimedia Programming Interface and Data Specifications 1.0][1]
//! * [WAVEFORMATEXTENSIBLE structure][2]
//! * [Audio File Format Specifications][3]
//!
//! [1]: https://www.aelius.com/njh/wavemetatools/doc/riffmci.pdf
//! [2]: https://msdn.microsoft.com/en-us/library/windows/desktop/dd757714(v=vs.85).aspx
//! [3]: http://www-mmsp.ece.mcgill.ca/documents/audioformats/wave/wave.html

use std::io;
use std::result;

use thiserror::Error;


pub mod batch;
pub mod buffer;
pub mod config;
pub mod header;
pub mod pipeline;
pub mod skip;
pub mod source;
pub mod unpack;

pub use buffer::FrameBuffer;
pub use config::{InputFormat, RawPcmConfig, ReaderConfig, WriterConfig};
pub use header::WaveHeader;
pub use pipeline::{BlockCodec, CodecError, EncodeDriver, EncodeSummary, WriteError, WriteResult};
pub use skip::{DelayHints, SkipWindow, SoundFileFormat};
pub use source::{AudioSource, Frame};
pub use unpack::SampleLayout;

/// The frame size of an MPEG-1 Layer III encoder, in samples per channel.
pub const DEFAULT_FRAME_SIZE: usize = 1152;

// MARK: Error types

/// Represents an error that occurred while opening or reading an input.
#[derive(Debug, Error)]
pub enum ReadError {
    /// The file format is incorrect or unsupported.
    #[error("Format error: {0}")]
    Format(#[from] FormatErrorKind),
    /// An IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Represents a result when reading an input.
pub type ReadResult<T> = result::Result<T, ReadError>;

impl ReadError {
    /// Returns true if the input is a valid container holding samples we don't
    /// decode. Such files are reported and skipped rather than treated as
    /// failures.
    pub fn is_unsupported_sample_format(&self) -> bool {
        match *self {
            ReadError::Format(ref kind) => kind.class() == ErrorClass::UnsupportedSampleFormat,
            ReadError::Io(_) => false,
        }
    }
}

/// Represents a file format error, when the input is incorrect or unsupported.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatErrorKind {
    /// The file does not start with a "RIFF" tag.
    #[error("not a RIFF file")]
    NotARiffFile,
    /// The file doesn't continue with "WAVE" after the RIFF chunk header.
    #[error("not a WAVE file")]
    NotAWaveFile,
    /// The "fmt " chunk is too short to hold the PCM fields.
    #[error("fmt_ chunk is too short ({0} bytes)")]
    FmtChunkTooShort(u32),
    /// A "data" chunk was found before any "fmt " chunk.
    #[error("data chunk appears before the fmt_ chunk")]
    MissingFmtChunk,
    /// No "data" chunk was found within the chunk scanning limit.
    #[error("no data chunk found")]
    MissingDataChunk,
    /// The stream ended in the middle of the header.
    #[error("header is truncated")]
    TruncatedHeader,
    /// Only integer PCM and IEEE float samples are supported.
    #[error("unsupported data format 0x{0:04X}")]
    UnsupportedSampleFormat(u16),
    /// Only mono and stereo input is supported.
    #[error("unsupported number of channels: {0}")]
    UnsupportedNumChannels(u16),
    /// The sample rate is zero, which is invalid.
    #[error("sample rate is zero")]
    SampleRateIsZero,
    /// Only 8-bit, 16-bit, 24-bit and 32-bit integer samples and 32-bit float
    /// samples are supported.
    #[error("unsupported bits per sample: {0}")]
    UnsupportedBitsPerSample(u16),
    /// Unsigned samples are only supported at 8 bits.
    #[error("unsigned input is only supported with bitwidth 8, not {0}")]
    UnsignedRequiresEightBit(u16),
}

/// The coarse category of a [`FormatErrorKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The input is not a container we recognize.
    UnsupportedContainer,
    /// The container is recognized, but its structure is invalid.
    CorruptContainer,
    /// The container is valid, but holds samples in a format we don't decode.
    UnsupportedSampleFormat,
    /// The sample width or signedness can't be decoded.
    UnsupportedBitWidth,
}

impl FormatErrorKind {
    pub fn class(&self) -> ErrorClass {
        match *self {
            FormatErrorKind::NotARiffFile => ErrorClass::UnsupportedContainer,
            FormatErrorKind::NotAWaveFile
            | FormatErrorKind::FmtChunkTooShort(_)
            | FormatErrorKind::MissingFmtChunk
            | FormatErrorKind::MissingDataChunk
            | FormatErrorKind::TruncatedHeader
            | FormatErrorKind::UnsupportedNumChannels(_)
            | FormatErrorKind::SampleRateIsZero => ErrorClass::CorruptContainer,
            FormatErrorKind::UnsupportedSampleFormat(_) => ErrorClass::UnsupportedSampleFormat,
            FormatErrorKind::UnsupportedBitsPerSample(_)
            | FormatErrorKind::UnsignedRequiresEightBit(_) => ErrorClass::UnsupportedBitWidth,
        }
    }
}

// MARK: Format description

/// How each sample is represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SampleKind {
    Integer,
    Float,
}

/// Whether integer samples are signed. `Default` leaves the choice to the
/// bit width: unsigned at 8 bits, signed otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Signedness {
    Signed,
    Unsigned,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    /// Returns the opposite byte order.
    pub fn swapped(self) -> Endianness {
        match self {
            Endianness::Little => Endianness::Big,
            Endianness::Big => Endianness::Little,
        }
    }
}

/// Describes the samples of an input. Built once, when the input is opened,
/// either from the wave header or from a raw PCM configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFormat {
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub sample_kind: SampleKind,
    pub signedness: Signedness,
    pub byte_order: Endianness,
}

impl PcmFormat {
    /// The number of bytes used to store one sample of one channel.
    pub fn bytes_per_sample(&self) -> usize {
        (usize::from(self.bits_per_sample) + 7) / 8
    }

    /// The number of bytes used to store one sample frame.
    pub fn block_align(&self) -> usize {
        self.bytes_per_sample() * usize::from(self.num_channels)
    }

    /// Returns true if the samples are 8-bit unsigned.
    pub fn is_unsigned_8bit(&self) -> bool {
        self.bits_per_sample == 8 && self.signedness != Signedness::Signed
    }

    pub fn is_float(&self) -> bool {
        self.sample_kind == SampleKind::Float
    }
}

// MARK: Tests
