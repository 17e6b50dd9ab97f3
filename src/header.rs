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

//! Parsing of the RIFF/WAVE header.
//!
//! The parser only needs [`Read`], never [`Seek`](std::io::Seek): chunks we
//! don't care about are skipped by reading and discarding them, so that input
//! from a pipe works the same way as input from a file.

use std::io;
use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};
use tracing::debug;

use super::{Endianness, FormatErrorKind, PcmFormat, ReadError, ReadResult, SampleKind, Signedness};

// MARK: Validation and parsing functions

pub const FORMAT_UNCOMPRESSED_PCM: u16 = 0x0001;
pub const FORMAT_IEEE_FLOAT: u16 = 0x0003;
pub const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

// Upper bound on the number of subchunks inspected before giving up.
const MAX_SUBCHUNKS: usize = 20;

const MIN_FMT_SIZE: u64 = 16;

// cbSize, wValidBitsPerSample, dwChannelMask and the first two bytes of the
// sub format GUID.
const EXTENSIBLE_FIELDS_SIZE: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    UncompressedPcm,
    IeeeFloat,
}

fn validate_sample_format(format: u16) -> ReadResult<Format> {
    match format {
        FORMAT_UNCOMPRESSED_PCM => Ok(Format::UncompressedPcm),
        FORMAT_IEEE_FLOAT => Ok(Format::IeeeFloat),
        _ => Err(ReadError::Format(FormatErrorKind::UnsupportedSampleFormat(format))),
    }
}

fn validate_fmt_header_is_large_enough(declared: u32, min_size: u64) -> ReadResult<()> {
    if make_even(declared) < min_size {
        Err(ReadError::Format(FormatErrorKind::FmtChunkTooShort(declared)))
    } else {
        Ok(())
    }
}

fn validate_bits_per_sample(bits_per_sample: u16, format: Format) -> ReadResult<()> {
    let supported = match format {
        Format::UncompressedPcm => matches!(bits_per_sample, 8 | 16 | 24 | 32),
        Format::IeeeFloat => bits_per_sample == 32,
    };
    if supported {
        Ok(())
    } else {
        Err(ReadError::Format(FormatErrorKind::UnsupportedBitsPerSample(bits_per_sample)))
    }
}

/// Chunk bodies are word aligned, so an odd length is followed by a pad byte.
fn make_even(size: u32) -> u64 {
    u64::from(size) + u64::from(size & 1)
}

// Running out of input in the middle of the header means the header is
// broken, not that the device failed.
fn header_read_error(err: io::Error) -> ReadError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        ReadError::Format(FormatErrorKind::TruncatedHeader)
    } else {
        ReadError::Io(err)
    }
}

/// The fields of a "fmt " subchunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FmtChunk {
    /// The effective format: the sub format for extensible files, the format
    /// tag otherwise.
    pub format_tag: u16,
    pub num_channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Present for extensible files only.
    pub valid_bits_per_sample: Option<u16>,
    /// Present for extensible files only.
    pub channel_mask: Option<u32>,
}

/// A parsed and validated wave header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaveHeader {
    pub pcm_format: PcmFormat,
    pub fmt: FmtChunk,
    /// The length of the "data" subchunk, in bytes.
    pub data_length: u32,
    /// The number of sample frames in the "data" subchunk.
    pub num_samples: u64,
    /// The body of an "id3 " subchunk found before the data, if any.
    pub id3_tag: Option<Vec<u8>>,
}

impl WaveHeader {
    fn new(fmt: FmtChunk, data_length: u32, id3_tag: Option<Vec<u8>>) -> ReadResult<WaveHeader> {
        let format = validate_sample_format(fmt.format_tag)?;

        if fmt.num_channels != 1 && fmt.num_channels != 2 {
            return Err(ReadError::Format(FormatErrorKind::UnsupportedNumChannels(fmt.num_channels)));
        } else if fmt.sample_rate == 0 {
            return Err(ReadError::Format(FormatErrorKind::SampleRateIsZero));
        }
        validate_bits_per_sample(fmt.bits_per_sample, format)?;

        let pcm_format = PcmFormat {
            num_channels: fmt.num_channels,
            sample_rate: fmt.sample_rate,
            bits_per_sample: fmt.bits_per_sample,
            sample_kind: match format {
                Format::UncompressedPcm => SampleKind::Integer,
                Format::IeeeFloat => SampleKind::Float,
            },
            // 8-bit wave data is unsigned, everything wider is signed.
            signedness: if fmt.bits_per_sample == 8 {
                Signedness::Unsigned
            } else {
                Signedness::Signed
            },
            byte_order: Endianness::Little,
        };
        let num_samples = u64::from(data_length) / pcm_format.block_align() as u64;

        Ok(WaveHeader {
            pcm_format,
            fmt,
            data_length,
            num_samples,
            id3_tag,
        })
    }
}

/// Header parsing on top of any reader.
pub trait ReadWaveExt: Read + Sized {
    /// Parses the header and leaves the reader at the first byte of audio
    /// data. Nothing after the "data" subchunk header is read.
    fn read_wave_header(&mut self) -> ReadResult<WaveHeader> {
        // Validate the beginning of the file
        self.validate_is_riff_file()?;
        self.validate_is_wave_file()?;

        let mut fmt = None;
        let mut id3_tag = None;

        for _ in 0..MAX_SUBCHUNKS {
            let tag = self.read_tag()?;
            let subchunk_size = self.read_chunk_size()?;

            match &tag {
                b"fmt " => fmt = Some(self.read_fmt_chunk(subchunk_size)?),
                b"data" => {
                    let fmt = fmt.ok_or(FormatErrorKind::MissingFmtChunk)?;
                    return WaveHeader::new(fmt, subchunk_size, id3_tag);
                }
                b"id3 " | b"ID3 " => id3_tag = Some(self.read_subchunk_body(subchunk_size)?),
                _ => {
                    debug!(tag = %String::from_utf8_lossy(&tag), size = subchunk_size,
                           "skipping subchunk");
                    self.skip_bytes(make_even(subchunk_size))?;
                }
            }
        }

        Err(ReadError::Format(FormatErrorKind::MissingDataChunk))
    }

    /// Reads the body of a "fmt " subchunk whose header has just been read.
    fn read_fmt_chunk(&mut self, subchunk_size: u32) -> ReadResult<FmtChunk> {
        // A short chunk is rejected before any of its fields are read.
        validate_fmt_header_is_large_enough(subchunk_size, MIN_FMT_SIZE)?;
        let size = make_even(subchunk_size);

        let mut format_tag = self.read_le_u16()?;
        let num_channels = self.read_le_u16()?;
        let sample_rate = self.read_le_u32()?;
        // Ignore byte rate and block align. We derive both from the other fields.
        let _ = self.read_le_u32()?;
        let _ = self.read_le_u16()?;
        let bits_per_sample = self.read_le_u16()?;
        let mut read_so_far = MIN_FMT_SIZE;

        let mut valid_bits_per_sample = None;
        let mut channel_mask = None;
        if format_tag == FORMAT_EXTENSIBLE && size - read_so_far >= EXTENSIBLE_FIELDS_SIZE {
            // Ignore the extension size; the chunk size already tells us how
            // much is left.
            let _ = self.read_le_u16()?;
            valid_bits_per_sample = Some(self.read_le_u16()?);
            channel_mask = Some(self.read_le_u32()?);
            // The sub format GUID starts with the real format tag.
            format_tag = self.read_le_u16()?;
            read_so_far += EXTENSIBLE_FIELDS_SIZE;
        }

        self.skip_over_remainder(read_so_far, size)?;

        Ok(FmtChunk {
            format_tag,
            num_channels,
            sample_rate,
            bits_per_sample,
            valid_bits_per_sample,
            channel_mask,
        })
    }

    fn read_subchunk_body(&mut self, subchunk_size: u32) -> ReadResult<Vec<u8>> {
        let mut body = Vec::new();
        let read = self.by_ref().take(u64::from(subchunk_size)).read_to_end(&mut body)?;
        if read as u64 != u64::from(subchunk_size) {
            return Err(ReadError::Format(FormatErrorKind::TruncatedHeader));
        }
        self.skip_bytes(make_even(subchunk_size) - u64::from(subchunk_size))?;
        Ok(body)
    }

    fn skip_over_remainder(&mut self, read_so_far: u64, size: u64) -> ReadResult<()> {
        if read_so_far < size {
            self.skip_bytes(size - read_so_far)?;
        }
        Ok(())
    }

    /// Skips forward by reading and discarding. Works on pipes.
    fn skip_bytes(&mut self, count: u64) -> ReadResult<()> {
        let skipped = io::copy(&mut self.by_ref().take(count), &mut io::sink())?;
        if skipped < count {
            return Err(ReadError::Format(FormatErrorKind::TruncatedHeader));
        }
        Ok(())
    }

    fn validate_is_riff_file(&mut self) -> ReadResult<()> {
        self.validate_tag(b"RIFF", FormatErrorKind::NotARiffFile)?;
        // The next four bytes represent the chunk size. We're not going to
        // validate it, so that we can still try to read files that might have
        // an incorrect chunk size, so let's skip over it.
        let _ = self.read_chunk_size()?;
        Ok(())
    }

    fn validate_is_wave_file(&mut self) -> ReadResult<()> {
        self.validate_tag(b"WAVE", FormatErrorKind::NotAWaveFile)
    }

    fn validate_tag(&mut self, expected_tag: &[u8; 4], err_kind: FormatErrorKind) -> ReadResult<()> {
        let mut tag = [0u8; 4];
        match self.read_exact(&mut tag) {
            Ok(()) if &tag == expected_tag => Ok(()),
            Ok(()) => Err(ReadError::Format(err_kind)),
            Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                Err(ReadError::Format(err_kind))
            }
            Err(err) => Err(ReadError::Io(err)),
        }
    }

    fn read_tag(&mut self) -> ReadResult<[u8; 4]> {
        let mut tag: [u8; 4] = [0; 4];
        self.read_exact(&mut tag).map_err(header_read_error)?;
        Ok(tag)
    }

    fn read_chunk_size(&mut self) -> ReadResult<u32> {
        self.read_le_u32()
    }

    fn read_le_u16(&mut self) -> ReadResult<u16> {
        self.read_u16::<LittleEndian>().map_err(header_read_error)
    }

    fn read_le_u32(&mut self) -> ReadResult<u32> {
        self.read_u32::<LittleEndian>().map_err(header_read_error)
    }
}

impl<T> ReadWaveExt for T where T: Read {}

// MARK: Tests
