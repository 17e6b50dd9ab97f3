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

//! Unpacking of raw sample bytes into full-scale `i32` samples.
//!
//! Every sample is placed in the high-order bits of an `i32`, so that a
//! full-scale 8-bit sample and a full-scale 24-bit sample have the same
//! amplitude after unpacking. Float samples are quantized to the same range.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::{Endianness, FormatErrorKind, PcmFormat, ReadError, ReadResult, Signedness};

/// How raw bytes are turned into samples. Resolved once from a
/// [`PcmFormat`], before any sample is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleLayout {
    pub bytes_per_sample: usize,
    pub byte_order: Endianness,
    /// 8-bit samples are stored with a bias of 128.
    pub unsigned_8bit: bool,
    /// Samples are 32-bit IEEE floats.
    pub float: bool,
}

impl SampleLayout {
    /// Resolves the layout of `format`. With `swap_bytes` set, the byte order
    /// of samples wider than 8 bits is reversed.
    pub fn for_format(format: &PcmFormat, swap_bytes: bool) -> ReadResult<SampleLayout> {
        let bits_per_sample = format.bits_per_sample;
        match bits_per_sample {
            8 => {}
            16 | 24 | 32 => {
                if format.signedness == Signedness::Unsigned {
                    return Err(ReadError::Format(
                        FormatErrorKind::UnsignedRequiresEightBit(bits_per_sample)));
                }
            }
            _ => {
                return Err(ReadError::Format(
                    FormatErrorKind::UnsupportedBitsPerSample(bits_per_sample)))
            }
        }
        if format.is_float() && bits_per_sample != 32 {
            return Err(ReadError::Format(FormatErrorKind::UnsupportedBitsPerSample(bits_per_sample)));
        }

        let byte_order = if swap_bytes {
            format.byte_order.swapped()
        } else {
            format.byte_order
        };

        Ok(SampleLayout {
            bytes_per_sample: usize::from(bits_per_sample / 8),
            byte_order,
            unsigned_8bit: format.is_unsigned_8bit(),
            float: format.is_float(),
        })
    }
}

/// Unpacks the whole samples in `raw` into `out`, replacing its contents.
/// Returns the number of samples unpacked; a trailing partial sample is not
/// counted.
pub fn unpack(raw: &[u8], layout: &SampleLayout, out: &mut Vec<i32>) -> usize {
    out.clear();
    let whole = raw.len() / layout.bytes_per_sample;
    let raw = &raw[..whole * layout.bytes_per_sample];
    out.reserve(whole);

    match layout.byte_order {
        Endianness::Little => unpack_with::<LittleEndian>(raw, layout, out),
        Endianness::Big => unpack_with::<BigEndian>(raw, layout, out),
    }

    whole
}

fn unpack_with<B: ByteOrder>(raw: &[u8], layout: &SampleLayout, out: &mut Vec<i32>) {
    let samples = raw.chunks_exact(layout.bytes_per_sample);

    if layout.float {
        out.extend(samples.map(|s| float_to_sample(f32::from_bits(B::read_u32(s)))));
        return;
    }

    match layout.bytes_per_sample {
        1 if layout.unsigned_8bit => out.extend(samples.map(|s| unsigned_8bit_to_sample(s[0]))),
        1 => out.extend(samples.map(|s| i32::from(s[0] as i8) << 24)),
        2 => out.extend(samples.map(|s| i32::from(B::read_i16(s)) << 16)),
        3 => out.extend(samples.map(|s| B::read_i24(s) << 8)),
        _ => out.extend(samples.map(B::read_i32)),
    }
}

/// Removes the bias of an unsigned 8-bit sample and scales it up. The next
/// byte down is set to 0x7f rather than left at zero.
pub fn unsigned_8bit_to_sample(byte: u8) -> i32 {
    (i32::from((byte ^ 0x80) as i8) << 24) | (0x7f << 16)
}

/// Quantizes a float sample to the full `i32` range. Input outside [-1, 1]
/// saturates, and NaN becomes zero. All arithmetic is done in `f32`.
pub fn float_to_sample(value: f32) -> i32 {
    const SCALE_POSITIVE: f32 = i32::MAX as f32;
    const SCALE_NEGATIVE: f32 = -(i32::MIN as f32);

    if value >= 1.0 {
        i32::MAX
    } else if value <= -1.0 {
        i32::MIN
    } else if value >= 0.0 {
        (value * SCALE_POSITIVE + 0.5) as i32
    } else {
        (value * SCALE_NEGATIVE - 0.5) as i32
    }
}

// MARK: Tests
