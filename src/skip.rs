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

//! Lead-in and lead-out trimming.
//!
//! Decoders of compressed input emit a number of samples at the start of the
//! stream that are delay rather than audio, and encoders pad the end. PCM
//! containers have neither, so their window is always empty; the policy for
//! the compressed kinds is kept so that every container kind has a defined
//! window.

/// The kind of container an input was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoundFileFormat {
    Raw,
    Wave,
    Aiff,
    /// MPEG Layer 1.
    Mp1,
    /// MPEG Layer 2.
    Mp2,
    /// MPEG Layer 3.
    Mp3,
    /// MPEG Layer 1, 2 or 3, whichever the stream turns out to contain.
    Mp123,
}

/// The MPEG Layer 3 decoder delay (528 samples) plus one.
pub const MP3_DECODER_DELAY: i64 = 528 + 1;

/// The MPEG Layer 1 and 2 decoder delay (240 samples) plus one.
pub const MP12_DECODER_DELAY: i64 = 240 + 1;

/// Encoder delay and padding, as recorded by the encoder of a compressed
/// stream (in a LAME tag, for example).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DelayHints {
    pub encoder_delay: Option<i64>,
    pub encoder_padding: Option<i64>,
}

/// Sample frames to drop at the start and at the end of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SkipWindow {
    pub start: usize,
    pub end: usize,
}

impl SkipWindow {
    pub fn new(start: usize, end: usize) -> SkipWindow {
        SkipWindow { start, end }
    }

    /// Computes the window for an input of the given kind. `fallback_delay`
    /// is used for MPEG Layer 3 input that carries no hints.
    pub fn for_input(format: SoundFileFormat, hints: DelayHints, fallback_delay: u32) -> SkipWindow {
        let (start, end) = match format {
            SoundFileFormat::Raw
            | SoundFileFormat::Wave
            | SoundFileFormat::Aiff
            | SoundFileFormat::Mp123 => (0, 0),
            SoundFileFormat::Mp1 | SoundFileFormat::Mp2 => (MP12_DECODER_DELAY, 0),
            SoundFileFormat::Mp3 => match (hints.encoder_delay, hints.encoder_padding) {
                (None, None) => (i64::from(fallback_delay) + MP3_DECODER_DELAY, 0),
                (delay, padding) => (
                    delay.map_or(0, |delay| delay + MP3_DECODER_DELAY),
                    padding.map_or(0, |padding| padding - MP3_DECODER_DELAY),
                ),
            },
        };

        SkipWindow {
            start: clamp_to_usize(start),
            end: clamp_to_usize(end),
        }
    }

    /// The total number of sample frames dropped.
    pub fn len(&self) -> usize {
        self.start + self.end
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adjusts a declared sample count for the frames this window drops.
    pub fn trim(&self, num_samples: u64) -> u64 {
        num_samples.saturating_sub(self.len() as u64)
    }
}

fn clamp_to_usize(value: i64) -> usize {
    if value < 0 {
        0
    } else {
        usize::try_from(value).unwrap_or(usize::MAX)
    }
}
