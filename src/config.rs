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

//! Reader and writer options.

use super::{Endianness, PcmFormat, SampleKind, Signedness};

/// Describes headerless PCM input. The caller has to know the layout, since
/// there is no header to read it from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RawPcmConfig {
    pub bits_per_sample: u16,
    pub signedness: Signedness,
    pub byte_order: Endianness,
    pub num_channels: u16,
    pub sample_rate: u32,
}

impl Default for RawPcmConfig {
    fn default() -> RawPcmConfig {
        RawPcmConfig {
            bits_per_sample: 16,
            signedness: Signedness::Default,
            byte_order: Endianness::Little,
            num_channels: 2,
            sample_rate: 44100,
        }
    }
}

impl RawPcmConfig {
    /// The format described by this configuration. Raw input is always
    /// integer PCM.
    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat {
            num_channels: self.num_channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_kind: SampleKind::Integer,
            signedness: self.signedness,
            byte_order: self.byte_order,
        }
    }
}

/// How the input should be interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputFormat {
    /// Parse a wave header.
    Wave,
    /// Skip header parsing and treat the whole input as samples.
    Raw(RawPcmConfig),
}

impl Default for InputFormat {
    fn default() -> InputFormat {
        InputFormat::Wave
    }
}

/// Options for opening an [`AudioSource`](crate::AudioSource).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReaderConfig {
    pub input_format: InputFormat,
    /// Reverses the byte order of samples wider than 8 bits.
    pub swap_bytes: bool,
    /// Exchanges the left and right channels of every frame.
    pub swap_channels: bool,
    /// Overrides the sample rate declared by the input.
    pub input_sample_rate: Option<u32>,
}

impl ReaderConfig {
    /// A configuration for headerless input.
    pub fn raw(raw: RawPcmConfig) -> ReaderConfig {
        ReaderConfig {
            input_format: InputFormat::Raw(raw),
            ..ReaderConfig::default()
        }
    }
}

/// Options for the output side of an [`EncodeDriver`](crate::EncodeDriver).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WriterConfig {
    /// Flushes the output after every write.
    pub flush_write: bool,
}
