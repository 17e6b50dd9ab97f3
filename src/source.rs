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

use std::fs::File;
use std::io;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::{info, trace};

use super::{FormatErrorKind, PcmFormat, ReadError, ReadResult, DEFAULT_FRAME_SIZE};
use super::buffer::FrameBuffer;
use super::config::{InputFormat, ReaderConfig};
use super::header::ReadWaveExt;
use super::skip::{DelayHints, SkipWindow, SoundFileFormat};
use super::unpack::{unpack, SampleLayout};

/// One frame of samples per channel, as handed to the encoder.
///
/// The buffers are allocated once, at the frame size, and reused for every
/// call to [`AudioSource::next_frame`].
#[derive(Debug, Clone)]
pub struct Frame {
    left: Vec<i32>,
    right: Vec<i32>,
    len: usize,
}

impl Frame {
    /// Returns an empty frame that holds up to `frame_size` samples per
    /// channel.
    pub fn new(frame_size: usize) -> Frame {
        assert!(frame_size > 0, "frame size must be greater than 0");
        Frame {
            left: vec![0; frame_size],
            right: vec![0; frame_size],
            len: 0,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.left.len()
    }

    /// The number of valid samples per channel.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn left(&self) -> &[i32] {
        &self.left[..self.len]
    }

    pub fn right(&self) -> &[i32] {
        &self.right[..self.len]
    }

    /// The left channel reduced to 16 bits.
    pub fn left_i16(&self) -> impl Iterator<Item = i16> + '_ {
        self.left().iter().map(|&sample| (sample >> 16) as i16)
    }

    /// The right channel reduced to 16 bits.
    pub fn right_i16(&self) -> impl Iterator<Item = i16> + '_ {
        self.right().iter().map(|&sample| (sample >> 16) as i16)
    }
}

impl Default for Frame {
    fn default() -> Frame {
        Frame::new(DEFAULT_FRAME_SIZE)
    }
}

/// An open input, read frame by frame.
///
/// The header is parsed when the source is created, so every format error is
/// reported before the first frame. Mono input is delivered with a silent
/// right channel.
#[derive(Debug)]
pub struct AudioSource<R>
    where R: Read
{
    reader: R,
    pcm_format: PcmFormat,
    input_format: SoundFileFormat,
    layout: SampleLayout,
    skip: SkipWindow,
    buffer: FrameBuffer<i32>,

    // The exact number of sample frames in the input, when the container
    // declares it. Reading stops there, so that trailing metadata is never
    // taken for audio.
    exact_samples: Option<u64>,
    // The number of sample frames the encoder should expect, after skipping.
    num_samples: Option<u64>,
    samples_read: u64,

    swap_channels: bool,
    id3_tag: Option<Vec<u8>>,

    // Scratch space, reused between reads.
    raw: Vec<u8>,
    samples: Vec<i32>,
    left: Vec<i32>,
    right: Vec<i32>,
}

impl AudioSource<BufReader<File>> {
    /// Opens the file at `path` and parses its header.
    pub fn open<P: AsRef<Path>>(path: P, config: &ReaderConfig) -> ReadResult<AudioSource<BufReader<File>>> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_len = file.metadata().ok().map(|metadata| metadata.len());
        let mut source = AudioSource::new(BufReader::new(file), config)?;

        // Without a header, estimate from the file size, assuming two bytes
        // per sample. The estimate is reported but never used to stop reading.
        if source.num_samples.is_none() {
            if let Some(len) = file_len {
                let estimate = len / (2 * u64::from(source.pcm_format.num_channels));
                source.num_samples = Some(source.skip.trim(estimate));
            }
        }

        info!(path = %path.display(),
              channels = source.pcm_format.num_channels,
              sample_rate = source.pcm_format.sample_rate,
              bits_per_sample = source.pcm_format.bits_per_sample,
              float = source.pcm_format.is_float(),
              num_samples = ?source.num_samples,
              "opened input");
        Ok(source)
    }
}

impl<R> AudioSource<R>
    where R: Read
{
    /// Returns a new source for the given reader. Unless the configuration
    /// asks for raw input, the reader must be at the start of a wave header.
    pub fn new(mut reader: R, config: &ReaderConfig) -> ReadResult<AudioSource<R>> {
        let (input_format, mut pcm_format, exact_samples, id3_tag) = match config.input_format {
            InputFormat::Wave => {
                let header = reader.read_wave_header()?;
                (SoundFileFormat::Wave, header.pcm_format, Some(header.num_samples), header.id3_tag)
            }
            InputFormat::Raw(ref raw) => {
                if config.swap_bytes {
                    info!("assuming raw pcm input, forcing byte-swapping");
                } else {
                    info!("assuming raw pcm input");
                }
                (SoundFileFormat::Raw, raw.pcm_format(), None, None)
            }
        };

        if let Some(sample_rate) = config.input_sample_rate {
            pcm_format.sample_rate = sample_rate;
        }
        if pcm_format.num_channels != 1 && pcm_format.num_channels != 2 {
            return Err(ReadError::Format(
                FormatErrorKind::UnsupportedNumChannels(pcm_format.num_channels)));
        } else if pcm_format.sample_rate == 0 {
            return Err(ReadError::Format(FormatErrorKind::SampleRateIsZero));
        }
        let layout = SampleLayout::for_format(&pcm_format, config.swap_bytes)?;

        let skip = SkipWindow::for_input(input_format, DelayHints::default(), 0);

        Ok(AudioSource {
            reader,
            pcm_format,
            input_format,
            layout,
            skip,
            buffer: FrameBuffer::new(skip),
            exact_samples,
            num_samples: exact_samples.map(|samples| skip.trim(samples)),
            samples_read: 0,
            swap_channels: config.swap_channels,
            id3_tag,
            raw: Vec::new(),
            samples: Vec::new(),
            left: Vec::new(),
            right: Vec::new(),
        })
    }

    pub fn pcm_format(&self) -> &PcmFormat {
        &self.pcm_format
    }

    pub fn input_format(&self) -> SoundFileFormat {
        self.input_format
    }

    pub fn layout(&self) -> &SampleLayout {
        &self.layout
    }

    pub fn skip_window(&self) -> SkipWindow {
        self.skip
    }

    /// The number of sample frames the encoder will receive, if known. For
    /// raw input opened from a file this is an estimate.
    pub fn num_samples(&self) -> Option<u64> {
        self.num_samples
    }

    /// The number of sample frames read from the input so far, including any
    /// that were skipped.
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// A tag that was found in the input, to be carried over to the output.
    pub fn old_tag(&self) -> Option<&[u8]> {
        self.id3_tag.as_deref()
    }

    /// Fills `frame` with up to `frame.frame_size()` samples per channel and
    /// returns how many it holds. Zero means the input is exhausted.
    pub fn next_frame(&mut self, frame: &mut Frame) -> ReadResult<usize> {
        let frame_size = frame.frame_size();

        loop {
            let read = self.read_samples(frame_size)?;
            let available = self.buffer.feed(&self.left, &self.right);
            if available > 0 || read == 0 {
                break;
            }
        }

        let (left, right) = if self.swap_channels {
            (&mut frame.right, &mut frame.left)
        } else {
            (&mut frame.left, &mut frame.right)
        };
        let taken = self.buffer.take(Some(&mut left[..]), Some(&mut right[..]), frame_size);
        frame.len = taken;

        Ok(taken)
    }

    // Reads up to `frame_size` sample frames into `self.left` and
    // `self.right`, returning how many were read.
    fn read_samples(&mut self, frame_size: usize) -> ReadResult<usize> {
        let num_channels = usize::from(self.pcm_format.num_channels);
        let wanted = self.samples_to_read(frame_size);

        self.raw.resize(wanted * num_channels * self.layout.bytes_per_sample, 0);
        let bytes_read = read_fully(&mut self.reader, &mut self.raw)?;
        let count = unpack(&self.raw[..bytes_read], &self.layout, &mut self.samples);
        let frames = count / num_channels;

        self.left.clear();
        self.right.clear();
        if num_channels == 2 {
            for pair in self.samples.chunks_exact(2) {
                self.left.push(pair[0]);
                self.right.push(pair[1]);
            }
        } else {
            self.left.extend_from_slice(&self.samples[..frames]);
            self.right.resize(frames, 0);
        }

        self.samples_read += frames as u64;
        trace!(frames, samples_read = self.samples_read, "read samples");
        Ok(frames)
    }

    fn samples_to_read(&self, frame_size: usize) -> usize {
        match self.exact_samples {
            // A count of zero comes from streamed files that were never
            // finalized; it means "unknown", not "empty".
            Some(total) if total != 0 => {
                let remaining = total.saturating_sub(self.samples_read);
                usize::try_from(remaining).map_or(frame_size, |remaining| remaining.min(frame_size))
            }
            _ => frame_size,
        }
    }
}

// Like `read_exact`, but a short read at the end of the input is not an
// error. Returns the number of bytes read.
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref err) if err.kind() == io::ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

// MARK: Tests

#[cfg(test)]
mod tests {
    use std::io;
    use std::io::{Cursor, Read, Write};

    use byteorder::{LittleEndian, WriteBytesExt};

    use super::{AudioSource, Frame};
    use crate::config::{RawPcmConfig, ReaderConfig};
    use crate::skip::SoundFileFormat;
    use crate::{Endianness, FormatErrorKind, ReadError, Signedness};

    fn wave(format_tag: u16, num_channels: u16, bits_per_sample: u16, data: &[u8], trailer: &[u8]) -> Vec<u8> {
        let mut vec = Vec::new();
        vec.write_all(b"RIFF\x00\x00\x00\x00WAVEfmt ").unwrap();
        vec.write_u32::<LittleEndian>(16).unwrap();
        vec.write_u16::<LittleEndian>(format_tag).unwrap();
        vec.write_u16::<LittleEndian>(num_channels).unwrap();
        vec.write_u32::<LittleEndian>(8000).unwrap();
        vec.write_u32::<LittleEndian>(0).unwrap();
        vec.write_u16::<LittleEndian>(0).unwrap();
        vec.write_u16::<LittleEndian>(bits_per_sample).unwrap();
        vec.write_all(b"data").unwrap();
        vec.write_u32::<LittleEndian>(data.len() as u32).unwrap();
        vec.write_all(data).unwrap();
        vec.write_all(trailer).unwrap();
        vec
    }

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        let mut vec = Vec::new();
        for &sample in samples {
            vec.write_i16::<LittleEndian>(sample).unwrap();
        }
        vec
    }

    fn drain<R: Read>(source: &mut AudioSource<R>, frame_size: usize) -> (Vec<i32>, Vec<i32>, Vec<usize>) {
        let mut frame = Frame::new(frame_size);
        let mut left = Vec::new();
        let mut right = Vec::new();
        let mut sizes = Vec::new();
        while source.next_frame(&mut frame).unwrap() > 0 {
            left.extend_from_slice(frame.left());
            right.extend_from_slice(frame.right());
            sizes.push(frame.len());
        }
        (left, right, sizes)
    }

    #[test]
    fn test_mono_right_channel_is_silent() {
        let data = i16_bytes(&[1, 2, 3, 4, 5]);
        let mut source = AudioSource::new(Cursor::new(wave(1, 1, 16, &data, b"")),
                                          &ReaderConfig::default()).unwrap();
        assert_eq!(SoundFileFormat::Wave, source.input_format());
        assert_eq!(Some(5), source.num_samples());

        let (left, right, sizes) = drain(&mut source, 2);
        assert_eq!(vec![1 << 16, 2 << 16, 3 << 16, 4 << 16, 5 << 16], left);
        assert_eq!(vec![0; 5], right);
        assert_eq!(vec![2, 2, 1], sizes);
        assert_eq!(5, source.samples_read());
    }

    #[test]
    fn test_stereo_is_deinterleaved_and_swappable() {
        let data = i16_bytes(&[1, -1, 2, -2, 3, -3]);

        let mut source = AudioSource::new(Cursor::new(wave(1, 2, 16, &data, b"")),
                                          &ReaderConfig::default()).unwrap();
        let (left, right, _) = drain(&mut source, 1152);
        assert_eq!(vec![1 << 16, 2 << 16, 3 << 16], left);
        assert_eq!(vec![-1 << 16, -2 << 16, -3 << 16], right);

        let config = ReaderConfig { swap_channels: true, ..ReaderConfig::default() };
        let mut source = AudioSource::new(Cursor::new(wave(1, 2, 16, &data, b"")), &config).unwrap();
        let (left, right, _) = drain(&mut source, 1152);
        assert_eq!(vec![-1 << 16, -2 << 16, -3 << 16], left);
        assert_eq!(vec![1 << 16, 2 << 16, 3 << 16], right);
    }

    #[test]
    fn test_trailing_chunks_are_not_read_as_audio() {
        let data = i16_bytes(&[10, 20, 30]);
        let bytes = wave(1, 1, 16, &data, b"LIST\x04\x00\x00\x00abcd");
        let mut source = AudioSource::new(Cursor::new(bytes), &ReaderConfig::default()).unwrap();

        let (left, _, _) = drain(&mut source, 1152);
        assert_eq!(vec![10 << 16, 20 << 16, 30 << 16], left);
    }

    #[test]
    fn test_unfinalized_data_length_reads_to_the_end() {
        let mut bytes = wave(1, 1, 16, b"", b"");
        bytes.extend_from_slice(&i16_bytes(&[7, 8]));
        let mut source = AudioSource::new(Cursor::new(bytes), &ReaderConfig::default()).unwrap();

        let (left, _, _) = drain(&mut source, 1152);
        assert_eq!(vec![7 << 16, 8 << 16], left);
    }

    #[test]
    fn test_exhausted_source_keeps_returning_zero() {
        let data = i16_bytes(&[1]);
        let mut source = AudioSource::new(Cursor::new(wave(1, 1, 16, &data, b"")),
                                          &ReaderConfig::default()).unwrap();
        let mut frame = Frame::new(4);
        assert_eq!(1, source.next_frame(&mut frame).unwrap());
        assert_eq!(0, source.next_frame(&mut frame).unwrap());
        assert!(frame.is_empty());
        assert_eq!(0, source.next_frame(&mut frame).unwrap());
    }

    #[test]
    fn test_8bit_wave_is_unsigned() {
        let mut source = AudioSource::new(Cursor::new(wave(1, 1, 8, b"\x80\xFF\x00", b"")),
                                          &ReaderConfig::default()).unwrap();
        let (left, _, _) = drain(&mut source, 16);
        assert_eq!(vec![0x007f_0000, 0x7f7f_0000, 0x807f_0000u32 as i32], left);
    }

    #[test]
    fn test_float_wave() {
        let mut data = Vec::new();
        for &value in &[0.5f32, -2.0] {
            data.write_f32::<LittleEndian>(value).unwrap();
        }
        let mut source = AudioSource::new(Cursor::new(wave(3, 1, 32, &data, b"")),
                                          &ReaderConfig::default()).unwrap();
        let (left, _, _) = drain(&mut source, 16);
        assert_eq!(vec![1 << 30, i32::MIN], left);
    }

    #[test]
    fn test_frame_16bit_view() {
        let data = i16_bytes(&[-3, 300]);
        let mut source = AudioSource::new(Cursor::new(wave(1, 2, 16, &data, b"")),
                                          &ReaderConfig::default()).unwrap();
        let mut frame = Frame::new(8);
        assert_eq!(1, source.next_frame(&mut frame).unwrap());
        assert_eq!(vec![-3i16], frame.left_i16().collect::<Vec<_>>());
        assert_eq!(vec![300i16], frame.right_i16().collect::<Vec<_>>());
    }

    // Delivers at most one byte per read, like a slow pipe.
    struct Trickle<R>(R);

    impl<R: Read> Read for Trickle<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_short_reads_are_retried() {
        let data = i16_bytes(&[1, 2, 3, 4, 5, 6]);
        let reader = Trickle(Cursor::new(wave(1, 2, 16, &data, b"")));
        let mut source = AudioSource::new(reader, &ReaderConfig::default()).unwrap();

        let (left, right, sizes) = drain(&mut source, 2);
        assert_eq!(vec![1 << 16, 3 << 16, 5 << 16], left);
        assert_eq!(vec![2 << 16, 4 << 16, 6 << 16], right);
        assert_eq!(vec![2, 1], sizes);
    }

    // Yields the header, then fails.
    struct Failing {
        header: Cursor<Vec<u8>>,
    }

    impl Read for Failing {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.header.read(buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "device gone"));
            }
            Ok(n)
        }
    }

    #[test]
    fn test_read_errors_are_surfaced() {
        let reader = Failing { header: Cursor::new(wave(1, 1, 16, b"", b"")) };
        let mut source = AudioSource::new(reader, &ReaderConfig::default()).unwrap();
        let mut frame = Frame::default();
        assert_matches!(Err(ReadError::Io(_)), source.next_frame(&mut frame));
    }

    #[test]
    fn test_format_errors_happen_before_reading_frames() {
        assert_matches!(Err(ReadError::Format(FormatErrorKind::NotARiffFile)),
                        AudioSource::new(Cursor::new(b"OggS\x00\x00\x00\x00".to_vec()),
                                         &ReaderConfig::default()));
        assert_matches!(Err(ReadError::Format(FormatErrorKind::UnsupportedSampleFormat(6))),
                        AudioSource::new(Cursor::new(wave(6, 1, 8, b"", b"")),
                                         &ReaderConfig::default()));
    }

    // Raw input

    #[test]
    fn test_raw_big_endian_mono() {
        let raw = RawPcmConfig {
            byte_order: Endianness::Big,
            num_channels: 1,
            ..RawPcmConfig::default()
        };
        let mut source = AudioSource::new(Cursor::new(b"\x00\x01\xFF\xFE".to_vec()),
                                          &ReaderConfig::raw(raw)).unwrap();
        assert_eq!(SoundFileFormat::Raw, source.input_format());
        assert_eq!(None, source.num_samples());

        let (left, _, _) = drain(&mut source, 1152);
        assert_eq!(vec![1 << 16, -2 << 16], left);
    }

    #[test]
    fn test_raw_swap_bytes() {
        let raw = RawPcmConfig { num_channels: 1, ..RawPcmConfig::default() };
        let config = ReaderConfig { swap_bytes: true, ..ReaderConfig::raw(raw) };
        let mut source = AudioSource::new(Cursor::new(b"\x00\x01".to_vec()), &config).unwrap();

        let (left, _, _) = drain(&mut source, 1152);
        assert_eq!(vec![1 << 16], left);
    }

    #[test]
    fn test_raw_signed_8bit() {
        let raw = RawPcmConfig {
            bits_per_sample: 8,
            signedness: Signedness::Signed,
            num_channels: 1,
            ..RawPcmConfig::default()
        };
        let mut source = AudioSource::new(Cursor::new(b"\x01\xFF".to_vec()),
                                          &ReaderConfig::raw(raw)).unwrap();
        let (left, _, _) = drain(&mut source, 1152);
        assert_eq!(vec![1 << 24, -1 << 24], left);
    }

    #[test]
    fn test_raw_rejects_unsigned_16bit() {
        let raw = RawPcmConfig { signedness: Signedness::Unsigned, ..RawPcmConfig::default() };
        assert_matches!(Err(ReadError::Format(FormatErrorKind::UnsignedRequiresEightBit(16))),
                        AudioSource::new(Cursor::new(Vec::new()), &ReaderConfig::raw(raw)));
    }

    #[test]
    fn test_raw_rejects_three_channels() {
        let raw = RawPcmConfig { num_channels: 3, ..RawPcmConfig::default() };
        assert_matches!(Err(ReadError::Format(FormatErrorKind::UnsupportedNumChannels(3))),
                        AudioSource::new(Cursor::new(Vec::new()), &ReaderConfig::raw(raw)));
    }

    #[test]
    fn test_input_sample_rate_override() {
        let config = ReaderConfig { input_sample_rate: Some(22050), ..ReaderConfig::default() };
        let source = AudioSource::new(Cursor::new(wave(1, 1, 16, b"", b"")), &config).unwrap();
        assert_eq!(22050, source.pcm_format().sample_rate);

        let config = ReaderConfig { input_sample_rate: Some(0), ..ReaderConfig::default() };
        assert_matches!(Err(ReadError::Format(FormatErrorKind::SampleRateIsZero)),
                        AudioSource::new(Cursor::new(wave(1, 1, 16, b"", b"")), &config));
    }
}
