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

//! Frames wave files and writes them back out as interleaved 16-bit
//! little-endian PCM, one thread per file.
//!
//! ```text
//! RUST_LOG=debug cargo run --example frames -- recordings/ --frame-size 576
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wave_frames::batch::{run_jobs, wave_inputs, Job, JobOutcome};
use wave_frames::{BlockCodec, CodecError, Endianness, InputFormat, RawPcmConfig, ReaderConfig,
                  Signedness, WriterConfig, DEFAULT_FRAME_SIZE};

#[derive(Parser)]
#[command(name = "frames")]
#[command(about = "Frames wave files into 16-bit PCM", long_about = None)]
struct Cli {
    /// Wave files, or directories of wave files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Treat the inputs as headerless PCM
    #[arg(long)]
    raw: bool,

    /// Bits per sample of raw input
    #[arg(long, default_value_t = 16)]
    bits: u16,

    /// Channels of raw input
    #[arg(long, default_value_t = 2)]
    channels: u16,

    /// Sample rate of raw input
    #[arg(long, default_value_t = 44100)]
    rate: u32,

    /// Raw input is big-endian
    #[arg(long)]
    big_endian: bool,

    /// Raw 8-bit input is signed
    #[arg(long)]
    signed: bool,

    /// Reverse the byte order of every sample
    #[arg(long)]
    swap_bytes: bool,

    /// Exchange the left and right channels
    #[arg(long)]
    swap_channels: bool,

    /// Samples per channel in each frame
    #[arg(long, default_value_t = DEFAULT_FRAME_SIZE)]
    frame_size: usize,

    /// Flush the output after every frame
    #[arg(long)]
    flush: bool,
}

// Writes each frame as interleaved 16-bit little-endian samples.
struct Pcm16Codec {
    frame_size: usize,
}

impl BlockCodec for Pcm16Codec {
    fn frame_size(&self) -> usize {
        self.frame_size
    }

    fn encode(&mut self, left: &[i32], right: &[i32], out: &mut Vec<u8>) -> Result<(), CodecError> {
        out.reserve(left.len() * 4);
        for (&l, &r) in left.iter().zip(right) {
            out.extend_from_slice(&((l >> 16) as i16).to_le_bytes());
            out.extend_from_slice(&((r >> 16) as i16).to_le_bytes());
        }
        Ok(())
    }

    fn flush(&mut self, _: &mut Vec<u8>) -> Result<(), CodecError> {
        Ok(())
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if cli.frame_size == 0 {
        error!("frame size must be greater than 0");
        return ExitCode::FAILURE;
    }

    let input_format = if cli.raw {
        InputFormat::Raw(RawPcmConfig {
            bits_per_sample: cli.bits,
            signedness: if cli.signed { Signedness::Signed } else { Signedness::Default },
            byte_order: if cli.big_endian { Endianness::Big } else { Endianness::Little },
            num_channels: cli.channels,
            sample_rate: cli.rate,
        })
    } else {
        InputFormat::Wave
    };
    let reader = ReaderConfig {
        input_format,
        swap_bytes: cli.swap_bytes,
        swap_channels: cli.swap_channels,
        input_sample_rate: None,
    };
    let writer = WriterConfig { flush_write: cli.flush };

    let mut jobs = Vec::new();
    for path in &cli.inputs {
        let inputs = match wave_inputs(path) {
            Ok(inputs) => inputs,
            Err(err) => {
                error!(path = %path.display(), %err, "can't list inputs");
                return ExitCode::FAILURE;
            }
        };
        for input in inputs {
            let output = input.with_extension("pcm");
            jobs.push(Job::new(input, Pcm16Codec { frame_size: cli.frame_size })
                .with_output(output)
                .with_reader_config(reader.clone())
                .with_writer_config(writer));
        }
    }
    if jobs.is_empty() {
        error!("no wave files to frame");
        return ExitCode::FAILURE;
    }

    let report = run_jobs(jobs);
    for job in &report.jobs {
        match job.outcome {
            JobOutcome::Encoded(summary) => {
                info!("{:2}: {} -> {} ({} frames, {} samples)", job.index + 1, job.input.display(),
                      job.output.display(), summary.frames, summary.samples)
            }
            JobOutcome::Skipped(ref reason) => {
                info!("{:2}: {} skipped: {}", job.index + 1, job.input.display(), reason)
            }
            JobOutcome::Failed(ref err) => {
                error!("{:2}: {} failed: {}", job.index + 1, job.input.display(), err)
            }
        }
    }

    if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
