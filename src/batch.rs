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

//! Encoding several files at once, one thread per file.
//!
//! Every worker owns its source, its codec and its output; nothing is shared
//! between them. A worker that fails, or panics, only fails its own file.

use std::any::Any;
use std::fs;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::thread;

use thiserror::Error;
use tracing::{error, info, info_span, warn};

use super::{ErrorClass, FormatErrorKind, ReadError};
use super::config::{ReaderConfig, WriterConfig};
use super::pipeline::{BlockCodec, EncodeDriver, EncodeSummary, WriteError};
use super::source::AudioSource;

/// Why a job failed.
#[derive(Debug, Error)]
pub enum JobError {
    /// The output would overwrite the input.
    #[error("the output path is the same as the input path: {0}")]
    SameInputOutput(PathBuf),
    /// The input could not be opened or its header is invalid.
    #[error("can't open input: {0}")]
    Open(#[source] ReadError),
    /// The output file could not be created.
    #[error("can't create output: {0}")]
    Create(#[source] io::Error),
    /// Encoding failed part way through.
    #[error("encoding failed: {0}")]
    Encode(#[from] WriteError),
    /// The worker thread could not be started.
    #[error("can't start worker: {0}")]
    Spawn(#[source] io::Error),
    /// The worker thread panicked.
    #[error("worker panicked: {0}")]
    Panicked(String),
}

/// One file to encode.
pub struct Job<C> {
    pub input: PathBuf,
    pub output: PathBuf,
    pub codec: C,
    pub reader: ReaderConfig,
    pub writer: WriterConfig,
}

impl<C> Job<C>
    where C: BlockCodec
{
    /// Returns a job that writes next to the input, with its extension
    /// replaced by "mp3".
    pub fn new<P: Into<PathBuf>>(input: P, codec: C) -> Job<C> {
        let input = input.into();
        Job {
            output: default_output_path(&input),
            input,
            codec,
            reader: ReaderConfig::default(),
            writer: WriterConfig::default(),
        }
    }

    pub fn with_output<P: Into<PathBuf>>(mut self, output: P) -> Job<C> {
        self.output = output.into();
        self
    }

    pub fn with_reader_config(mut self, reader: ReaderConfig) -> Job<C> {
        self.reader = reader;
        self
    }

    pub fn with_writer_config(mut self, writer: WriterConfig) -> Job<C> {
        self.writer = writer;
        self
    }
}

/// The path an input is encoded to when no output is given.
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_extension("mp3")
}

/// Expands `path` into the wave files to encode: every ".wav" file directly
/// inside it if it is a directory, or the path itself if it names a ".wav"
/// file. Directory entries are returned in name order.
pub fn wave_inputs(path: &Path) -> io::Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(if is_wave_path(path) { vec![path.to_path_buf()] } else { Vec::new() });
    }

    let mut inputs = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_file() && is_wave_path(&entry.path()) {
            inputs.push(entry.path());
        }
    }
    inputs.sort();
    Ok(inputs)
}

fn is_wave_path(path: &Path) -> bool {
    path.extension().map_or(false, |extension| extension == "wav")
}

/// How a job ended.
#[derive(Debug)]
pub enum JobOutcome {
    Encoded(EncodeSummary),
    /// The input holds samples that can't be decoded. This does not fail
    /// the batch.
    Skipped(FormatErrorKind),
    Failed(JobError),
}

impl JobOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(*self, JobOutcome::Failed(_))
    }
}

/// The outcome of one job of a batch.
#[derive(Debug)]
pub struct JobReport {
    pub index: usize,
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: JobOutcome,
}

/// The outcomes of a batch, in job order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub jobs: Vec<JobReport>,
}

impl BatchReport {
    /// Returns true if no job failed. Skipped jobs are not failures.
    pub fn is_success(&self) -> bool {
        !self.jobs.iter().any(|job| job.outcome.is_failure())
    }

    pub fn encoded(&self) -> usize {
        self.count(|outcome| matches!(*outcome, JobOutcome::Encoded(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(*outcome, JobOutcome::Skipped(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(JobOutcome::is_failure)
    }

    fn count<F: Fn(&JobOutcome) -> bool>(&self, predicate: F) -> usize {
        self.jobs.iter().filter(|job| predicate(&job.outcome)).count()
    }
}

/// Runs every job on a thread of its own and waits for all of them.
pub fn run_jobs<C>(jobs: Vec<Job<C>>) -> BatchReport
    where C: BlockCodec + Send + 'static
{
    let mut handles = Vec::with_capacity(jobs.len());

    for (index, job) in jobs.into_iter().enumerate() {
        let input = job.input.clone();
        let output = job.output.clone();
        let spawned = thread::Builder::new()
            .name(format!("encode-{}", index))
            .spawn(move || {
                let input = job.input.display().to_string();
                let _span = info_span!("encode", index, input = %input).entered();
                run_job(job)
            });

        match spawned {
            Ok(handle) => handles.push((index, input, output, Ok(handle))),
            Err(err) => {
                error!(index, %err, "can't start worker");
                handles.push((index, input, output, Err(JobError::Spawn(err))));
            }
        }
    }

    let mut report = BatchReport::default();
    for (index, input, output, handle) in handles {
        let outcome = match handle {
            Ok(handle) => handle.join().unwrap_or_else(|panic| {
                let message = panic_message(panic);
                error!(index, %message, "worker panicked");
                JobOutcome::Failed(JobError::Panicked(message))
            }),
            Err(err) => JobOutcome::Failed(err),
        };
        report.jobs.push(JobReport { index, input, output, outcome });
    }

    info!(encoded = report.encoded(), skipped = report.skipped(), failed = report.failed(),
          "batch finished");
    report
}

/// Runs one job on the current thread.
pub fn run_job<C: BlockCodec>(job: Job<C>) -> JobOutcome {
    match encode_file(job) {
        Ok(summary) => JobOutcome::Encoded(summary),
        Err(JobError::Open(ReadError::Format(kind)))
            if kind.class() == ErrorClass::UnsupportedSampleFormat => {
            warn!(reason = %kind, "skipping input");
            JobOutcome::Skipped(kind)
        }
        Err(err) => {
            error!(%err, "encoding failed");
            JobOutcome::Failed(err)
        }
    }
}

fn encode_file<C: BlockCodec>(job: Job<C>) -> Result<EncodeSummary, JobError> {
    if is_same_file(&job.input, &job.output) {
        return Err(JobError::SameInputOutput(job.output));
    }

    let mut source = AudioSource::open(&job.input, &job.reader).map_err(JobError::Open)?;
    let file = File::create(&job.output).map_err(JobError::Create)?;
    info!(output = %job.output.display(), "encoding");

    let mut driver = EncodeDriver::new(job.codec, BufWriter::new(file), job.writer);
    let result = driver.run(&mut source);
    let (_, mut writer) = driver.into_inner();
    let result = result.and_then(|summary| {
        writer.flush()?;
        Ok(summary)
    });
    drop(writer);

    result.map_err(|err| {
        if let Err(remove_err) = fs::remove_file(&job.output) {
            warn!(output = %job.output.display(), err = %remove_err, "can't remove partial output");
        }
        JobError::Encode(err)
    })
}

fn is_same_file(input: &Path, output: &Path) -> bool {
    if input == output {
        return true;
    }
    match (fs::canonicalize(input), fs::canonicalize(output)) {
        (Ok(input), Ok(output)) => input == output,
        _ => false,
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    match panic.downcast::<String>() {
        Ok(message) => *message,
        Err(panic) => match panic.downcast::<&str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "unknown panic".to_string(),
        },
    }
}

// MARK: Tests
