//! Hash Command
//!
//! Computes the hash tree root of a local file.

use crate::config::{Engine, OutputFormat};
use crate::symbols;
use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use piecehash_core::{compute, compute_parallel, HashConfig, HashTreeRoot, StreamingHasher};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::PathBuf;
use tracing::info;

/// Hash configuration
pub struct HashOptions {
    pub path: PathBuf,
    pub engine: Engine,
    pub workers: usize,
    pub format: OutputFormat,
    pub progress: bool,
}

/// Result of hashing one file
#[derive(Debug, Serialize)]
pub struct HashReport {
    pub path: String,
    pub engine: Engine,
    pub content_length: u64,
    pub segment_size: usize,
    pub data_shards: usize,
    pub parity_shards: usize,
    pub segment_root: String,
    pub lane_roots: Vec<String>,
}

impl HashReport {
    fn new(
        options: &HashOptions,
        config: &HashConfig,
        root: &HashTreeRoot,
        content_length: u64,
    ) -> Self {
        let encoded = match options.format {
            OutputFormat::Base64 => root.to_base64(),
            OutputFormat::Hex | OutputFormat::Json => root.to_hex(),
        };
        let (segment_root, lane_roots) = match encoded.split_first() {
            Some((first, rest)) => (first.clone(), rest.to_vec()),
            None => (String::new(), Vec::new()),
        };

        Self {
            path: options.path.display().to_string(),
            engine: options.engine,
            content_length,
            segment_size: config.segment_size,
            data_shards: config.data_shards,
            parity_shards: config.parity_shards,
            segment_root,
            lane_roots,
        }
    }
}

/// Run hash command
pub fn run(config: &HashConfig, options: HashOptions) -> Result<()> {
    let report = hash_file(config, &options)?;
    match options.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Hex | OutputFormat::Base64 => print_report(&report),
    }
    Ok(())
}

/// Hash the file at `options.path` with the selected engine
pub fn hash_file(config: &HashConfig, options: &HashOptions) -> Result<HashReport> {
    config.validate().context("Invalid hashing configuration")?;

    let file = File::open(&options.path)
        .with_context(|| format!("Failed to open {}", options.path.display()))?;
    let size = file.metadata()?.len();

    let pb = if options.progress {
        let pb = ProgressBar::new(size);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")?
                .progress_chars("#>-"),
        );
        pb
    } else {
        ProgressBar::hidden()
    };
    let reader = pb.wrap_read(BufReader::new(file));

    let (root, content_length) = match options.engine {
        Engine::Batch => compute(reader, config),
        Engine::Parallel => compute_parallel(reader, config, options.workers),
        Engine::Stream => stream(reader, config),
    }
    .with_context(|| format!("Failed to hash {}", options.path.display()))?;
    pb.finish_and_clear();

    info!(
        path = %options.path.display(),
        engine = ?options.engine,
        content_length,
        "hashed file"
    );
    Ok(HashReport::new(options, config, &root, content_length))
}

/// Push the file through a streaming hasher one segment-sized chunk at a time
fn stream<R: Read>(mut reader: R, config: &HashConfig) -> piecehash_core::Result<(HashTreeRoot, u64)> {
    let mut hasher = StreamingHasher::new(*config)?;
    io::copy(&mut reader, &mut hasher)?;
    hasher.finish()
}

fn print_report(report: &HashReport) {
    println!();
    println!("{}", style(&report.path).bold());
    println!("{}", symbols::HLINE);
    println!(
        "  {:<10} {} bytes ({} segments of {} bytes, {}+{} shards)",
        style("length").dim(),
        report.content_length,
        segment_count(report),
        report.segment_size,
        report.data_shards,
        report.parity_shards
    );
    println!("  {:<10} {}", style("segments").cyan(), report.segment_root);
    for (lane, root) in report.lane_roots.iter().enumerate() {
        let label = format!("lane {}", lane);
        println!("  {:<10} {}", style(label).cyan(), root);
    }
    println!();
}

fn segment_count(report: &HashReport) -> u64 {
    let segment_size = report.segment_size as u64;
    report.content_length.div_ceil(segment_size)
}
