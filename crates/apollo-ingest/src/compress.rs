//! Streaming compression and content addressing
//!
//! A source file is read block by block; every block goes to the digest and
//! to a gzip encoder writing `<output>/<basename>.gz`. Once the input is
//! exhausted the temporary file is renamed to `<output>/<hex digest>`, so a
//! partially written artifact is never visible under its final name.

use apollo_common::checksum::StreamingHasher;
use apollo_common::types::ChecksumAlgorithm;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{IngestError, IngestResult};

/// A compressed copy of a source file, named by the digest of its content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressedArtifact {
    pub path: PathBuf,
    pub checksum: String,
    pub source_bytes: u64,
}

/// Compresses and hashes source files into an output directory
#[derive(Debug, Clone)]
pub struct Compressor {
    output_dir: PathBuf,
    block_size: usize,
    algorithm: ChecksumAlgorithm,
}

impl Compressor {
    pub fn new(output_dir: impl Into<PathBuf>, block_size: usize, algorithm: ChecksumAlgorithm) -> Self {
        Self {
            output_dir: output_dir.into(),
            block_size: block_size.max(1),
            algorithm,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Compress `source` on the blocking pool.
    pub async fn compress(&self, source: &Path) -> IngestResult<CompressedArtifact> {
        let compressor = self.clone();
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || compressor.compress_file(&source)).await?
    }

    /// Compress `source`, returning the artifact path and digest.
    ///
    /// On any failure the temporary `.gz` file is removed and the error is
    /// returned; nothing is left under the final name.
    pub fn compress_file(&self, source: &Path) -> IngestResult<CompressedArtifact> {
        let file_name = source
            .file_name()
            .ok_or_else(|| IngestError::FileNotFound(source.to_path_buf()))?
            .to_string_lossy()
            .to_string();

        let input = File::open(source).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => IngestError::FileNotFound(source.to_path_buf()),
            _ => compression_error(source, e),
        })?;

        let temp_path = self.output_dir.join(format!("{}.gz", file_name));

        let (checksum, source_bytes) = match self.stream(input, &temp_path) {
            Ok(result) => result,
            Err(e) => {
                discard_temp(&temp_path);
                return Err(compression_error(source, e));
            },
        };

        let final_path = self.output_dir.join(&checksum);
        if let Err(e) = std::fs::rename(&temp_path, &final_path) {
            discard_temp(&temp_path);
            return Err(compression_error(source, e));
        }

        info!(
            file = %file_name,
            checksum = %checksum,
            artifact = %final_path.display(),
            bytes = source_bytes,
            "Compressed source file"
        );

        Ok(CompressedArtifact {
            path: final_path,
            checksum,
            source_bytes,
        })
    }

    fn stream(&self, mut input: File, temp_path: &Path) -> io::Result<(String, u64)> {
        std::fs::create_dir_all(&self.output_dir)?;

        let output = File::create(temp_path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
        let mut hasher = StreamingHasher::new(self.algorithm);
        let mut block = vec![0u8; self.block_size];
        let mut total = 0u64;

        loop {
            let read = input.read(&mut block)?;
            if read == 0 {
                break;
            }
            hasher.update(&block[..read]);
            encoder.write_all(&block[..read])?;
            total += read as u64;
        }

        let writer = encoder.finish()?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        debug!(temp = %temp_path.display(), bytes = total, "Finished streaming source");
        Ok((hasher.finalize_hex(), total))
    }
}

/// Open a gzip artifact as a buffered stream of decompressed bytes.
pub fn open_decompressed(path: &Path) -> io::Result<BufReader<GzDecoder<File>>> {
    let file = File::open(path)?;
    Ok(BufReader::new(GzDecoder::new(file)))
}

fn compression_error(path: &Path, source: io::Error) -> IngestError {
    IngestError::Compression {
        path: path.to_path_buf(),
        source,
    }
}

fn discard_temp(temp_path: &Path) {
    if let Err(e) = std::fs::remove_file(temp_path) {
        if e.kind() != io::ErrorKind::NotFound {
            warn!(temp = %temp_path.display(), error = %e, "Failed to remove temporary artifact");
        }
    }
}
