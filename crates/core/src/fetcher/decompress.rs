//! Streaming snapshot decompression.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use bzip2::read::MultiBzDecoder;
use flate2::read::MultiGzDecoder;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

const BUFFER_SIZE: usize = 256 * 1024;
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Errors from expanding a compressed snapshot.
#[derive(Debug, Error)]
pub enum DecompressError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("unrecognized snapshot format")]
    UnknownFormat,

    #[error("corrupt or truncated {format} stream: {source}")]
    Corrupt {
        format: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Container format of a downloaded snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    Bzip2,
    Gzip,
    /// Already a plain SQLite file.
    None,
}

impl Compression {
    /// Detect the format from the leading bytes of a file.
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"BZh") {
            Some(Compression::Bzip2)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(Compression::Gzip)
        } else if header.starts_with(SQLITE_MAGIC) {
            Some(Compression::None)
        } else {
            None
        }
    }

    fn name(self) -> &'static str {
        match self {
            Compression::Bzip2 => "bzip2",
            Compression::Gzip => "gzip",
            Compression::None => "plain",
        }
    }
}

/// Outcome of a decompression run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecompressStats {
    pub compression: Compression,
    pub bytes_in: u64,
    pub bytes_out: u64,
}

/// Expand `source` into `destination`, streaming through a fixed-size buffer.
///
/// On failure the partially written destination is removed.
pub fn decompress(source: &Path, destination: &Path) -> Result<DecompressStats, DecompressError> {
    info!(
        source = %source.display(),
        destination = %destination.display(),
        "Decompression started"
    );

    let result = decompress_inner(source, destination);
    match &result {
        Ok(stats) => info!(
            compression = stats.compression.name(),
            bytes_in = stats.bytes_in,
            bytes_out = stats.bytes_out,
            "Decompression finished"
        ),
        Err(_) => {
            if let Err(e) = fs::remove_file(destination) {
                debug!(error = %e, "No partial decompression output to remove");
            }
        }
    }
    result
}

fn decompress_inner(source: &Path, destination: &Path) -> Result<DecompressStats, DecompressError> {
    let bytes_in = fs::metadata(source)?.len();
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, File::open(source)?);
    let compression = Compression::detect(reader.fill_buf()?).ok_or(DecompressError::UnknownFormat)?;

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::with_capacity(BUFFER_SIZE, File::create(destination)?);

    let mut decoder: Box<dyn Read> = match compression {
        Compression::Bzip2 => Box::new(MultiBzDecoder::new(reader)),
        Compression::Gzip => Box::new(MultiGzDecoder::new(reader)),
        Compression::None => Box::new(reader),
    };

    let bytes_out = copy_stream(&mut decoder, &mut writer).map_err(|e| match e {
        StreamError::Read(source) => DecompressError::Corrupt {
            format: compression.name(),
            source,
        },
        StreamError::Write(e) => DecompressError::Io(e),
    })?;

    writer.flush()?;
    writer.get_ref().sync_all()?;

    Ok(DecompressStats {
        compression,
        bytes_in,
        bytes_out,
    })
}

enum StreamError {
    Read(io::Error),
    Write(io::Error),
}

/// Like `io::copy`, but tells decoder failures apart from write failures.
fn copy_stream(reader: &mut dyn Read, writer: &mut impl Write) -> Result<u64, StreamError> {
    let mut buf = vec![0u8; BUFFER_SIZE];
    let mut total = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(StreamError::Read(e)),
        };
        writer.write_all(&buf[..n]).map_err(StreamError::Write)?;
        total += n as u64;
    }
}
