// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Brotli compression wiring for serialized delta batches.
//!
//! Quality is pinned at the upper end (11) since payloads are small and
//! bandwidth, not CPU, is the constrained resource on this transport's
//! target links. `Mode::Text` is used for JSON payloads, `Mode::Generic`
//! for the binary map format, matching how the teacher's low-bandwidth
//! compressor module picks an algorithm per payload shape.

use std::io::Cursor;

use brotli::enc::backward_references::BrotliEncoderParams;
use brotli::enc::BrotliEncoderMode;

use crate::error::{Result, TransportError};

const QUALITY: i32 = 11;
const LG_WIN: i32 = 22;

/// Which payload shape is being compressed, so we can pick Brotli's text
/// vs. generic mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Json,
    BinaryMap,
}

fn params_for(kind: PayloadKind, size_hint: usize) -> BrotliEncoderParams {
    let mut params = BrotliEncoderParams::default();
    params.quality = QUALITY;
    params.lgwin = LG_WIN;
    params.size_hint = size_hint;
    params.mode = match kind {
        PayloadKind::Json => BrotliEncoderMode::BROTLI_MODE_TEXT,
        PayloadKind::BinaryMap => BrotliEncoderMode::BROTLI_MODE_GENERIC,
    };
    params
}

/// Compress `data`, sizing the encoder with the serialized length as the
/// size hint.
pub fn compress(data: &[u8], kind: PayloadKind) -> Result<Vec<u8>> {
    let params = params_for(kind, data.len());
    let mut input = Cursor::new(data);
    let mut output = Vec::new();
    brotli::BrotliCompress(&mut input, &mut output, &params)
        .map_err(|e| TransportError::Compression(format!("brotli compress failed: {e}")))?;
    Ok(output)
}

/// Decompress a Brotli-compressed buffer, aborting if the decompressed
/// size would exceed `max_decompressed_len` (the decompression-bomb
/// guard called for by the server pipeline).
pub fn decompress(data: &[u8], max_decompressed_len: usize) -> Result<Vec<u8>> {
    let mut input = Cursor::new(data);
    let mut output = Vec::new();
    let mut limited = LimitedWriter::new(&mut output, max_decompressed_len);
    brotli::BrotliDecompress(&mut input, &mut limited)
        .map_err(|e| TransportError::Compression(format!("brotli decompress failed: {e}")))?;
    Ok(output)
}

/// A `Write` adapter that fails once the byte budget is exceeded, so a
/// malicious/corrupt frame can't be used to decompress an unbounded
/// amount of data into memory.
struct LimitedWriter<'a> {
    inner: &'a mut Vec<u8>,
    remaining: usize,
}

impl<'a> LimitedWriter<'a> {
    fn new(inner: &'a mut Vec<u8>, limit: usize) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }
}

impl std::io::Write for LimitedWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if buf.len() > self.remaining {
            return Err(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "decompressed payload exceeds configured cap",
            ));
        }
        self.remaining -= buf.len();
        self.inner.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
