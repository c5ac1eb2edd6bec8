//! Resumable streaming over the raw DEFLATE codec.
//!
//! [`DeflateStream`] and [`InflateStream`] accept input in arbitrary chunks
//! and hand back output incrementally; concatenating a compressor's outputs
//! yields a valid DEFLATE stream decoding to the concatenated input, though
//! block boundaries follow the push pattern rather than a one-shot call. The
//! compressor keeps a window of already-processed input for back-references
//! and trims older bytes in whole-window steps so the hash chains' modular
//! positions stay valid. The decompressor keeps a 32 KiB history of produced
//! output as the reference window and consumes input only at whole-symbol
//! boundaries.
//!
//! [`deflate_stream`] and [`inflate_stream`] are `std::io` copy drivers over
//! the same machinery.

use crate::deflate::{DeflateOptions, DeflateState, deflate_into};
use crate::inflate::{InflateState, Validation, inflate_core};
use rflate_core::{FlateError, Result};
use std::io::{Read, Write};

/// Read size used by the `std::io` drivers.
pub(crate) const STREAM_CHUNK_SIZE: usize = 65536;

/// Bytes of history kept for back-references, one DEFLATE window.
pub(crate) const STREAM_HISTORY_SIZE: usize = 32768;

/// Hash table bits for streaming compression, sized for a full window.
const STREAM_HASH_BITS: u32 = 15;

/// Chunked compressor.
///
/// Feed input with [`push`](DeflateStream::push); the call marked
/// `is_last` closes the stream. Non-final outputs withhold the trailing
/// partial byte, so individual outputs are only meaningful concatenated.
#[derive(Debug)]
pub struct DeflateStream {
    state: DeflateState,
    input: Vec<u8>,
    level: u8,
    hash_bits: u32,
    finished: bool,
}

impl DeflateStream {
    /// Streaming compressor at the given level.
    pub fn new(level: u8) -> Result<Self> {
        Self::with_options(&DeflateOptions::new(level))
    }

    /// Streaming compressor with explicit options.
    pub fn with_options(options: &DeflateOptions) -> Result<Self> {
        options.validate()?;
        let mut state = DeflateState::new(false);
        let mut input = Vec::new();
        if let Some(dictionary) = &options.dictionary {
            if !dictionary.is_empty() {
                input.extend_from_slice(dictionary);
                state.wait_index = dictionary.len();
            }
        }
        let hash_bits = match options.mem_level {
            Some(mem_level) => u32::from(mem_level) + 11,
            None => STREAM_HASH_BITS,
        };
        Ok(Self {
            state,
            input,
            level: options.level,
            hash_bits,
            finished: false,
        })
    }

    /// Compress one chunk; `is_last` closes the stream.
    ///
    /// Returns the bytes produced for this chunk, possibly empty.
    pub fn push(&mut self, chunk: &[u8], is_last: bool) -> Result<Vec<u8>> {
        if self.finished {
            return Err(FlateError::invalid_options(
                "compression stream is already finished",
            ));
        }
        if chunk.is_empty() && !is_last {
            return Ok(Vec::new());
        }

        self.input.extend_from_slice(chunk);
        self.state.is_last_chunk = is_last;
        let output = deflate_into(&self.input, self.level, self.hash_bits, &mut self.state);

        if is_last {
            self.finished = true;
        } else {
            self.trim_input();
        }
        Ok(output)
    }

    /// Whether the final chunk has been compressed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Drop processed input beyond one window of history, in whole-window
    /// steps so positions keep their value modulo the window size.
    fn trim_input(&mut self) {
        let processed = self.state.input_offset;
        if processed <= STREAM_HISTORY_SIZE {
            return;
        }
        let trim = ((processed - STREAM_HISTORY_SIZE) / STREAM_HISTORY_SIZE) * STREAM_HISTORY_SIZE;
        if trim == 0 || trim >= self.input.len() {
            return;
        }
        self.input.drain(..trim);
        self.state.input_offset -= trim;
        self.state.wait_index = self.state.wait_index.saturating_sub(trim);
        if self.state.input_end != 0 {
            self.state.input_end = self.state.input_end.saturating_sub(trim);
        }
    }
}

/// Chunked decompressor.
///
/// Feed compressed input with [`push`](InflateStream::push); decoded bytes
/// come back as they complete. The stream finishes on its own when the
/// final block's end-of-block code is consumed; `is_last` declares that no
/// further input exists so truncation becomes an error.
#[derive(Debug)]
pub struct InflateStream {
    state: InflateState,
    input: Vec<u8>,
    history: Vec<u8>,
    finished: bool,
    saw_input: bool,
}

impl InflateStream {
    /// Streaming decompressor.
    pub fn new() -> Self {
        Self::with_dictionary(&[])
    }

    /// Streaming decompressor with a preset dictionary as initial history.
    pub fn with_dictionary(dictionary: &[u8]) -> Self {
        Self {
            state: InflateState::new(Validation::Lenient),
            input: Vec::new(),
            history: dictionary.to_vec(),
            finished: false,
            saw_input: false,
        }
    }

    /// Decompress as much of the buffered input as possible.
    ///
    /// Input after the end of the stream is ignored, as in the one-shot
    /// call.
    pub fn push(&mut self, chunk: &[u8], is_last: bool) -> Result<Vec<u8>> {
        if self.finished {
            return Ok(Vec::new());
        }
        self.saw_input |= !chunk.is_empty();
        self.input.extend_from_slice(chunk);

        let mut produced = Vec::new();
        loop {
            if self.input.is_empty() {
                if is_last {
                    if !self.saw_input {
                        // No input at all decodes to nothing.
                        self.finished = true;
                        return Ok(produced);
                    }
                    return Err(FlateError::UnexpectedEof);
                }
                return Ok(produced);
            }

            self.state.output_offset = 0;
            let Some(output) =
                inflate_chunk_step(&self.input, &mut self.state, &self.history, is_last)?
            else {
                return Ok(produced);
            };

            if !output.is_empty() {
                update_history(&mut self.history, &output);
                produced.extend_from_slice(&output);
            }

            if self.state.is_finished() {
                self.finished = true;
                return Ok(produced);
            }

            let consumed = self.state.bit_pos / 8;
            let remainder = self.state.bit_pos % 8;
            if consumed > 0 {
                self.input.drain(..consumed);
                self.state.bit_pos = remainder;
            } else if is_last {
                return Err(FlateError::UnexpectedEof);
            } else {
                return Ok(produced);
            }
        }
    }

    /// Whether the stream's final block has been fully decoded.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Default for InflateStream {
    fn default() -> Self {
        Self::new()
    }
}

/// One lenient decode attempt with rollback.
///
/// Returns `None` without consuming anything when the decoder hits the end
/// of the input while more may still arrive; the state is restored to its
/// snapshot so the retry with more input starts clean.
pub(crate) fn inflate_chunk_step(
    input: &[u8],
    state: &mut InflateState,
    history: &[u8],
    source_exhausted: bool,
) -> Result<Option<Vec<u8>>> {
    let snapshot = state.clone();
    match inflate_core(input, state, Some(history)) {
        Ok(output) => Ok(Some(output)),
        Err(FlateError::UnexpectedEof) if !source_exhausted => {
            *state = snapshot;
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// Slide `output` into `history`, keeping at most one window of bytes.
pub(crate) fn update_history(history: &mut Vec<u8>, output: &[u8]) {
    if output.is_empty() {
        return;
    }
    if output.len() >= STREAM_HISTORY_SIZE {
        history.clear();
        history.extend_from_slice(&output[output.len() - STREAM_HISTORY_SIZE..]);
        return;
    }
    let keep = STREAM_HISTORY_SIZE.min(history.len() + output.len());
    let keep_from_history = keep - output.len();
    let drop_from_history = history.len() - keep_from_history;
    history.drain(..drop_from_history);
    history.extend_from_slice(output);
}

/// Pull one read from `reader` into `input`. A zero-length read marks the
/// source exhausted.
pub(crate) fn fill_input<R: Read>(
    reader: &mut R,
    input: &mut Vec<u8>,
    exhausted: &mut bool,
    buffer: &mut [u8],
) -> Result<()> {
    let read = reader.read(buffer)?;
    if read == 0 {
        *exhausted = true;
    } else {
        input.extend_from_slice(&buffer[..read]);
    }
    Ok(())
}

/// Compress everything from `reader` into `writer` as a raw DEFLATE stream.
pub fn deflate_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    options: &DeflateOptions,
) -> Result<()> {
    let mut stream = DeflateStream::with_options(options)?;
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        let output = stream.push(&buffer[..read], false)?;
        if !output.is_empty() {
            writer.write_all(&output)?;
        }
    }
    let output = stream.push(&[], true)?;
    if !output.is_empty() {
        writer.write_all(&output)?;
    }
    Ok(())
}

/// Decompress a raw DEFLATE stream from `reader` into `writer`.
pub fn inflate_stream<R: Read, W: Write>(reader: R, writer: W) -> Result<()> {
    inflate_stream_with_dictionary(reader, writer, &[])
}

/// Decompress a raw DEFLATE stream whose back-references may reach into a
/// preset dictionary.
pub fn inflate_stream_with_dictionary<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    dictionary: &[u8],
) -> Result<()> {
    let mut stream = InflateStream::with_dictionary(dictionary);
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        let output = stream.push(&buffer[..read], read == 0)?;
        if !output.is_empty() {
            writer.write_all(&output)?;
        }
        if read == 0 || stream.is_finished() {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::deflate;
    use crate::inflate::inflate;
    use std::io::Cursor;

    fn sample_data() -> Vec<u8> {
        let mut data = Vec::new();
        for i in 0..40_000u32 {
            data.extend_from_slice(format!("line {} of the sample\n", i % 977).as_bytes());
        }
        data
    }

    fn push_chunks(data: &[u8], chunk_size: usize, level: u8) -> Vec<u8> {
        let mut stream = DeflateStream::new(level).unwrap();
        let mut compressed = Vec::new();
        for chunk in data.chunks(chunk_size) {
            compressed.extend_from_slice(&stream.push(chunk, false).unwrap());
        }
        compressed.extend_from_slice(&stream.push(&[], true).unwrap());
        compressed
    }

    #[test]
    fn test_chunked_compression_roundtrip() {
        let data = sample_data();
        for chunk_size in [1usize << 10, 4096, 65536] {
            let compressed = push_chunks(&data, chunk_size, 6);
            assert_eq!(inflate(&compressed).unwrap(), data, "chunk {chunk_size}");
        }
    }

    #[test]
    fn test_tiny_chunks_match_one_shot_semantics() {
        let data = b"a man a plan a canal panama ".repeat(40);
        let compressed = push_chunks(&data, 7, 9);
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn test_chunked_level_0() {
        let data = sample_data();
        let compressed = push_chunks(&data, 4096, 0);
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn test_chunked_decompression() {
        let data = sample_data();
        let compressed = deflate(&data, 6).unwrap();

        for chunk_size in [1usize, 7, 4096] {
            let mut stream = InflateStream::new();
            let mut decoded = Vec::new();
            for chunk in compressed.chunks(chunk_size) {
                decoded.extend_from_slice(&stream.push(chunk, false).unwrap());
            }
            decoded.extend_from_slice(&stream.push(&[], true).unwrap());
            assert!(stream.is_finished());
            assert_eq!(decoded, data, "chunk {chunk_size}");
        }
    }

    #[test]
    fn test_empty_stream() {
        let mut compressor = DeflateStream::new(6).unwrap();
        let compressed = compressor.push(&[], true).unwrap();
        assert!(!compressed.is_empty());
        assert_eq!(inflate(&compressed).unwrap(), Vec::<u8>::new());

        let mut decompressor = InflateStream::new();
        assert_eq!(
            decompressor.push(&compressed, true).unwrap(),
            Vec::<u8>::new()
        );
        assert!(decompressor.is_finished());
    }

    #[test]
    fn test_no_input_at_all() {
        let mut decompressor = InflateStream::new();
        assert_eq!(decompressor.push(&[], true).unwrap(), Vec::<u8>::new());
        assert!(decompressor.is_finished());
    }

    #[test]
    fn test_truncated_stream_detected() {
        let compressed = deflate(&sample_data(), 6).unwrap();
        let mut stream = InflateStream::new();
        let truncated = &compressed[..compressed.len() - 3];
        // Without is_last the missing tail is just a pause.
        stream.push(truncated, false).unwrap();
        assert!(!stream.is_finished());
        let result = stream.push(&[], true);
        assert!(matches!(result, Err(FlateError::UnexpectedEof)));
    }

    #[test]
    fn test_push_after_finish_rejected() {
        let mut stream = DeflateStream::new(6).unwrap();
        stream.push(b"data", true).unwrap();
        assert!(stream.push(b"more", true).is_err());
    }

    #[test]
    fn test_io_driver_roundtrip() {
        let data = sample_data();
        let mut compressed = Vec::new();
        deflate_stream(
            Cursor::new(&data),
            &mut compressed,
            &DeflateOptions::new(6),
        )
        .unwrap();

        let mut decoded = Vec::new();
        inflate_stream(Cursor::new(&compressed), &mut decoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_update_history_keeps_one_window() {
        let mut history = vec![1u8; 10];
        update_history(&mut history, &[2u8; 20]);
        assert_eq!(history.len(), 30);

        update_history(&mut history, &vec![3u8; STREAM_HISTORY_SIZE + 5]);
        assert_eq!(history.len(), STREAM_HISTORY_SIZE);
        assert!(history.iter().all(|&byte| byte == 3));

        let mut history = vec![7u8; STREAM_HISTORY_SIZE];
        update_history(&mut history, &[9u8; 100]);
        assert_eq!(history.len(), STREAM_HISTORY_SIZE);
        assert_eq!(history[STREAM_HISTORY_SIZE - 100], 9);
        assert_eq!(history[0], 7);
    }
}
