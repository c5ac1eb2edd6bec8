//! zlib container (RFC 1950): a two-byte header, a raw DEFLATE body, and a
//! big-endian Adler-32 trailer over the uncompressed data.
//!
//! When a preset dictionary is used the header carries the FDICT flag and
//! the dictionary's Adler-32 as DICTID, and both sides must agree: the
//! decompressor rejects a stream whose dictionary expectation does not match
//! what the caller supplied.

use crate::deflate::{DeflateOptions, deflate_with_options};
use crate::inflate::{InflateState, Validation, inflate, inflate_with_dictionary};
use crate::stream::{
    DeflateStream, STREAM_CHUNK_SIZE, fill_input, inflate_chunk_step, update_history,
};
use rflate_core::bits::{next_byte, read_u32_be, write_u32_be};
use rflate_core::checksum::{Adler32, adler32};
use rflate_core::{FlateError, Result};
use std::io::{Read, Write};

/// CMF byte: compression method 8, 32 KiB window.
const CMF: u8 = 0x78;

/// FDICT flag in the FLG byte.
const FDICT: u8 = 0x20;

/// FLEVEL field for a compression level (RFC 1950 Section 2.2).
fn flevel(level: u8) -> u8 {
    match level {
        0 => 0,
        1..=5 => 1,
        9 => 3,
        _ => 2,
    }
}

/// Append the 2-byte header, plus DICTID when a dictionary is in use.
fn write_header(output: &mut Vec<u8>, level: u8, dictionary: Option<&[u8]>) {
    let mut flg = flevel(level) << 6;
    if dictionary.is_some() {
        flg |= FDICT;
    }
    let check = (31 - (u32::from(CMF) * 256 + u32::from(flg)) % 31) % 31;
    flg |= check as u8;
    output.push(CMF);
    output.push(flg);
    if let Some(dictionary) = dictionary {
        let mut dict_id = [0u8; 4];
        write_u32_be(&mut dict_id, 0, adler32(dictionary));
        output.extend_from_slice(&dict_id);
    }
}

/// Validate the header; returns the header length and the DICTID if the
/// stream declares a preset dictionary.
fn parse_header(data: &[u8]) -> Result<(usize, Option<u32>)> {
    if data.len() < 2 {
        return Err(FlateError::UnexpectedEof);
    }
    let cmf = data[0];
    let flg = data[1];
    if cmf & 0x0F != 8 {
        return Err(FlateError::invalid_header("compression method is not deflate"));
    }
    if cmf >> 4 > 7 {
        return Err(FlateError::invalid_header("window size exceeds 32 KiB"));
    }
    if (u32::from(cmf) * 256 + u32::from(flg)) % 31 != 0 {
        return Err(FlateError::invalid_header("FCHECK does not validate"));
    }
    if flg & FDICT != 0 {
        if data.len() < 6 {
            return Err(FlateError::UnexpectedEof);
        }
        Ok((6, Some(read_u32_be(data, 2))))
    } else {
        Ok((2, None))
    }
}

/// The stream's dictionary expectation must match the supplied dictionary.
fn check_dictionary(dict_id: Option<u32>, dictionary: &[u8]) -> Result<()> {
    match dict_id {
        Some(stored) => {
            if dictionary.is_empty() {
                return Err(FlateError::invalid_header(
                    "stream requires a preset dictionary",
                ));
            }
            let computed = adler32(dictionary);
            if stored != computed {
                return Err(FlateError::checksum_mismatch(stored, computed));
            }
            Ok(())
        }
        None => {
            if dictionary.is_empty() {
                Ok(())
            } else {
                Err(FlateError::invalid_header(
                    "stream does not use a preset dictionary",
                ))
            }
        }
    }
}

/// Compress `data` into a zlib stream.
///
/// # Examples
///
/// ```
/// let packed = rflate::zlib::compress(b"hello", 6)?;
/// assert_eq!(rflate::zlib::decompress(&packed)?, b"hello");
/// # Ok::<(), rflate_core::FlateError>(())
/// ```
pub fn compress(data: &[u8], level: u8) -> Result<Vec<u8>> {
    compress_with_options(data, &DeflateOptions::new(level))
}

/// Compress `data` into a zlib stream with explicit options.
pub fn compress_with_options(data: &[u8], options: &DeflateOptions) -> Result<Vec<u8>> {
    let dictionary = options.dictionary.as_deref().filter(|d| !d.is_empty());
    let body = deflate_with_options(data, options)?;

    let mut output = Vec::with_capacity(body.len() + 10);
    write_header(&mut output, options.level, dictionary);
    output.extend_from_slice(&body);
    let mut trailer = [0u8; 4];
    write_u32_be(&mut trailer, 0, adler32(data));
    output.extend_from_slice(&trailer);
    Ok(output)
}

/// Decompress a complete zlib stream, verifying the Adler-32 trailer.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with_dictionary(data, &[])
}

/// Decompress a zlib stream that was compressed with a preset dictionary.
pub fn decompress_with_dictionary(data: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 6 {
        return Err(FlateError::UnexpectedEof);
    }
    let (header_len, dict_id) = parse_header(data)?;
    check_dictionary(dict_id, dictionary)?;
    if data.len() < header_len + 4 {
        return Err(FlateError::UnexpectedEof);
    }

    let body = &data[header_len..data.len() - 4];
    let output = if dictionary.is_empty() {
        inflate(body)?
    } else {
        inflate_with_dictionary(body, dictionary)?
    };

    let stored = read_u32_be(data, data.len() - 4);
    let computed = adler32(&output);
    if stored != computed {
        return Err(FlateError::checksum_mismatch(stored, computed));
    }
    Ok(output)
}

/// Compress everything from `reader` into `writer` as a zlib stream.
pub fn compress_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    options: &DeflateOptions,
) -> Result<()> {
    let mut stream = DeflateStream::with_options(options)?;
    let mut header = Vec::new();
    write_header(
        &mut header,
        options.level,
        options.dictionary.as_deref().filter(|d| !d.is_empty()),
    );
    writer.write_all(&header)?;

    let mut adler = Adler32::new();
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        adler.update(&buffer[..read]);
        let output = stream.push(&buffer[..read], false)?;
        if !output.is_empty() {
            writer.write_all(&output)?;
        }
    }
    let output = stream.push(&[], true)?;
    if !output.is_empty() {
        writer.write_all(&output)?;
    }

    let mut trailer = [0u8; 4];
    write_u32_be(&mut trailer, 0, adler.value());
    writer.write_all(&trailer)?;
    Ok(())
}

/// Decompress a zlib stream from `reader` into `writer`.
pub fn decompress_stream<R: Read, W: Write>(reader: R, writer: W) -> Result<()> {
    decompress_stream_with_dictionary(reader, writer, &[])
}

/// Decompress a zlib stream from `reader` into `writer` with a preset
/// dictionary.
pub fn decompress_stream_with_dictionary<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    dictionary: &[u8],
) -> Result<()> {
    let mut input: Vec<u8> = Vec::new();
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    let mut exhausted = false;

    // Buffer input until the header parses or the source truly ends.
    let header_len = loop {
        match parse_header(&input) {
            Ok((header_len, dict_id)) => {
                check_dictionary(dict_id, dictionary)?;
                break header_len;
            }
            Err(FlateError::UnexpectedEof) if !exhausted => {
                fill_input(&mut reader, &mut input, &mut exhausted, &mut buffer)?;
            }
            Err(error) => return Err(error),
        }
    };
    input.drain(..header_len);

    let mut state = InflateState::new(Validation::Lenient);
    let mut history = dictionary.to_vec();
    let mut adler = Adler32::new();

    loop {
        if input.is_empty() {
            if exhausted {
                return Err(FlateError::UnexpectedEof);
            }
            fill_input(&mut reader, &mut input, &mut exhausted, &mut buffer)?;
            continue;
        }

        state.output_offset = 0;
        let Some(output) = inflate_chunk_step(&input, &mut state, &history, exhausted)? else {
            fill_input(&mut reader, &mut input, &mut exhausted, &mut buffer)?;
            continue;
        };

        if !output.is_empty() {
            adler.update(&output);
            update_history(&mut history, &output);
            writer.write_all(&output)?;
        }

        if state.is_finished() {
            break;
        }

        let consumed = state.bit_pos / 8;
        let remainder = state.bit_pos % 8;
        if consumed > 0 {
            input.drain(..consumed);
            state.bit_pos = remainder;
        } else if exhausted {
            return Err(FlateError::UnexpectedEof);
        } else {
            fill_input(&mut reader, &mut input, &mut exhausted, &mut buffer)?;
        }
    }

    // Trailer: a big-endian Adler-32 at the next byte boundary.
    let aligned = next_byte(state.bit_pos);
    while input.len() < aligned + 4 {
        if exhausted {
            return Err(FlateError::UnexpectedEof);
        }
        fill_input(&mut reader, &mut input, &mut exhausted, &mut buffer)?;
    }
    let stored = read_u32_be(&input, aligned);
    let computed = adler.value();
    if stored != computed {
        return Err(FlateError::checksum_mismatch(stored, computed));
    }
    Ok(())
}
