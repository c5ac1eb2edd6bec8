//! gzip container (RFC 1952): a member header with optional fields, a raw
//! DEFLATE body, and a trailer of CRC-32 plus uncompressed size mod 2^32.
//!
//! A stream may hold several members back to back; decompression decodes
//! and concatenates all of them. Bytes after a member that do not start
//! another member are [`FlateError::TrailingGarbage`].

use crate::deflate::{DeflateOptions, deflate_with_options};
use crate::inflate::{InflateState, Validation, inflate_core};
use crate::stream::{
    DeflateStream, STREAM_CHUNK_SIZE, fill_input, inflate_chunk_step, update_history,
};
use rflate_core::bits::{next_byte, read_u16_le, read_u32_le, write_u32_le};
use rflate_core::checksum::{Crc32, crc32, header_crc16};
use rflate_core::{FlateError, Result};
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

const MAGIC1: u8 = 31;
const MAGIC2: u8 = 139;
const METHOD_DEFLATE: u8 = 8;

const FHCRC: u8 = 2;
const FEXTRA: u8 = 4;
const FNAME: u8 = 8;
const FCOMMENT: u8 = 16;
const FLG_RESERVED: u8 = 0xE0;

/// OS byte: Unix.
const OS_UNIX: u8 = 3;

/// One FEXTRA subfield: a two-byte identifier and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipExtraField {
    /// Subfield identifier (SI1, SI2).
    pub id: [u8; 2],
    /// Subfield payload, at most 65535 bytes.
    pub data: Vec<u8>,
}

/// gzip compression options: the DEFLATE options plus header fields.
#[derive(Debug, Clone, Default)]
pub struct GzipOptions {
    /// Options for the DEFLATE body.
    pub deflate: DeflateOptions,
    /// FNAME field, ISO-8859-1 without NUL bytes.
    pub filename: Option<String>,
    /// FCOMMENT field, ISO-8859-1 without NUL bytes.
    pub comment: Option<String>,
    /// FEXTRA subfields.
    pub extra_fields: Vec<GzipExtraField>,
    /// Write and verify the FHCRC header checksum.
    pub header_crc: bool,
    /// MTIME in Unix seconds; `None` stamps the current time.
    pub mtime: Option<u32>,
}

impl GzipOptions {
    /// Options for the given compression level with an empty header.
    pub fn new(level: u8) -> Self {
        Self {
            deflate: DeflateOptions::new(level),
            ..Self::default()
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.deflate.validate()?;
        if let Some(filename) = &self.filename {
            validate_latin1(filename, "filename")?;
        }
        if let Some(comment) = &self.comment {
            validate_latin1(comment, "comment")?;
        }
        let mut xlen = 0usize;
        for field in &self.extra_fields {
            if field.data.len() > 65535 {
                return Err(FlateError::invalid_options(
                    "extra field data exceeds 65535 bytes",
                ));
            }
            xlen += field.data.len() + 4;
        }
        if xlen > 65535 {
            return Err(FlateError::invalid_options(
                "extra fields exceed 65535 bytes total",
            ));
        }
        Ok(())
    }
}

fn validate_latin1(text: &str, field: &str) -> Result<()> {
    if text.chars().count() > 65535 {
        return Err(FlateError::invalid_options(format!(
            "{field} exceeds 65535 bytes"
        )));
    }
    if !text.chars().all(|c| c != '\0' && (c as u32) < 256) {
        return Err(FlateError::invalid_options(format!(
            "{field} must be NUL-free ISO-8859-1"
        )));
    }
    Ok(())
}

/// Validated ISO-8859-1 text maps one char to one byte.
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u8).collect()
}

fn mtime_seconds(options: &GzipOptions) -> u32 {
    options.mtime.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs() as u32)
            .unwrap_or(0)
    })
}

/// Serialize the member header for `options`.
fn build_header(options: &GzipOptions) -> Vec<u8> {
    let mut header = vec![MAGIC1, MAGIC2, METHOD_DEFLATE];

    let mut flg = 0u8;
    if options.header_crc {
        flg |= FHCRC;
    }
    if !options.extra_fields.is_empty() {
        flg |= FEXTRA;
    }
    if options.filename.is_some() {
        flg |= FNAME;
    }
    if options.comment.is_some() {
        flg |= FCOMMENT;
    }
    header.push(flg);
    header.extend_from_slice(&mtime_seconds(options).to_le_bytes());
    header.push(match options.deflate.level {
        0..=1 => 4,
        9 => 2,
        _ => 0,
    });
    header.push(OS_UNIX);

    if !options.extra_fields.is_empty() {
        let xlen: usize = options
            .extra_fields
            .iter()
            .map(|field| field.data.len() + 4)
            .sum();
        header.extend_from_slice(&(xlen as u16).to_le_bytes());
        for field in &options.extra_fields {
            header.extend_from_slice(&field.id);
            header.extend_from_slice(&(field.data.len() as u16).to_le_bytes());
            header.extend_from_slice(&field.data);
        }
    }
    if let Some(filename) = &options.filename {
        header.extend_from_slice(&encode_latin1(filename));
        header.push(0);
    }
    if let Some(comment) = &options.comment {
        header.extend_from_slice(&encode_latin1(comment));
        header.push(0);
    }
    if options.header_crc {
        let crc16 = header_crc16(&header);
        header.extend_from_slice(&crc16.to_le_bytes());
    }
    header
}

/// Validate a member header at the start of `data`; returns its length.
fn parse_header(data: &[u8]) -> Result<usize> {
    if data.len() < 10 {
        return Err(FlateError::UnexpectedEof);
    }
    if data[0] != MAGIC1 || data[1] != MAGIC2 || data[2] != METHOD_DEFLATE {
        return Err(FlateError::invalid_header("bad gzip magic or method"));
    }
    let flags = data[3];
    if flags & FLG_RESERVED != 0 {
        return Err(FlateError::invalid_header("reserved FLG bits set"));
    }

    let mut pos = 10usize;
    if flags & FEXTRA != 0 {
        if pos + 2 > data.len() {
            return Err(FlateError::UnexpectedEof);
        }
        let xlen = read_u16_le(data, pos) as usize;
        pos += 2;
        if pos + xlen > data.len() {
            return Err(FlateError::UnexpectedEof);
        }
        pos += xlen;
    }
    if flags & FNAME != 0 {
        pos = skip_terminated(data, pos)?;
    }
    if flags & FCOMMENT != 0 {
        pos = skip_terminated(data, pos)?;
    }
    if flags & FHCRC != 0 {
        if pos + 2 > data.len() {
            return Err(FlateError::UnexpectedEof);
        }
        let computed = header_crc16(&data[..pos]);
        let stored = read_u16_le(data, pos);
        if u32::from(computed) != stored {
            return Err(FlateError::invalid_header("header CRC-16 mismatch"));
        }
        pos += 2;
    }
    Ok(pos)
}

/// Skip past a NUL-terminated field.
fn skip_terminated(data: &[u8], mut pos: usize) -> Result<usize> {
    loop {
        if pos >= data.len() {
            return Err(FlateError::UnexpectedEof);
        }
        pos += 1;
        if data[pos - 1] == 0 {
            return Ok(pos);
        }
    }
}

/// Compress `data` into a single-member gzip stream.
///
/// # Examples
///
/// ```
/// let packed = rflate::gzip::compress(b"hello", 6)?;
/// assert_eq!(rflate::gzip::decompress(&packed)?, b"hello");
/// # Ok::<(), rflate_core::FlateError>(())
/// ```
pub fn compress(data: &[u8], level: u8) -> Result<Vec<u8>> {
    compress_with_options(data, &GzipOptions::new(level))
}

/// Compress `data` into a gzip stream with explicit options.
pub fn compress_with_options(data: &[u8], options: &GzipOptions) -> Result<Vec<u8>> {
    options.validate()?;
    let body = deflate_with_options(data, &options.deflate)?;
    let header = build_header(options);

    let mut output = Vec::with_capacity(header.len() + body.len() + 8);
    output.extend_from_slice(&header);
    output.extend_from_slice(&body);
    let mut trailer = [0u8; 8];
    write_u32_le(&mut trailer, 0, crc32(data));
    write_u32_le(&mut trailer, 4, data.len() as u32);
    output.extend_from_slice(&trailer);
    Ok(output)
}

/// Decompress a gzip stream, concatenating all members.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    decompress_with_dictionary(data, &[])
}

/// Decompress a gzip stream whose DEFLATE body was compressed with a preset
/// dictionary.
pub fn decompress_with_dictionary(data: &[u8], dictionary: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 20 {
        return Err(FlateError::UnexpectedEof);
    }
    let mut output = Vec::new();
    let mut pos = 0usize;
    while pos < data.len() {
        if pos + 10 > data.len() {
            return Err(FlateError::TrailingGarbage);
        }
        if data[pos] != MAGIC1 || data[pos + 1] != MAGIC2 || data[pos + 2] != METHOD_DEFLATE {
            return Err(FlateError::TrailingGarbage);
        }
        pos += decode_member(&data[pos..], dictionary, &mut output)?;
    }
    Ok(output)
}

/// Decode one member at the start of `member`; returns its total length.
fn decode_member(member: &[u8], dictionary: &[u8], output: &mut Vec<u8>) -> Result<usize> {
    if member.len() < 20 {
        return Err(FlateError::UnexpectedEof);
    }
    let header_len = parse_header(member)?;

    let mut state = InflateState::new(Validation::Strict);
    let history = if dictionary.is_empty() {
        None
    } else {
        Some(dictionary)
    };
    let decoded = inflate_core(&member[header_len..], &mut state, history)?;

    let trailer = header_len + next_byte(state.bit_pos);
    if trailer + 8 > member.len() {
        return Err(FlateError::UnexpectedEof);
    }
    let stored_crc = read_u32_le(member, trailer);
    let computed_crc = crc32(&decoded);
    if stored_crc != computed_crc {
        return Err(FlateError::crc_mismatch(stored_crc, computed_crc));
    }
    let stored_size = u64::from(read_u32_le(member, trailer + 4));
    let produced = decoded.len() as u64 & 0xFFFF_FFFF;
    if stored_size != produced {
        return Err(FlateError::size_mismatch(stored_size, produced));
    }

    output.extend_from_slice(&decoded);
    Ok(trailer + 8)
}

/// Compress everything from `reader` into `writer` as a gzip stream.
pub fn compress_stream<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    options: &GzipOptions,
) -> Result<()> {
    options.validate()?;
    let mut stream = DeflateStream::with_options(&options.deflate)?;
    writer.write_all(&build_header(options))?;

    let mut crc = Crc32::new();
    let mut size = 0u64;
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        crc.update(&buffer[..read]);
        size += read as u64;
        let output = stream.push(&buffer[..read], false)?;
        if !output.is_empty() {
            writer.write_all(&output)?;
        }
    }
    let output = stream.push(&[], true)?;
    if !output.is_empty() {
        writer.write_all(&output)?;
    }

    let mut trailer = [0u8; 8];
    write_u32_le(&mut trailer, 0, crc.value());
    write_u32_le(&mut trailer, 4, (size & 0xFFFF_FFFF) as u32);
    writer.write_all(&trailer)?;
    Ok(())
}

/// Decompress a gzip stream from `reader` into `writer`, decoding every
/// member.
pub fn decompress_stream<R: Read, W: Write>(reader: R, writer: W) -> Result<()> {
    decompress_stream_with_dictionary(reader, writer, &[])
}

/// Decompress a gzip stream from `reader` into `writer` with a preset
/// dictionary for each member's DEFLATE body.
pub fn decompress_stream_with_dictionary<R: Read, W: Write>(
    mut reader: R,
    mut writer: W,
    dictionary: &[u8],
) -> Result<()> {
    let mut input: Vec<u8> = Vec::new();
    let mut buffer = vec![0u8; STREAM_CHUNK_SIZE];
    let mut exhausted = false;

    let mut header_parsed = false;
    let mut awaiting_trailer = false;
    let mut state = InflateState::new(Validation::Lenient);
    let mut history = dictionary.to_vec();
    let mut crc = Crc32::new();
    let mut size = 0u64;
    let mut members = 0u32;

    loop {
        if !exhausted {
            fill_input(&mut reader, &mut input, &mut exhausted, &mut buffer)?;
        }

        if !header_parsed {
            if input.is_empty() {
                if exhausted {
                    if members == 0 {
                        return Err(FlateError::UnexpectedEof);
                    }
                    break;
                }
                continue;
            }
            match parse_header(&input) {
                Ok(header_len) => {
                    // A new member resets all per-member state.
                    input.drain(..header_len);
                    header_parsed = true;
                    awaiting_trailer = false;
                    state = InflateState::new(Validation::Lenient);
                    history = dictionary.to_vec();
                    crc = Crc32::new();
                    size = 0;
                    members += 1;
                }
                Err(FlateError::UnexpectedEof) if !exhausted => continue,
                Err(error) => {
                    if members > 0 {
                        return Err(FlateError::TrailingGarbage);
                    }
                    return Err(error);
                }
            }
        }

        if header_parsed && !awaiting_trailer {
            if input.is_empty() {
                if exhausted {
                    return Err(FlateError::UnexpectedEof);
                }
                continue;
            }

            state.output_offset = 0;
            let Some(output) = inflate_chunk_step(&input, &mut state, &history, exhausted)? else {
                continue;
            };

            if !output.is_empty() {
                writer.write_all(&output)?;
                crc.update(&output);
                size += output.len() as u64;
                update_history(&mut history, &output);
            }

            if state.is_finished() {
                awaiting_trailer = true;
            } else {
                let consumed = state.bit_pos / 8;
                let remainder = state.bit_pos % 8;
                if consumed > 0 {
                    input.drain(..consumed);
                    state.bit_pos = remainder;
                } else if exhausted {
                    return Err(FlateError::UnexpectedEof);
                }
            }
        }

        if awaiting_trailer {
            let aligned = next_byte(state.bit_pos);
            if input.len() < aligned + 8 {
                if exhausted {
                    return Err(FlateError::UnexpectedEof);
                }
                continue;
            }
            let stored_crc = read_u32_le(&input, aligned);
            let computed_crc = crc.value();
            if stored_crc != computed_crc {
                return Err(FlateError::crc_mismatch(stored_crc, computed_crc));
            }
            let stored_size = u64::from(read_u32_le(&input, aligned + 4));
            let produced = size & 0xFFFF_FFFF;
            if stored_size != produced {
                return Err(FlateError::size_mismatch(stored_size, produced));
            }

            input.drain(..aligned + 8);
            header_parsed = false;
            awaiting_trailer = false;
            if exhausted && input.is_empty() {
                break;
            }
        }
    }

    Ok(())
}
