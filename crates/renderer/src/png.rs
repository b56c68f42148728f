//! PNG encoding for rendered maps.
//!
//! Maps use a small set of ramp colors plus transparency, so most images
//! fit an indexed PNG (color type 3 with a tRNS alpha table); images with
//! more than 256 distinct colors fall back to RGBA (color type 6).

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use rayon::prelude::*;

/// Maximum colors for indexed PNG.
const MAX_PALETTE_SIZE: usize = 256;

/// Pixel count above which palette extraction runs in parallel.
const PARALLEL_THRESHOLD: usize = 64 * 1024;

/// Encode RGBA pixel data as a PNG, choosing the indexed form when the
/// image has few enough distinct colors.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    if width == 0 || height == 0 {
        return Err("image dimensions must be nonzero".to_string());
    }
    if pixels.len() != width * height * 4 {
        return Err(format!(
            "pixel buffer is {} bytes, expected {} for {}x{}",
            pixels.len(),
            width * height * 4,
            width,
            height
        ));
    }

    match extract_palette(pixels) {
        Some((palette, indices)) => encode_indexed(width, height, &palette, &indices),
        None => encode_truecolor(pixels, width, height),
    }
}

#[inline(always)]
fn pack_color(px: &[u8]) -> u32 {
    (px[0] as u32) | ((px[1] as u32) << 8) | ((px[2] as u32) << 16) | ((px[3] as u32) << 24)
}

#[inline(always)]
fn unpack_color(packed: u32) -> (u8, u8, u8, u8) {
    (
        packed as u8,
        (packed >> 8) as u8,
        (packed >> 16) as u8,
        (packed >> 24) as u8,
    )
}

type Palette = Vec<(u8, u8, u8, u8)>;

/// Build a palette and per-pixel indices, or None when the image has more
/// than 256 distinct colors.
fn extract_palette(pixels: &[u8]) -> Option<(Palette, Vec<u8>)> {
    let num_pixels = pixels.len() / 4;

    let unique: Vec<u32> = if num_pixels >= PARALLEL_THRESHOLD {
        // Collect per-chunk uniques in parallel, merge below. Chunks give
        // up early once they individually exceed the palette bound.
        pixels
            .par_chunks(64 * 1024 * 4)
            .flat_map_iter(|chunk| {
                let mut local: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE + 1);
                for px in chunk.chunks_exact(4) {
                    local.insert(pack_color(px), ());
                    if local.len() > MAX_PALETTE_SIZE {
                        break;
                    }
                }
                local.into_keys().collect::<Vec<_>>()
            })
            .collect()
    } else {
        let mut local: HashMap<u32, ()> = HashMap::with_capacity(MAX_PALETTE_SIZE + 1);
        for px in pixels.chunks_exact(4) {
            local.insert(pack_color(px), ());
            if local.len() > MAX_PALETTE_SIZE {
                return None;
            }
        }
        local.into_keys().collect()
    };

    let mut color_to_index: HashMap<u32, u8> = HashMap::with_capacity(MAX_PALETTE_SIZE);
    let mut palette: Palette = Vec::with_capacity(MAX_PALETTE_SIZE);
    for packed in unique {
        if !color_to_index.contains_key(&packed) {
            if palette.len() >= MAX_PALETTE_SIZE {
                return None;
            }
            color_to_index.insert(packed, palette.len() as u8);
            palette.push(unpack_color(packed));
        }
    }

    let indices: Vec<u8> = if num_pixels >= PARALLEL_THRESHOLD {
        pixels
            .par_chunks_exact(4)
            .map(|px| color_to_index[&pack_color(px)])
            .collect()
    } else {
        pixels
            .chunks_exact(4)
            .map(|px| color_to_index[&pack_color(px)])
            .collect()
    };

    Some((palette, indices))
}

/// Indexed PNG: PLTE for colors, tRNS for per-entry alpha.
fn encode_indexed(
    width: usize,
    height: usize,
    palette: &Palette,
    indices: &[u8],
) -> Result<Vec<u8>, String> {
    let mut raw = Vec::with_capacity((width + 1) * height);
    for row in indices.chunks_exact(width) {
        raw.push(0); // filter: None
        raw.extend_from_slice(row);
    }
    let idat = deflate(&raw)?;

    let mut plte = Vec::with_capacity(palette.len() * 3);
    let mut trns = Vec::with_capacity(palette.len());
    for &(r, g, b, a) in palette {
        plte.extend_from_slice(&[r, g, b]);
        trns.push(a);
    }

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr(width, height, 3));
    write_chunk(&mut out, b"PLTE", &plte);
    // tRNS is only needed when some entry is not fully opaque.
    if trns.iter().any(|&a| a != 255) {
        write_chunk(&mut out, b"tRNS", &trns);
    }
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

/// RGBA PNG fallback for images with many colors.
fn encode_truecolor(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, String> {
    let stride = width * 4;
    let mut raw = Vec::with_capacity((stride + 1) * height);
    for row in pixels.chunks_exact(stride) {
        raw.push(0); // filter: None
        raw.extend_from_slice(row);
    }
    let idat = deflate(&raw)?;

    let mut out = Vec::new();
    out.extend_from_slice(&PNG_SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr(width, height, 6));
    write_chunk(&mut out, b"IDAT", &idat);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'];

fn ihdr(width: usize, height: usize, color_type: u8) -> Vec<u8> {
    let mut data = Vec::with_capacity(13);
    data.extend_from_slice(&(width as u32).to_be_bytes());
    data.extend_from_slice(&(height as u32).to_be_bytes());
    data.push(8); // bit depth
    data.push(color_type);
    data.push(0); // compression
    data.push(0); // filter
    data.push(0); // interlace
    data
}

fn deflate(raw: &[u8]) -> Result<Vec<u8>, String> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(raw)
        .map_err(|e| format!("deflate failed: {e}"))?;
    encoder.finish().map_err(|e| format!("deflate failed: {e}"))
}

fn write_chunk(out: &mut Vec<u8>, tag: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(tag);
    out.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(tag);
    hasher.update(data);
    out.extend_from_slice(&hasher.finalize().to_be_bytes());
}
