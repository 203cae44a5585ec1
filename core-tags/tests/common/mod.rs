//! Synthetic audio containers for integration tests.
//!
//! Each builder produces the smallest byte layout the container adapters
//! accept, with fake audio payload after the tag structures.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use core_runtime::SyncConfig;
use core_tags::{FileImageSource, SpotifyLink};
use image::{DynamicImage, ImageFormat, RgbImage};

pub const TRACK_URI: &str = "spotify:track:6rqhFgbbKwnb9MLmUQDhG6";

const ASF_HEADER: [u8; 16] = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const ASF_FILE_PROPERTIES: [u8; 16] = [
    0xA1, 0xDC, 0xAB, 0x8C, 0x47, 0xA9, 0xCF, 0x11, 0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const ASF_STREAM_PROPERTIES: [u8; 16] = [
    0x91, 0x07, 0xDC, 0xB7, 0xB7, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const ASF_AUDIO_MEDIA: [u8; 16] = [
    0x40, 0x9E, 0x69, 0xF8, 0x4D, 0x5B, 0xCF, 0x11, 0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B,
];

/// FLAC with STREAMINFO and a vorbis comment block holding `comments`.
pub fn flac_bytes(comments: &[(&str, &str)]) -> Vec<u8> {
    let mut streaminfo = vec![0u8; 34];
    streaminfo[10] = 0x0A;
    streaminfo[11] = 0xC4;
    streaminfo[12] = 0x42;
    streaminfo[13] = 0xF0;
    streaminfo[14..18].copy_from_slice(&441_000u32.to_be_bytes());

    let vendor = b"tests";
    let mut vorbis = (vendor.len() as u32).to_le_bytes().to_vec();
    vorbis.extend_from_slice(vendor);
    vorbis.extend_from_slice(&(comments.len() as u32).to_le_bytes());
    for (key, value) in comments {
        let entry = format!("{}={}", key, value);
        vorbis.extend_from_slice(&(entry.len() as u32).to_le_bytes());
        vorbis.extend_from_slice(entry.as_bytes());
    }

    let mut out = b"fLaC".to_vec();
    push_flac_block(&mut out, 0, &streaminfo, false);
    push_flac_block(&mut out, 4, &vorbis, true);
    out.extend_from_slice(b"AUDIOFRAMES");
    out
}

fn push_flac_block(out: &mut Vec<u8>, block_type: u8, body: &[u8], is_last: bool) {
    out.push(if is_last { block_type | 0x80 } else { block_type });
    out.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    out.extend_from_slice(body);
}

/// MPEG audio without any ID3 tag.
pub fn mp3_bytes() -> Vec<u8> {
    b"\xFF\xFBMPEGFRAME".to_vec()
}

/// ID3v2.3 tag holding latin-1 text frames, followed by MPEG audio.
pub fn mp3_with_frames(frames: &[(&str, &str)]) -> Vec<u8> {
    let body: Vec<u8> = frames.iter().flat_map(|(id, text)| v23_text_frame(id, text)).collect();
    v23_tag(&body)
}

/// Like [`mp3_with_frames`], plus one zlib-compressed text frame at the end.
pub fn mp3_with_compressed_frame(frames: &[(&str, &str)], compressed: (&str, &str)) -> Vec<u8> {
    let mut body: Vec<u8> = frames.iter().flat_map(|(id, text)| v23_text_frame(id, text)).collect();

    let (id, text) = compressed;
    let mut payload = vec![0u8];
    payload.extend_from_slice(text.as_bytes());
    let packed = zlib_stored(&payload);
    body.extend_from_slice(id.as_bytes());
    body.extend_from_slice(&((packed.len() + 4) as u32).to_be_bytes());
    body.extend_from_slice(&[0x00, 0x80]);
    body.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    body.extend_from_slice(&packed);

    v23_tag(&body)
}

fn v23_text_frame(id: &str, text: &str) -> Vec<u8> {
    let mut payload = vec![0u8];
    payload.extend_from_slice(text.as_bytes());
    let mut out = id.as_bytes().to_vec();
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(&payload);
    out
}

fn v23_tag(body: &[u8]) -> Vec<u8> {
    let mut out = b"ID3\x03\x00\x00".to_vec();
    let size = body.len();
    out.extend_from_slice(&[
        ((size >> 21) & 0x7F) as u8,
        ((size >> 14) & 0x7F) as u8,
        ((size >> 7) & 0x7F) as u8,
        (size & 0x7F) as u8,
    ]);
    out.extend_from_slice(body);
    out.extend(mp3_bytes());
    out
}

/// zlib stream holding `data` in one stored block.
fn zlib_stored(data: &[u8]) -> Vec<u8> {
    let len = data.len() as u16;
    let mut out = vec![0x78, 0x01, 0x01];
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(&(!len).to_le_bytes());
    out.extend_from_slice(data);
    let (mut a, mut b) = (1u32, 0u32);
    for &byte in data {
        a = (a + u32::from(byte)) % 65521;
        b = (b + a) % 65521;
    }
    out.extend_from_slice(&((b << 16) | a).to_be_bytes());
    out
}

fn atom(name: &[u8], body: &[u8]) -> Vec<u8> {
    let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(name);
    out.extend_from_slice(body);
    out
}

/// ftyp + moov(mvhd, trak/mdia/minf/stbl/stco) + mdat with the chunk
/// offset pointing at the mdat payload.
pub fn mp4_bytes() -> Vec<u8> {
    let ftyp = atom(b"ftyp", b"M4A \0\0\0\0");
    let mut mvhd = vec![0u8; 100];
    mvhd[12..16].copy_from_slice(&1000u32.to_be_bytes());
    mvhd[16..20].copy_from_slice(&5000u32.to_be_bytes());
    let mvhd = atom(b"mvhd", &mvhd);

    let build = |offset: u32| {
        let mut stco = vec![0u8; 4];
        stco.extend_from_slice(&1u32.to_be_bytes());
        stco.extend_from_slice(&offset.to_be_bytes());
        let stbl = atom(b"stbl", &atom(b"stco", &stco));
        let minf = atom(b"minf", &stbl);
        let mdia = atom(b"mdia", &minf);
        let trak = atom(b"trak", &mdia);
        atom(b"moov", &[mvhd.clone(), trak].concat())
    };
    let moov_len = build(0).len();
    let offset = (ftyp.len() + moov_len + 8) as u32;
    let mdat = atom(b"mdat", b"AACFRAMES");
    [ftyp, build(offset), mdat].concat()
}

fn asf_object(guid: &[u8; 16], body: &[u8]) -> Vec<u8> {
    let mut out = guid.to_vec();
    out.extend_from_slice(&((body.len() + 24) as u64).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// ASF header with File and Stream Properties, no metadata objects.
pub fn wma_bytes() -> Vec<u8> {
    let mut file_properties = vec![0u8; 80];
    file_properties[40..48].copy_from_slice(&31_000_000u64.to_le_bytes());
    file_properties[56..64].copy_from_slice(&100u64.to_le_bytes());
    file_properties[76..80].copy_from_slice(&128_000u32.to_le_bytes());

    let mut stream_properties = ASF_AUDIO_MEDIA.to_vec();
    stream_properties.resize(54, 0);
    stream_properties.extend_from_slice(&[0x61, 0x01]);
    stream_properties.extend_from_slice(&2u16.to_le_bytes());
    stream_properties.extend_from_slice(&44_100u32.to_le_bytes());
    stream_properties.extend_from_slice(&16_000u32.to_le_bytes());
    stream_properties.extend_from_slice(&[0, 0]);
    stream_properties.extend_from_slice(&16u16.to_le_bytes());

    let children = [
        asf_object(&ASF_FILE_PROPERTIES, &file_properties),
        asf_object(&ASF_STREAM_PROPERTIES, &stream_properties),
    ]
    .concat();

    let mut out = ASF_HEADER.to_vec();
    out.extend_from_slice(&((30 + children.len()) as u64).to_le_bytes());
    out.extend_from_slice(&2u32.to_le_bytes());
    out.extend_from_slice(&[0x01, 0x02]);
    out.extend(children);
    out.extend_from_slice(b"DATAOBJECT");
    out
}

/// One empty file per supported format.
pub fn every_format(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_file(dir, "song.flac", &flac_bytes(&[])),
        write_file(dir, "song.mp3", &mp3_bytes()),
        write_file(dir, "song.m4a", &mp4_bytes()),
        write_file(dir, "song.wma", &wma_bytes()),
    ]
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).unwrap();
    path
}

/// A small PNG on disk, usable as an image link.
pub fn png_file(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, image::Rgb(color)));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    write_file(dir, name, &buffer)
}

/// Writes enabled, Spotify links, local image files.
pub fn config() -> SyncConfig {
    SyncConfig::builder()
        .remote_link(Arc::new(SpotifyLink))
        .image_source(Arc::new(FileImageSource))
        .dry_run(false)
        .build()
        .unwrap()
}
