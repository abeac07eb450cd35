//! Test fixture generation for the compressed upload formats
//!
//! Run with: cargo test --test generate_test_fixtures -- --ignored --nocapture
//!
//! No encoder for these formats is available as a dependency, so the files
//! are assembled by hand from the smallest streams each decoder accepts:
//! - FLAC and Ogg FLAC: verbatim subframes of a 16-bit triangle wave
//! - ADTS AAC and M4A: LC frames with no spectral data (silence)

use std::fs;
use std::path::PathBuf;

const TRIANGLE_PERIOD: usize = 100;
const OGG_SERIAL: u32 = 0x616d_7267;

fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 { (crc << 1) ^ 0x07 } else { crc << 1 };
        }
    }
    crc
}

fn crc16(data: &[u8]) -> u16 {
    let mut crc = 0u16;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 { (crc << 1) ^ 0x8005 } else { crc << 1 };
        }
    }
    crc
}

fn crc32_ogg(data: &[u8]) -> u32 {
    let mut crc = 0u32;
    for &byte in data {
        crc ^= (byte as u32) << 24;
        for _ in 0..8 {
            crc = if crc & 0x8000_0000 != 0 { (crc << 1) ^ 0x04C1_1DB7 } else { crc << 1 };
        }
    }
    crc
}

fn triangle(i: usize, amplitude: i32) -> i16 {
    let half = (TRIANGLE_PERIOD / 2) as i32;
    let p = (i % TRIANGLE_PERIOD) as i32;
    let value = if p < half {
        -amplitude + p * 2 * amplitude / half
    } else {
        amplitude - (p - half) * 2 * amplitude / half
    };
    value as i16
}

/// MSB-first bit packer, zero-padded to a whole byte
#[derive(Default)]
struct BitWriter {
    bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    fn push(&mut self, value: u32, width: u32) {
        for bit in (0..width).rev() {
            if self.used % 8 == 0 {
                self.bytes.push(0);
            }
            if (value >> bit) & 1 == 1 {
                let last = self.bytes.len() - 1;
                self.bytes[last] |= 0x80 >> (self.used % 8);
            }
            self.used += 1;
        }
    }

    fn finish(self) -> Vec<u8> {
        self.bytes
    }
}

fn be24(value: usize) -> [u8; 3] {
    let b = (value as u32).to_be_bytes();
    [b[1], b[2], b[3]]
}

// FLAC

fn flac_rate_code(rate: u32) -> u8 {
    match rate {
        22050 => 0x6,
        44100 => 0x9,
        48000 => 0xA,
        _ => panic!("no FLAC rate code for {}", rate),
    }
}

fn flac_block_code(block: usize) -> u8 {
    match block {
        2048 => 0xB,
        4096 => 0xC,
        _ => panic!("no FLAC block code for {}", block),
    }
}

fn streaminfo(rate: u32, channels: u16, block: usize, total: usize, frame_len: usize) -> Vec<u8> {
    let mut info = Vec::with_capacity(34);
    info.extend_from_slice(&(block as u16).to_be_bytes());
    info.extend_from_slice(&(block as u16).to_be_bytes());
    info.extend_from_slice(&be24(frame_len));
    info.extend_from_slice(&be24(frame_len));
    let packed = ((rate as u64) << 44)
        | (((channels - 1) as u64) << 41)
        | (15u64 << 36)
        | total as u64;
    info.extend_from_slice(&packed.to_be_bytes());
    info.extend_from_slice(&[0; 16]);
    info
}

fn flac_frames(rate: u32, block: usize, count: usize, amplitudes: &[i32]) -> Vec<Vec<u8>> {
    let channels = amplitudes.len() as u8;
    (0..count)
        .map(|n| {
            let mut frame = vec![
                0xFF,
                0xF8,
                (flac_block_code(block) << 4) | flac_rate_code(rate),
                ((channels - 1) << 4) | (0b100 << 1),
                n as u8,
            ];
            frame.push(crc8(&frame));
            for &amplitude in amplitudes {
                // Verbatim subframe
                frame.push(0x02);
                for i in 0..block {
                    frame.extend_from_slice(&triangle(n * block + i, amplitude).to_be_bytes());
                }
            }
            let crc = crc16(&frame);
            frame.extend_from_slice(&crc.to_be_bytes());
            frame
        })
        .collect()
}

/// A frame sync pattern inside a frame body would confuse resync
fn assert_no_false_sync(frames: &[Vec<u8>]) {
    for frame in frames {
        for k in 1..frame.len() - 1 {
            assert!(
                !(frame[k] == 0xFF && frame[k + 1] & 0xFC == 0xF8),
                "false sync inside frame"
            );
        }
    }
}

fn native_flac() -> Vec<u8> {
    let (rate, block, count) = (44100, 4096, 4);
    let frames = flac_frames(rate, block, count, &[8192]);
    assert_no_false_sync(&frames);
    let info = streaminfo(rate, 1, block, block * count, frames[0].len());

    let mut out = b"fLaC".to_vec();
    out.push(0x80);
    out.extend_from_slice(&be24(info.len()));
    out.extend_from_slice(&info);
    for frame in &frames {
        out.extend_from_slice(frame);
    }
    out
}

fn ogg_page(seq: u32, granule: i64, header_type: u8, packet: &[u8]) -> Vec<u8> {
    let mut lacing = vec![255u8; packet.len() / 255];
    lacing.push((packet.len() % 255) as u8);

    let mut page = b"OggS".to_vec();
    page.extend_from_slice(&[0, header_type]);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&OGG_SERIAL.to_le_bytes());
    page.extend_from_slice(&seq.to_le_bytes());
    page.extend_from_slice(&[0; 4]);
    page.push(lacing.len() as u8);
    page.extend_from_slice(&lacing);
    page.extend_from_slice(packet);

    let crc = crc32_ogg(&page);
    page[22..26].copy_from_slice(&crc.to_le_bytes());
    page
}

fn ogg_flac() -> Vec<u8> {
    let (rate, block, count) = (22050, 2048, 4);
    let frames = flac_frames(rate, block, count, &[8192, 4096]);
    assert_no_false_sync(&frames);
    let info = streaminfo(rate, 2, block, block * count, frames[0].len());

    let mut ident = vec![0x7F];
    ident.extend_from_slice(b"FLAC");
    ident.extend_from_slice(&[1, 0]);
    ident.extend_from_slice(&1u16.to_be_bytes());
    ident.extend_from_slice(b"fLaC");
    ident.push(0x00);
    ident.extend_from_slice(&be24(info.len()));
    ident.extend_from_slice(&info);
    assert_eq!(ident.len(), 51);

    let vendor = b"amrg";
    let mut comment = (vendor.len() as u32).to_le_bytes().to_vec();
    comment.extend_from_slice(vendor);
    comment.extend_from_slice(&0u32.to_le_bytes());
    let mut comment_packet = vec![0x84];
    comment_packet.extend_from_slice(&be24(comment.len()));
    comment_packet.extend_from_slice(&comment);

    let mut out = ogg_page(0, 0, 0x02, &ident);
    out.extend(ogg_page(1, 0, 0x00, &comment_packet));
    for (n, frame) in frames.iter().enumerate() {
        let header_type = if n == count - 1 { 0x04 } else { 0x00 };
        out.extend(ogg_page(n as u32 + 2, ((n + 1) * block) as i64, header_type, frame));
    }
    out
}

// AAC

fn aac_rate_index(rate: u32) -> u32 {
    match rate {
        48000 => 3,
        44100 => 4,
        _ => panic!("no AAC rate index for {}", rate),
    }
}

/// ics_info + section data for a long window with max_sfb 0 and no tools
fn push_silent_ics(bits: &mut BitWriter) {
    bits.push(100, 8); // global_gain
    bits.push(0, 1); // reserved
    bits.push(0, 2); // ONLY_LONG_SEQUENCE
    bits.push(0, 1); // window shape
    bits.push(0, 6); // max_sfb
    bits.push(0, 1); // predictor
    bits.push(0, 3); // pulse, tns, gain control
}

fn sce_silence() -> Vec<u8> {
    let mut bits = BitWriter::default();
    bits.push(0b000, 3);
    bits.push(0, 4);
    push_silent_ics(&mut bits);
    bits.push(0b111, 3);
    bits.finish()
}

fn cpe_silence() -> Vec<u8> {
    let mut bits = BitWriter::default();
    bits.push(0b001, 3);
    bits.push(0, 4);
    bits.push(0, 1); // common_window
    push_silent_ics(&mut bits);
    push_silent_ics(&mut bits);
    bits.push(0b111, 3);
    bits.finish()
}

fn adts() -> Vec<u8> {
    let (rate, channels, count) = (44100, 1, 43);
    let payload = sce_silence();
    let mut out = Vec::new();
    for _ in 0..count {
        let mut header = BitWriter::default();
        header.push(0xFFF, 12);
        header.push(0, 1); // MPEG-4
        header.push(0, 2); // layer
        header.push(1, 1); // no CRC
        header.push(1, 2); // AAC LC
        header.push(aac_rate_index(rate), 4);
        header.push(0, 1);
        header.push(channels, 3);
        header.push(0, 4);
        header.push((7 + payload.len()) as u32, 13);
        header.push(0x7FF, 11); // VBR buffer fullness
        header.push(0, 2); // one raw data block
        out.extend(header.finish());
        out.extend_from_slice(&payload);
    }
    out
}

fn atom(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((8 + payload.len()) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

fn full_atom(kind: &[u8; 4], version: u8, flags: u32, payload: &[u8]) -> Vec<u8> {
    let mut body = vec![version];
    body.extend_from_slice(&be24(flags as usize));
    body.extend_from_slice(payload);
    atom(kind, &body)
}

fn be32s(values: &[u32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn be16s(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

fn m4a() -> Vec<u8> {
    let (rate, channels, count) = (48000u32, 2u16, 47u32);
    let payload = cpe_silence();
    let duration = count * 1024;

    let mut asc = BitWriter::default();
    asc.push(2, 5); // AAC LC
    asc.push(aac_rate_index(rate), 4);
    asc.push(channels as u32, 4);
    asc.push(0, 3);
    let asc = asc.finish();

    let mut dec_specific = vec![0x05, asc.len() as u8];
    dec_specific.extend_from_slice(&asc);
    let mut dec_config_body = vec![0x40, 0x15, 0, 0, 0];
    dec_config_body.extend(be32s(&[0, 0]));
    dec_config_body.extend(dec_specific);
    let mut dec_config = vec![0x04, dec_config_body.len() as u8];
    dec_config.extend(dec_config_body);
    let mut es_body = vec![0, 0, 0];
    es_body.extend(dec_config);
    es_body.extend_from_slice(&[0x06, 0x01, 0x02]);
    let mut es = vec![0x03, es_body.len() as u8];
    es.extend(es_body);
    let esds = full_atom(b"esds", 0, 0, &es);

    let mut mp4a = vec![0; 6];
    mp4a.extend(be16s(&[1, 0, 0]));
    mp4a.extend_from_slice(&[0; 4]);
    mp4a.extend(be16s(&[channels, 16, 0, 0]));
    mp4a.extend(be32s(&[rate << 16]));
    mp4a.extend(esds);
    let mp4a = atom(b"mp4a", &mp4a);

    let mut stsd = be32s(&[1]);
    stsd.extend(mp4a);
    let stsd = full_atom(b"stsd", 0, 0, &stsd);
    let stts = full_atom(b"stts", 0, 0, &be32s(&[1, count, 1024]));
    let stsc = full_atom(b"stsc", 0, 0, &be32s(&[1, 1, count, 1]));
    let stsz = full_atom(b"stsz", 0, 0, &be32s(&[payload.len() as u32, count]));
    let matrix = be32s(&[0x10000, 0, 0, 0, 0x10000, 0, 0, 0, 0x4000_0000]);

    let build = |chunk_offset: u32| -> (Vec<u8>, Vec<u8>) {
        let stco = full_atom(b"stco", 0, 0, &be32s(&[1, chunk_offset]));
        let stbl = atom(b"stbl", &[&stsd[..], &stts[..], &stsc[..], &stsz[..], &stco[..]].concat());

        let mut dref = be32s(&[1]);
        dref.extend(full_atom(b"url ", 0, 1, &[]));
        let dref = full_atom(b"dref", 0, 0, &dref);
        let smhd = full_atom(b"smhd", 0, 0, &[0; 4]);
        let minf = atom(b"minf", &[smhd, atom(b"dinf", &dref), stbl].concat());

        let mut hdlr = vec![0; 4];
        hdlr.extend_from_slice(b"soun");
        hdlr.extend_from_slice(&[0; 12]);
        hdlr.extend_from_slice(b"SoundHandler\0");
        let hdlr = full_atom(b"hdlr", 0, 0, &hdlr);

        let mut mdhd = be32s(&[0, 0, rate, duration]);
        mdhd.extend(be16s(&[0x55C4, 0]));
        let mdhd = full_atom(b"mdhd", 0, 0, &mdhd);
        let mdia = atom(b"mdia", &[mdhd, hdlr, minf].concat());

        let mut tkhd = be32s(&[0, 0, 1, 0, duration]);
        tkhd.extend_from_slice(&[0; 8]);
        tkhd.extend(be16s(&[0, 0, 0x0100, 0]));
        tkhd.extend_from_slice(&matrix);
        tkhd.extend(be32s(&[0, 0]));
        let tkhd = full_atom(b"tkhd", 0, 7, &tkhd);
        let trak = atom(b"trak", &[tkhd, mdia].concat());

        let mut mvhd = be32s(&[0, 0, rate, duration, 0x10000]);
        mvhd.extend(be16s(&[0x0100]));
        mvhd.extend_from_slice(&[0; 10]);
        mvhd.extend_from_slice(&matrix);
        mvhd.extend_from_slice(&[0; 24]);
        mvhd.extend(be32s(&[2]));
        let mvhd = full_atom(b"mvhd", 0, 0, &mvhd);
        let moov = atom(b"moov", &[mvhd, trak].concat());

        let ftyp = atom(b"ftyp", &[&b"M4A "[..], &[0u8; 4][..], &b"M4A "[..], &b"mp42"[..], &b"isom"[..]].concat());
        (ftyp, moov)
    };

    let (ftyp, moov) = build(0);
    let offset = (ftyp.len() + moov.len() + 8) as u32;
    let (ftyp, moov) = build(offset);
    let mdat = atom(b"mdat", &payload.repeat(count as usize));
    [ftyp, moov, mdat].concat()
}

#[test]
#[ignore] // Run explicitly with: cargo test --test generate_test_fixtures -- --ignored --nocapture
fn generate_compressed_fixtures() {
    let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    fs::create_dir_all(&fixtures_dir).expect("Failed to create fixtures directory");

    let fixtures = [
        ("tone.flac", native_flac()),
        ("tone.ogg", ogg_flac()),
        ("silence.aac", adts()),
        ("silence.m4a", m4a()),
    ];
    for (name, bytes) in fixtures {
        let path = fixtures_dir.join(name);
        fs::write(&path, &bytes).expect("Failed to write fixture");
        println!("  {} ({} bytes)", path.display(), bytes.len());
    }
}

#[test]
fn test_generated_fixtures_match_checked_in_files() {
    let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    for (name, bytes) in [
        ("tone.flac", native_flac()),
        ("tone.ogg", ogg_flac()),
        ("silence.aac", adts()),
        ("silence.m4a", m4a()),
    ] {
        let on_disk = fs::read(fixtures_dir.join(name)).unwrap();
        assert!(on_disk == bytes, "{} differs from its generator", name);
    }
}
