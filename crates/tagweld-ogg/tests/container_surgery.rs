//! On-disk surgery scenarios: grow, shrink, round-trip, corruption.

use pretty_assertions::assert_eq;
use std::io::{Cursor, Write};
use tagweld_ogg::packet::{PageTemplate, packet_to_pages};
use tagweld_ogg::page::Page;
use tagweld_ogg::{Error, OggStream};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

const SERIAL: u32 = 0x7A67_0001;

fn init_tracing() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Lay out one packet per run of pages, the way the rewrite engine does,
/// and write the stream to a temp file.
fn write_fixture(packets: &[(&[u8], i64)]) -> tempfile::NamedTempFile {
    let mut out = Vec::new();
    let mut sequence = 0;
    for (i, (bytes, granule)) in packets.iter().enumerate() {
        let pages = packet_to_pages(
            bytes,
            &PageTemplate {
                serial: SERIAL,
                base_sequence: sequence,
                granule_position: *granule,
                bos: i == 0,
                eos: i + 1 == packets.len(),
            },
        );
        sequence += pages.len() as u32;
        for page in pages {
            out.extend_from_slice(&page.serialize());
        }
    }
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&out).unwrap();
    file.flush().unwrap();
    file
}

/// A four-packet stream shaped like a small Vorbis file: identification,
/// comment, setup, one audio packet.
fn vorbis_shaped_fixture() -> tempfile::NamedTempFile {
    write_fixture(&[
        (&[1u8; 30], 0),
        (b"tag packet", 0),
        (&[5u8; 3832], 0),
        (&[0xAAu8; 2000], 162_540),
    ])
}

fn parse_all_pages(path: &std::path::Path) -> Vec<Page> {
    let data = std::fs::read(path).unwrap();
    let mut cursor = Cursor::new(&data);
    let mut pages = Vec::new();
    while (cursor.position() as usize) < data.len() {
        pages.push(Page::parse(&mut cursor).unwrap());
    }
    pages
}

#[test]
fn round_trip_across_page_capacity_boundaries() {
    for len in [0usize, 1, 254, 255, 256, 510, 65_024, 65_025, 65_026, 131_072] {
        let fixture = vorbis_shaped_fixture();
        let mut stream = OggStream::open(fixture.path()).unwrap();

        let replacement: Vec<u8> = (0..len).map(|i| (i % 239) as u8).collect();
        stream.replace_packet(1, &replacement).unwrap();
        assert_eq!(stream.packet_at(1).unwrap(), replacement, "length {len}");

        // A fresh open sees the same packet and the other packets untouched.
        let mut reopened = OggStream::open(fixture.path()).unwrap();
        assert_eq!(reopened.packet_count(), 4, "length {len}");
        assert_eq!(reopened.packet_at(1).unwrap(), replacement, "length {len}");
        assert_eq!(reopened.packet_at(0).unwrap(), vec![1u8; 30], "length {len}");
        assert_eq!(reopened.packet_at(3).unwrap(), vec![0xAAu8; 2000], "length {len}");
    }
}

#[test]
fn sequence_numbers_gapless_after_rewrite() {
    let fixture = vorbis_shaped_fixture();
    let mut stream = OggStream::open(fixture.path()).unwrap();
    stream.replace_packet(1, &vec![b'Q'; 80_000]).unwrap();

    let pages = parse_all_pages(fixture.path());
    let sequences: Vec<u32> = pages.iter().map(|p| p.header.sequence).collect();
    let expected: Vec<u32> = (0..pages.len() as u32).collect();
    assert_eq!(sequences, expected);
}

#[test]
fn every_checksum_validates_after_rewrite() {
    let fixture = vorbis_shaped_fixture();
    let mut stream = OggStream::open(fixture.path()).unwrap();
    stream.replace_packet(1, b"ARTIST=Somebody Else").unwrap();

    for page in parse_all_pages(fixture.path()) {
        page.verify().unwrap();
    }
}

#[test]
fn replacement_is_idempotent_on_disk() {
    let fixture = vorbis_shaped_fixture();

    let mut stream = OggStream::open(fixture.path()).unwrap();
    stream.replace_packet(1, b"the very same tag bytes").unwrap();
    let once = std::fs::read(fixture.path()).unwrap();

    let mut stream = OggStream::open(fixture.path()).unwrap();
    stream.replace_packet(1, b"the very same tag bytes").unwrap();
    let twice = std::fs::read(fixture.path()).unwrap();

    assert_eq!(once, twice);
}

#[test]
fn small_grow_keeps_tag_on_one_page_and_audio_bytes_identical() {
    let fixture = vorbis_shaped_fixture();
    let before_pages = parse_all_pages(fixture.path());
    assert_eq!(before_pages.len(), 4);

    let mut stream = OggStream::open(fixture.path()).unwrap();
    // 10-byte comment packet becomes 12 bytes.
    stream.replace_packet(1, b"tag packet++").unwrap();
    assert_eq!(stream.page_count(), 4);

    let after_pages = parse_all_pages(fixture.path());
    assert_eq!(after_pages.len(), 4);

    // The setup and audio pages shift by two bytes but are byte-identical
    // once re-serialized: same sequence numbers, same payloads.
    assert_eq!(after_pages[2].serialize(), before_pages[2].serialize());
    assert_eq!(after_pages[3].serialize(), before_pages[3].serialize());
    assert_eq!(after_pages[3].header.granule_position, 162_540);
    assert!(after_pages[3].header.is_eos());
}

#[test]
fn large_tag_spans_multiple_pages_with_deterministic_layout() {
    init_tracing();
    let fixture = vorbis_shaped_fixture();
    let mut stream = OggStream::open(fixture.path()).unwrap();

    // 131072 bytes lace into 514 full segments plus a 2-byte terminator:
    // three pages of 65025, 65025, and 1022 payload bytes.
    stream.replace_packet(1, &vec![b'A'; 131_072]).unwrap();
    assert_eq!(stream.page_count(), 6);
    assert_eq!(stream.last_page_sequence_number(), Some(5));

    let pages = parse_all_pages(fixture.path());
    let payload_lens: Vec<usize> = pages.iter().map(|p| p.payload.len()).collect();
    assert_eq!(payload_lens, vec![30, 65_025, 65_025, 1022, 3832, 2000]);
    assert!(pages[2].header.is_continued());
    assert!(pages[3].header.is_continued());
    assert!(!pages[4].header.is_continued());
}

#[test]
fn shrinking_collapses_pages_and_renumbers_the_tail() {
    init_tracing();
    let fixture = vorbis_shaped_fixture();

    let mut stream = OggStream::open(fixture.path()).unwrap();
    stream.replace_packet(1, &vec![b'A'; 131_072]).unwrap();
    assert_eq!(stream.page_count(), 6);
    assert_eq!(stream.last_page_sequence_number(), Some(5));

    stream.replace_packet(1, b"ABCDE").unwrap();
    assert_eq!(stream.page_count(), 4);
    assert_eq!(stream.last_page_sequence_number(), Some(3));
    assert_eq!(stream.packet_at(1).unwrap(), b"ABCDE");
    assert_eq!(stream.packet_at(3).unwrap(), vec![0xAAu8; 2000]);
    assert_eq!(stream.last_page_granule_position(), Some(162_540));
}

#[test]
fn flipped_payload_byte_reports_only_that_page() {
    let fixture = vorbis_shaped_fixture();

    let mut bytes = std::fs::read(fixture.path()).unwrap();
    // Flip one byte inside the setup packet's payload (third page).
    let mut cursor = Cursor::new(&bytes);
    let mut offset = 0u64;
    for _ in 0..2 {
        let page = Page::parse(&mut cursor).unwrap();
        offset += page.len() as u64;
    }
    let setup_page = Page::parse(&mut cursor).unwrap();
    let target = offset as usize + setup_page.header.header_len() + 100;
    bytes[target] ^= 0x80;
    std::fs::write(fixture.path(), &bytes).unwrap();

    // A verified open refuses the file outright.
    assert!(matches!(
        OggStream::open(fixture.path()).unwrap_err(),
        Error::CorruptPage { page: 2, .. }
    ));

    // Inspection still enumerates everything and reads the intact packets.
    let mut stream = OggStream::inspect(fixture.path()).unwrap();
    assert_eq!(stream.page_count(), 4);
    assert_eq!(stream.packet_count(), 4);
    let ok_flags: Vec<bool> = stream.pages().iter().map(|p| p.checksum_ok).collect();
    assert_eq!(ok_flags, vec![true, true, false, true]);

    assert_eq!(stream.packet_at(0).unwrap(), vec![1u8; 30]);
    assert_eq!(stream.packet_at(1).unwrap(), b"tag packet");
    assert_eq!(stream.packet_at(3).unwrap(), vec![0xAAu8; 2000]);
    assert!(matches!(
        stream.packet_at(2).unwrap_err(),
        Error::CorruptPage { page: 2, .. }
    ));
}

#[test]
fn patch_offset_spares_the_prefix() {
    let fixture = vorbis_shaped_fixture();
    let before = std::fs::read(fixture.path()).unwrap();

    let mut stream = OggStream::open(fixture.path()).unwrap();
    let tag_page_offset = stream.pages()[1].offset;
    let patch = stream.replacement_patch(1, b"brand new tag").unwrap();
    assert_eq!(patch.offset, tag_page_offset);

    // Planning alone must not modify the file.
    assert_eq!(std::fs::read(fixture.path()).unwrap(), before);
}
