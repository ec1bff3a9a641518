//! Corruption detection tests
//!
//! These tests verify that damaged or incomplete archives are rejected at
//! open (or on read) with `CorruptArchive`-class errors:
//! - Unfinalized and truncated archives have no usable end marker
//! - Directory fields pointing outside the archive are caught
//! - Missing identity records are reported by `serialization_id`
//! - Misaligned payloads are rejected unless alignment checks are relaxed

use recordpack_archive::format::{
    CentralHeader, EndOfCentralDirectory, LocalHeader, EOCD_SIZE, LOCAL_HEADER_SIG,
};
use recordpack_archive::{ArchiveReader, ArchiveWriter, ReaderConfig, WriterConfig};
use recordpack_core::{ArchiveError, RecordSink};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

fn finalized(records: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ArchiveWriter::new(Vec::new());
    for (name, data) in records {
        writer.write_record(name, data).unwrap();
    }
    writer.write_end_of_file().unwrap();
    writer.into_inner().unwrap()
}

fn open_err(bytes: &[u8]) -> ArchiveError {
    match ArchiveReader::new(bytes) {
        Ok(_) => panic!("expected archive to be rejected"),
        Err(e) => e,
    }
}

/// Hand-assemble an archive from raw parts, bypassing the writer
fn assemble(records: &[(&str, &[u8])], alignment: u64) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    for (name, data) in records {
        let header_offset = out.len() as u64;
        let crc32 = crc32fast::hash(data);
        let (header, _) = LocalHeader::new(name, crc32, data.len() as u64)
            .encode(header_offset, alignment);
        out.extend_from_slice(&header);
        out.extend_from_slice(data);
        CentralHeader {
            name: name.to_string(),
            crc32,
            size: data.len() as u64,
            header_offset,
        }
        .encode(&mut central);
    }
    let end = EndOfCentralDirectory {
        entries: records.len() as u64,
        cd_size: central.len() as u64,
        cd_offset: out.len() as u64,
    };
    out.extend_from_slice(&central);
    let position = out.len() as u64;
    end.encode(position, &mut out);
    out
}

#[test]
fn test_unfinalized_archive_rejected() {
    init_tracing();
    // Keep the bytes of a writer that is never finalized
    let mut partial = Vec::new();
    let mut probe = ArchiveWriter::new(&mut partial);
    probe.write_record("key1", &[1u8; 100]).unwrap();
    drop(probe);

    let err = open_err(&partial);
    assert!(matches!(err, ArchiveError::CorruptArchive(_)), "{}", err);
}

#[test]
fn test_empty_and_tiny_sources_rejected() {
    assert!(open_err(&[]).is_corruption());
    assert!(open_err(&[0u8; 21]).is_corruption());
    assert!(open_err(&[0u8; 4096]).is_corruption());
}

#[test]
fn test_truncated_archive_rejected() {
    let archive = finalized(&[("key1", &[9u8; 300])]);
    for cut in [1, 10, EOCD_SIZE as usize, archive.len() / 2] {
        let truncated = &archive[..archive.len() - cut];
        let err = open_err(truncated);
        assert!(err.is_corruption() || err.is_io(), "cut {}: {}", cut, err);
    }
}

#[test]
fn test_directory_offset_out_of_range() {
    let mut archive = finalized(&[("key1", b"payload")]);
    let eocd = archive.len() - EOCD_SIZE as usize;
    // cd_offset field at +16
    archive[eocd + 16..eocd + 20].copy_from_slice(&0x00FF_FFFFu32.to_le_bytes());
    assert!(open_err(&archive).is_corruption());
}

#[test]
fn test_entry_count_too_large() {
    let mut archive = finalized(&[("key1", b"payload")]);
    let eocd = archive.len() - EOCD_SIZE as usize;
    archive[eocd + 8..eocd + 10].copy_from_slice(&500u16.to_le_bytes());
    archive[eocd + 10..eocd + 12].copy_from_slice(&500u16.to_le_bytes());
    assert!(open_err(&archive).is_corruption());
}

#[test]
fn test_local_header_damage_detected() {
    let mut archive = finalized(&[("key1", b"payload")]);
    assert_eq!(&archive[..4], &LOCAL_HEADER_SIG.to_le_bytes());
    archive[0] = 0;
    assert!(open_err(&archive).is_corruption());

    let mut archive = finalized(&[("key1", b"payload")]);
    archive[30] = b'X'; // first byte of the local name
    let err = open_err(&archive);
    assert!(err.to_string().contains("does not match"), "{}", err);
}

#[test]
fn test_missing_identity_record() {
    let archive = assemble(&[("key1", b"no identity here")], 64);
    let reader = ArchiveReader::new(&archive).unwrap();

    assert_eq!(reader.get_record("key1").unwrap(), b"no identity here");
    let err = reader.serialization_id().unwrap_err();
    assert!(matches!(err, ArchiveError::CorruptArchive(_)));
    assert!(!reader.has_record(".data/serialization_id"));
}

#[test]
fn test_duplicate_names_rejected() {
    let archive = assemble(&[("key1", b"a"), ("key1", b"b")], 64);
    let err = open_err(&archive);
    assert!(err.to_string().contains("duplicate"), "{}", err);
}

#[test]
fn test_misaligned_archive() {
    let archive = assemble(&[("key1", b"unaligned payload")], 1);
    let err = open_err(&archive);
    assert!(err.to_string().contains("aligned"), "{}", err);

    let relaxed = ReaderConfig::new().with_strict_alignment(false);
    let reader = ArchiveReader::with_config(&archive, relaxed).unwrap();
    assert_eq!(reader.get_record("key1").unwrap(), b"unaligned payload");
}

#[test]
fn test_reader_alignment_must_match_writer() {
    let config = WriterConfig::new().with_alignment(16);
    let mut writer = ArchiveWriter::with_config(Vec::new(), config).unwrap();
    writer.write_record("a", b"x").unwrap();
    writer.write_record("b", &[0u8; 17]).unwrap();
    writer.write_end_of_file().unwrap();
    let archive = writer.into_inner().unwrap();

    let reader =
        ArchiveReader::with_config(&archive, ReaderConfig::new().with_alignment(16)).unwrap();
    assert_eq!(reader.get_record_offset("b").unwrap() % 16, 0);
}

#[test]
fn test_corrupted_payload_fails_every_read_form() {
    let mut archive = finalized(&[("key1", &[5u8; 64]), ("key2", b"intact")]);
    let offset = ArchiveReader::new(&archive)
        .unwrap()
        .get_record_offset("key1")
        .unwrap() as usize;
    archive[offset + 10] ^= 0x01;

    let reader = ArchiveReader::new(&archive).unwrap();
    assert!(reader.get_record("key1").unwrap_err().is_corruption());

    let mut dst = vec![0u8; 64];
    assert!(reader.get_record_into("key1", &mut dst).unwrap_err().is_corruption());
    assert!(reader
        .get_record_chunked("key1", &mut dst, 7, |d, s| d.copy_from_slice(s))
        .unwrap_err()
        .is_corruption());

    // Other records are unaffected
    assert_eq!(reader.get_record("key2").unwrap(), b"intact");
}

#[test]
fn test_sink_error_propagates() {
    init_tracing();
    struct FailingSink;
    impl RecordSink for FailingSink {
        fn append(&mut self, _data: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        }
    }

    let mut writer = ArchiveWriter::new(FailingSink);
    let err = writer.write_record("key1", b"data").unwrap_err();
    assert!(matches!(err, ArchiveError::Io(_)));
    assert!(writer.written_records().is_empty());

    // The writer is poisoned after a sink failure
    let err = writer.write_record("key2", b"data").unwrap_err();
    assert!(matches!(err, ArchiveError::InvalidState(_)));
    assert!(matches!(
        writer.write_end_of_file().unwrap_err(),
        ArchiveError::InvalidState(_)
    ));
}
