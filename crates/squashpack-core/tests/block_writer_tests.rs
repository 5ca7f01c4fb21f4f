use std::io::Cursor;

use squashpack_core::{
    BlockWriter, FileBlockWriter, BLK_ALIGN, BLK_FIRST_BLOCK, BLK_LAST_BLOCK,
};

fn mem_writer(devblksz: u64) -> FileBlockWriter<Cursor<Vec<u8>>> {
    FileBlockWriter::new(Cursor::new(Vec::new()), devblksz).expect("writer over cursor")
}

#[test]
fn write_returns_offset_and_size() {
    let mut writer = mem_writer(0);

    let (offset, written) = writer.write(b"abcdef", 0x1111, 0).expect("first write");
    assert_eq!((offset, written), (0, 6));

    let (offset, written) = writer.write(b"xyz", 0x2222, 0).expect("second write");
    assert_eq!((offset, written), (6, 3));
    assert_eq!(writer.position(), 9);
}

#[test]
fn aligned_first_block_is_padded_up_front() {
    let mut writer = mem_writer(512);

    writer.write(b"header", 0x1, 0).expect("unaligned write");
    let (offset, _) = writer
        .write(b"payload", 0x2, BLK_ALIGN | BLK_FIRST_BLOCK)
        .expect("aligned write");
    assert_eq!(offset, 512);

    let output = writer.into_inner().into_inner();
    assert!(output[6..512].iter().all(|&byte| byte == 0));
    assert_eq!(&output[512..519], b"payload");
}

#[test]
fn aligned_last_block_pads_the_tail() {
    let mut writer = mem_writer(512);

    writer
        .write(b"payload", 0x2, BLK_ALIGN | BLK_FIRST_BLOCK | BLK_LAST_BLOCK)
        .expect("aligned write");
    assert_eq!(writer.position(), 512);

    let output = writer.into_inner().into_inner();
    assert_eq!(output.len(), 512);
}

#[test]
fn dedup_lookup_finds_identical_payloads() {
    let mut writer = mem_writer(0);

    let payload = vec![0x77u8; 64];
    let (offset, written) = writer.write(&payload, 0xABCD, 0).expect("write");

    let hit = writer
        .lookup_dedup(0xABCD, 64, false, &payload)
        .expect("lookup");
    assert_eq!(hit, Some((offset, written)));
}

#[test]
fn dedup_lookup_rejects_checksum_collisions() {
    let mut writer = mem_writer(0);

    let payload = vec![0x77u8; 64];
    writer.write(&payload, 0xABCD, 0).expect("write");

    // Same key, different bytes: the payload compare must reject it.
    let imposter = vec![0x78u8; 64];
    let hit = writer
        .lookup_dedup(0xABCD, 64, false, &imposter)
        .expect("lookup");
    assert_eq!(hit, None);

    // A compressed-flag mismatch never matches either.
    let hit = writer
        .lookup_dedup(0xABCD, 64, true, &payload)
        .expect("lookup");
    assert_eq!(hit, None);
}

#[test]
fn disk_backed_writer_round_trips_through_a_real_file() {
    use std::io::{Read, Seek, SeekFrom};

    let file = tempfile::tempfile().expect("anonymous temp file");
    let mut writer = FileBlockWriter::new(file, 0).expect("writer over file");

    let (offset, written) = writer.write(b"on-disk payload", 0x55, 0).expect("write");
    assert_eq!((offset, written), (0, 15));

    let hit = writer
        .lookup_dedup(0x55, 15, false, b"on-disk payload")
        .expect("lookup");
    assert_eq!(hit, Some((0, 15)));

    let mut file = writer.into_inner();
    file.seek(SeekFrom::Start(0)).expect("rewind");
    let mut contents = Vec::new();
    file.read_to_end(&mut contents).expect("read back");
    assert_eq!(contents, b"on-disk payload");
}

#[test]
fn lookup_restores_the_append_position() {
    let mut writer = mem_writer(0);

    let payload = vec![0x10u8; 32];
    writer.write(&payload, 0x1, 0).expect("write");
    writer
        .lookup_dedup(0x1, 32, false, &payload)
        .expect("lookup");

    let (offset, _) = writer.write(b"after", 0x2, 0).expect("write after lookup");
    assert_eq!(offset, 32, "lookup must not disturb the append offset");
}
