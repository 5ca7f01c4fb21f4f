use std::io::Cursor;

use squashpack_core::{
    BlockProcessor, Compressor, FileBlockWriter, FragTable, ProcessorConfig, Result,
};

const BLOCK_SIZE: usize = 4096;

type MemWriter = FileBlockWriter<Cursor<Vec<u8>>>;

#[derive(Clone, Copy)]
struct NullCodec;

impl Compressor for NullCodec {
    fn deep_copy(&self) -> Box<dyn Compressor> {
        Box::new(*self)
    }

    fn compress_block(&mut self, _input: &[u8], _scratch: &mut [u8]) -> Result<usize> {
        Ok(0)
    }
}

fn new_processor() -> BlockProcessor<MemWriter, FragTable> {
    let config = ProcessorConfig {
        block_size: BLOCK_SIZE,
        num_workers: 1,
        max_backlog: 8,
    };
    let writer = FileBlockWriter::new(Cursor::new(Vec::new()), 0).expect("writer over cursor");
    BlockProcessor::new(config, Box::new(NullCodec), writer, FragTable::new())
        .expect("processor construction")
}

fn two_distinct_blocks() -> Vec<u8> {
    let mut data = vec![0xA5u8; BLOCK_SIZE];
    data.extend(std::iter::repeat(0x3Cu8).take(BLOCK_SIZE));
    data
}

#[test]
fn identical_files_share_on_disk_blocks() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut proc = new_processor();
    let data = two_distinct_blocks();

    let first = proc.begin_file(0)?;
    proc.append(&data)?;
    proc.end_file()?;

    let second = proc.begin_file(0)?;
    proc.append(&data)?;
    proc.end_file()?;

    proc.finish()?;

    // The second file's blocks deduplicate against the first's.
    assert_eq!(proc.stats().data_block_count, 2);
    assert_eq!(proc.stats().input_bytes_read, 4 * BLOCK_SIZE as u64);

    let first_records = proc.inode(first).block_records().to_vec();
    let second_records = proc.inode(second).block_records().to_vec();
    assert_eq!(first_records.len(), 2);
    assert_eq!(first_records, second_records);

    let (writer, _) = proc.into_inner();
    let output = writer.into_inner().into_inner();
    assert_eq!(output.len(), 2 * BLOCK_SIZE, "only two blocks on disk");
    Ok(())
}

#[test]
fn whole_block_dedup_survives_interleaved_unique_blocks()
-> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut proc = new_processor();

    let repeated = vec![0x11u8; BLOCK_SIZE];
    let unique = vec![0x22u8; BLOCK_SIZE];

    proc.begin_file(0)?;
    proc.append(&repeated)?;
    proc.end_file()?;

    proc.begin_file(0)?;
    proc.append(&unique)?;
    proc.end_file()?;

    let third = proc.begin_file(0)?;
    proc.append(&repeated)?;
    proc.end_file()?;
    proc.finish()?;

    assert_eq!(proc.stats().data_block_count, 2);
    assert_eq!(proc.inode(third).block_records()[0].offset, 0);
    Ok(())
}

#[test]
fn all_zero_file_becomes_sparse_blocks() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut proc = new_processor();

    let inode = proc.begin_file(0)?;
    proc.append(&vec![0u8; 3 * BLOCK_SIZE])?;
    proc.end_file()?;
    proc.finish()?;

    let stats = proc.stats();
    assert_eq!(stats.sparse_block_count, 3);
    assert_eq!(stats.data_block_count, 0);
    assert_eq!(stats.total_frag_count, 0);
    assert_eq!(stats.input_bytes_read, 3 * BLOCK_SIZE as u64);

    let inode = proc.inode(inode);
    assert_eq!(inode.file_size(), 3 * BLOCK_SIZE as u64);
    assert_eq!(inode.block_records().len(), 3);
    for record in inode.block_records() {
        assert_eq!(record.offset, 0);
        assert_eq!(record.size, 0);
    }

    let (writer, _) = proc.into_inner();
    assert!(
        writer.into_inner().into_inner().is_empty(),
        "sparse blocks never reach the writer"
    );
    Ok(())
}

#[test]
fn zero_tail_stays_a_fragment_and_deduplicates()
-> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut proc = new_processor();

    let first = proc.begin_file(0)?;
    proc.append(&vec![0u8; 900])?;
    proc.end_file()?;

    let second = proc.begin_file(0)?;
    proc.append(&vec![0u8; 900])?;
    proc.end_file()?;
    proc.finish()?;

    let stats = proc.stats();
    assert_eq!(stats.sparse_block_count, 0, "tails are not sparse-detected");
    assert_eq!(stats.total_frag_count, 2);
    assert_eq!(stats.actual_frag_count, 1);
    assert_eq!(stats.frag_block_count, 1);

    assert_eq!(
        proc.inode(first).frag_location(),
        proc.inode(second).frag_location()
    );
    Ok(())
}

#[test]
fn duplicate_fragments_count_in_total_but_not_actual()
-> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut proc = new_processor();

    let shared_tail = vec![0x42u8; 600];
    let other_tail = vec![0x24u8; 600];

    let first = proc.begin_file(0)?;
    proc.append(&shared_tail)?;
    proc.end_file()?;

    proc.begin_file(0)?;
    proc.append(&other_tail)?;
    proc.end_file()?;

    let third = proc.begin_file(0)?;
    proc.append(&shared_tail)?;
    proc.end_file()?;
    proc.finish()?;

    let stats = proc.stats();
    assert_eq!(stats.total_frag_count, 3);
    assert_eq!(stats.actual_frag_count, 2);
    assert_eq!(
        stats.total_frag_count - stats.actual_frag_count,
        1,
        "difference counts deduplicated fragments"
    );
    assert_eq!(
        proc.inode(first).frag_location(),
        proc.inode(third).frag_location()
    );
    Ok(())
}
