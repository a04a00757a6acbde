mod common;

use isoflow_model::CellValue;
use isoflow_pipeline::layout::{BLOCK_ROWS, COL_IDENTIFIER_1, COL_LINE, COL_PEAK_NR, DATA_HEADERS};
use isoflow_pipeline::{build_blocks, map_columns, SourceTable};
use proptest::prelude::*;

use common::{raw_row, RAW_HEADERS};

fn source(sizes: &[u32]) -> SourceTable {
    let mut rows = Vec::new();
    for (line, size) in sizes.iter().enumerate() {
        for peak in 1..=*size {
            rows.push(raw_row(line as u32 + 1, &format!("Sample {line}"), peak));
        }
    }
    SourceTable {
        headers: RAW_HEADERS.iter().map(|h| h.to_string()).collect(),
        rows,
    }
}

proptest! {
    #[test]
    fn every_block_has_eleven_rows(sizes in prop::collection::vec(0u32..25, 1..6)) {
        let source = source(&sizes);
        let mapping = map_columns(&DATA_HEADERS, &source.headers);
        let blocks = build_blocks(&source, &mapping);

        let present: Vec<u32> = sizes.iter().copied().filter(|s| *s > 0).collect();
        prop_assert_eq!(blocks.len(), present.len());

        for (block, real) in blocks.iter().zip(&present) {
            prop_assert_eq!(block.records.len(), BLOCK_ROWS as usize);
            prop_assert_eq!(block.real_rows, *real as usize);

            let first = &block.records[0];
            for (i, record) in block.records.iter().enumerate().skip(*real as usize) {
                prop_assert_eq!(record.get(COL_LINE), first.get(COL_LINE));
                prop_assert_eq!(record.get(COL_IDENTIFIER_1), first.get(COL_IDENTIFIER_1));
                prop_assert_eq!(record.get(COL_PEAK_NR), &CellValue::Number(i as f64 + 1.0));
            }
        }
    }
}

#[test]
fn interleaved_lines_keep_first_seen_order() {
    let mut table = source(&[]);
    for (line, peak) in [(7, 1), (2, 1), (7, 2)] {
        table.rows.push(raw_row(line, "Mixed", peak));
    }
    let mapping = map_columns(&DATA_HEADERS, &table.headers);
    let blocks = build_blocks(&table, &mapping);
    let lines: Vec<&str> = blocks.iter().map(|b| b.line.as_str()).collect();
    assert_eq!(lines, vec!["7", "2"]);
    assert_eq!(blocks[0].real_rows, 2);
}
