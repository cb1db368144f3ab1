use std::sync::Arc;

use sediment_base::ErrorKind;
use test_log::test;

use crate::binding::{Binding, StorageLayout};
use crate::membind::MemBinding;
use crate::test::{as_dyn, reopen, test_env, test_file};
use crate::writer::DatasetOptions;
use crate::{FileMode, FileOptions, H5File};

fn layout_of(binding: &Arc<MemBinding>, file: &str, path: &str) -> (StorageLayout, Option<Vec<u64>>) {
    let b = as_dyn(binding);
    let fh = b.create_file(file, false, false).unwrap();
    let ds = b.open_dataset(fh, path).unwrap();
    let out = b.dataset_layout(ds).unwrap();
    b.close(ds).unwrap();
    b.close(fh).unwrap();
    out
}

#[test]
fn test_layout_decision_by_size_and_options() {
    let (binding, file) = test_env("ow-layout");
    let w = file.writer().unwrap();
    // 40 bytes: under the compact threshold.
    w.write_array("/small", &[0_i32; 10]).unwrap();
    assert_eq!(layout_of(&binding, "ow-layout", "/small").0, StorageLayout::Compact);
    // 800 bytes: contiguous.
    w.write_array("/large", &[0_i64; 100]).unwrap();
    assert_eq!(layout_of(&binding, "ow-layout", "/large").0, StorageLayout::Contiguous);
    // Forced compact beats the size rule.
    w.write_array_compact("/forced", &[0_i64; 100]).unwrap();
    assert_eq!(layout_of(&binding, "ow-layout", "/forced").0, StorageLayout::Compact);
    // Deflate and extendability force chunking.
    w.write_array_with("/zip", &[0_i64; 100], &DatasetOptions::compressed())
        .unwrap();
    assert_eq!(layout_of(&binding, "ow-layout", "/zip").0, StorageLayout::Chunked);
    w.write_array_with("/grow", &[0_i64; 100], &DatasetOptions::extendable())
        .unwrap();
    assert_eq!(layout_of(&binding, "ow-layout", "/grow").0, StorageLayout::Chunked);
    // Explicit chunks are taken as given.
    w.write_array_with("/tiled", &[0_i64; 100], &DatasetOptions::chunked(&[16]))
        .unwrap();
    assert_eq!(
        layout_of(&binding, "ow-layout", "/tiled"),
        (StorageLayout::Chunked, Some(vec![16]))
    );
}

#[test]
fn test_default_chunks_target_64k_and_respect_axes() {
    let (binding, file) = test_env("ow-chunks");
    let w = file.writer().unwrap();
    w.write_array_with("/one", &vec![0_i32; 100_000], &DatasetOptions::compressed())
        .unwrap();
    let (_, chunk) = layout_of(&binding, "ow-chunks", "/one");
    let chunk = chunk.unwrap();
    // Power of two, within the axis, and at most 64 KiB worth.
    assert_eq!(chunk.len(), 1);
    assert!(chunk[0].is_power_of_two());
    assert!(chunk[0] <= 100_000);
    assert!(chunk[0] * 4 <= 64 * 1024);
    // A short axis is never exceeded.
    let m = crate::MdArray::filled(vec![3, 100_000], 0_i32).unwrap();
    w.write_md_array_with("/two", &m, &DatasetOptions::compressed())
        .unwrap();
    let (_, chunk) = layout_of(&binding, "ow-chunks", "/two");
    let chunk = chunk.unwrap();
    assert!(chunk[0] <= 3);
    assert!(chunk[0] * chunk[1] * 4 <= 64 * 1024);
}

#[test]
fn test_deflate_level_validated() {
    let file = test_file("ow-deflate");
    let e = file
        .writer()
        .unwrap()
        .write_array_with("/d", &[1_i32], &DatasetOptions::deflate(12))
        .unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::LayoutUnsupported(_)));
}

#[test]
fn test_chunked_overwrite_extends_in_place() {
    let (binding, file) = test_env("ow-extend");
    let w = file.writer().unwrap();
    w.write_array_with("/x", &(0..10).collect::<Vec<i32>>(), &DatasetOptions::chunked(&[4]))
        .unwrap();
    // Larger shape within unlimited max: extended, not recreated; the
    // stored chunk shape survives.
    w.write_array("/x", &(0..15).collect::<Vec<i32>>()).unwrap();
    assert_eq!(
        layout_of(&binding, "ow-extend", "/x"),
        (StorageLayout::Chunked, Some(vec![4]))
    );
    assert_eq!(file.reader().read_array::<i32>("/x").unwrap(), (0..15).collect::<Vec<_>>());
}

#[test]
fn test_shrinking_overwrite_recreates() {
    let (binding, file) = test_env("ow-shrink");
    let w = file.writer().unwrap();
    w.write_array_with("/x", &(0..10).collect::<Vec<i32>>(), &DatasetOptions::chunked(&[4]))
        .unwrap();
    w.write_array("/x", &[7_i32, 8]).unwrap();
    // The replacement went through the fresh-layout decision: 8 bytes
    // is compact, so the old chunked object is gone.
    assert_eq!(layout_of(&binding, "ow-shrink", "/x").0, StorageLayout::Compact);
    assert_eq!(file.reader().read_array::<i32>("/x").unwrap(), vec![7, 8]);
}

#[test]
fn test_contiguous_overgrow_needs_latest_format() {
    let (binding, file) = test_env("ow-contig");
    let w = file.writer().unwrap();
    w.write_array("/y", &[0_i64; 100]).unwrap();
    let e = w.write_array("/y", &[0_i64; 200]).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::ShapeMismatch(_)));
    drop(w);
    drop(file);

    let file = reopen(
        &binding,
        "ow-contig",
        FileOptions {
            mode: FileMode::ReadWrite,
            ..Default::default()
        }
        .with_latest_format(),
    );
    file.writer()
        .unwrap()
        .write_array("/y", &(0..200).collect::<Vec<i64>>())
        .unwrap();
    assert_eq!(file.reader().read_array::<i64>("/y").unwrap().len(), 200);
}

#[test]
fn test_same_shape_overwrite_rewrites_in_place() {
    let (binding, file) = test_env("ow-same");
    let w = file.writer().unwrap();
    w.write_array("/y", &[1_i64; 100]).unwrap();
    w.write_array("/y", &[2_i64; 100]).unwrap();
    assert_eq!(layout_of(&binding, "ow-same", "/y").0, StorageLayout::Contiguous);
    assert_eq!(file.reader().read_array::<i64>("/y").unwrap(), vec![2; 100]);
}

#[test]
fn test_block_writes_extend_extendable_datasets() {
    let file = test_file("ow-blocks");
    let w = file.writer().unwrap();
    w.create_array::<i32>("/log", 4, &DatasetOptions::chunked(&[4]))
        .unwrap();
    w.write_array_block("/log", &[0_i32, 1, 2, 3], 0).unwrap();
    w.write_array_block("/log", &[4_i32, 5, 6, 7], 1).unwrap();
    assert_eq!(
        file.reader().read_array::<i32>("/log").unwrap(),
        vec![0, 1, 2, 3, 4, 5, 6, 7]
    );
    // A fixed-max dataset refuses blocks past its end.
    w.write_array("/fixed", &[0_i64; 100]).unwrap();
    let e = w.write_array_block_with_offset("/fixed", &[1_i64], 100).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::ShapeMismatch(_)));
    // Blocks against a missing dataset fail fast.
    let e = w.write_array_block("/nope", &[1_i32], 0).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::NoSuchObject(_)));
}

#[test]
fn test_matrix_blocks_fill_created_dataset() {
    let file = test_file("ow-mblocks");
    let w = file.writer().unwrap();
    w.create_matrix::<f64>("/m", (2, 4), &DatasetOptions::chunked(&[2, 2]))
        .unwrap();
    let left = crate::MdArray::from_rows(&[vec![1.0_f64, 2.0], vec![5.0, 6.0]]).unwrap();
    let right = crate::MdArray::from_rows(&[vec![3.0_f64, 4.0], vec![7.0, 8.0]]).unwrap();
    w.write_matrix_block("/m", &left, (0, 0)).unwrap();
    w.write_matrix_block("/m", &right, (0, 1)).unwrap();
    assert_eq!(
        file.reader().read_matrix::<f64>("/m").unwrap().to_matrix().unwrap(),
        vec![vec![1.0, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]]
    );
}

#[test]
fn test_contiguous_rewrite_flushes_only_on_buggy_binding() {
    // The 1.8.1 workaround: flush before writing into an existing
    // contiguous dataset. Quiet on any other version.
    for (version, expect_flush) in [((1, 8, 1), 1), ((1, 10, 6), 0)] {
        let binding = Arc::new(MemBinding::with_version(version));
        let file = H5File::open(binding.clone(), "ow-flush", FileOptions::truncate()).unwrap();
        let w = file.writer().unwrap();
        w.write_array("/y", &[1_i64; 100]).unwrap();
        let before = binding.flush_count();
        w.write_array("/y", &[2_i64; 100]).unwrap();
        assert_eq!(binding.flush_count() - before, expect_flush);
    }
}

#[test]
fn test_read_only_files_refuse_writers() {
    let (binding, file) = test_env("ow-ro");
    file.writer().unwrap().write_array("/d", &[1_i32]).unwrap();
    drop(file);
    let ro = reopen(&binding, "ow-ro", FileOptions::read_only());
    assert!(matches!(
        ro.writer().unwrap_err().kind(),
        ErrorKind::Io(_)
    ));
    assert_eq!(ro.reader().read_array::<i32>("/d").unwrap(), vec![1]);
    ro.flush().unwrap();
}

#[test]
fn test_delete_then_recreate() {
    let file = test_file("ow-delete");
    let w = file.writer().unwrap();
    w.write_array("/d", &[1_i32, 2]).unwrap();
    w.delete("/d").unwrap();
    assert!(!file.exists("/d").unwrap());
    assert!(matches!(
        file.reader().read_array::<i32>("/d").unwrap_err().kind(),
        ErrorKind::NoSuchObject(_)
    ));
    w.write_array("/d", &[9_i32]).unwrap();
    assert_eq!(file.reader().read_array::<i32>("/d").unwrap(), vec![9]);
}
