use sediment_base::ErrorKind;
use test_log::test;

use crate::arena::with_arena;
use crate::binding::{Binding, StorageLayout, TypeRef};
use crate::dataspace::{plan_block, NaturalBlocks};
use crate::datatype::Datatype;
use crate::membind::MemBinding;

#[test]
fn test_natural_blocks_1d_truncated_tail() {
    let blocks: Vec<_> = NaturalBlocks::new(vec![10], Some(vec![4])).collect();
    assert_eq!(blocks.len(), 3);
    assert_eq!(blocks[0].offset, vec![0]);
    assert_eq!(blocks[0].dims, vec![4]);
    assert_eq!(blocks[1].offset, vec![4]);
    assert_eq!(blocks[1].dims, vec![4]);
    assert_eq!(blocks[2].index, vec![2]);
    assert_eq!(blocks[2].offset, vec![8]);
    assert_eq!(blocks[2].dims, vec![2]);
}

#[test]
fn test_natural_blocks_cover_disjointly() {
    let dims = vec![5_u64, 3];
    let blocks: Vec<_> = NaturalBlocks::new(dims.clone(), Some(vec![2, 2])).collect();
    assert_eq!(blocks.len(), 6);
    // Rightmost axis varies fastest.
    assert_eq!(blocks[0].index, vec![0, 0]);
    assert_eq!(blocks[1].index, vec![0, 1]);
    assert_eq!(blocks[2].index, vec![1, 0]);
    // Every cell is covered exactly once.
    let mut seen = vec![0_u32; 15];
    for b in &blocks {
        for i in 0..b.dims[0] {
            for j in 0..b.dims[1] {
                let cell = (b.offset[0] + i) * dims[1] + b.offset[1] + j;
                seen[cell as usize] += 1;
            }
        }
    }
    assert!(seen.iter().all(|c| *c == 1));
}

#[test]
fn test_natural_blocks_rank0_and_empty() {
    let blocks: Vec<_> = NaturalBlocks::new(vec![], None).collect();
    assert_eq!(blocks.len(), 1);
    assert!(blocks[0].index.is_empty());
    assert!(blocks[0].dims.is_empty());

    let blocks: Vec<_> = NaturalBlocks::new(vec![0], Some(vec![4])).collect();
    assert!(blocks.is_empty());
}

#[test]
fn test_natural_blocks_default_chunk_is_whole_shape() {
    let blocks: Vec<_> = NaturalBlocks::new(vec![6, 2], None).collect();
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].dims, vec![6, 2]);
}

#[test]
fn test_natural_blocks_restart() {
    let mut blocks = NaturalBlocks::new(vec![10], Some(vec![4]));
    assert_eq!(blocks.block_count(), 3);
    assert_eq!(blocks.by_ref().count(), 3);
    assert!(blocks.next().is_none());
    blocks.reset();
    assert_eq!(blocks.next().map(|b| b.offset), Some(vec![0]));
}

fn fixture_1d(binding: &MemBinding, n: u64) -> crate::binding::Hid {
    let fh = binding.create_file("planner", true, false).unwrap();
    let space = binding.create_simple_space(&[n], &[n]).unwrap();
    let ds = binding
        .create_dataset(
            fh,
            "/d",
            &TypeRef::Inline(Datatype::le_int(4, true)),
            space,
            StorageLayout::Contiguous,
            None,
            None,
        )
        .unwrap();
    binding.close(space).unwrap();
    ds
}

#[test]
fn test_block_plan_clamps_to_edge() {
    let binding = MemBinding::new();
    let ds = fixture_1d(&binding, 10);
    with_arena(&binding, |a| {
        let plan = plan_block(a, ds, &[7], &[5])?;
        assert_eq!(plan.dims, vec![3]);
        assert_eq!(plan.buf_elems, 3);
        let plan = plan_block(a, ds, &[12], &[3])?;
        assert_eq!(plan.dims, vec![0]);
        Ok(())
    })
    .unwrap();
}

#[test]
fn test_block_plan_rejects_wrong_rank() {
    let binding = MemBinding::new();
    let ds = fixture_1d(&binding, 10);
    let e = with_arena(&binding, |a| plan_block(a, ds, &[0, 0], &[2, 2]).map(|_| ())).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::RankMismatch { expected: 1, .. }));
}
