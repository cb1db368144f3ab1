use sediment_base::{err, ErrorKind};
use test_log::test;

use crate::arena::{with_arena, Arena};
use crate::binding::Binding;
use crate::membind::MemBinding;

#[test]
fn test_release_is_lifo_and_exactly_once() {
    let binding = MemBinding::new();
    let s1 = binding.create_simple_space(&[4], &[4]).unwrap();
    let s2 = binding.create_simple_space(&[8], &[8]).unwrap();
    let arena = Arena::new(&binding);
    arena.adopt(s1);
    arena.adopt(s2);
    arena.release().unwrap();
    // Both gone; a second release has nothing left to close.
    assert!(binding.space_dims(s1).is_err());
    assert!(binding.space_dims(s2).is_err());
    arena.release().unwrap();
}

#[test]
fn test_failing_operation_still_releases() {
    let binding = MemBinding::new();
    let s1 = binding.create_simple_space(&[4], &[4]).unwrap();
    let out: Result<(), _> = with_arena(&binding, |a| {
        a.adopt(s1);
        Err(err(ErrorKind::ShapeMismatch("forced".into())))
    });
    assert!(matches!(out.unwrap_err().kind(), ErrorKind::ShapeMismatch(_)));
    assert!(binding.space_dims(s1).is_err());
}

#[test]
fn test_release_error_surfaces_only_without_prior_error() {
    let binding = MemBinding::new();
    // A handle the binding never issued: closing it fails.
    let out = with_arena(&binding, |a| {
        a.adopt(987_654);
        Ok(())
    });
    assert!(matches!(out.unwrap_err().kind(), ErrorKind::Binding { .. }));

    // With a primary error, the close failure is logged, not returned.
    let out: Result<(), _> = with_arena(&binding, |a| {
        a.adopt(987_654);
        Err(err(ErrorKind::NoSuchObject("/gone".into())))
    });
    assert!(matches!(out.unwrap_err().kind(), ErrorKind::NoSuchObject(_)));
}

#[test]
fn test_nested_scopes() {
    let binding = MemBinding::new();
    let outer_space = binding.create_simple_space(&[2], &[2]).unwrap();
    with_arena(&binding, |outer| {
        outer.adopt(outer_space);
        let inner_space = binding.create_simple_space(&[3], &[3]).unwrap();
        with_arena(&binding, |inner| {
            inner.adopt(inner_space);
            Ok(())
        })?;
        // Inner scope closed its handle; ours is still alive.
        assert!(binding.space_dims(inner_space).is_err());
        assert!(binding.space_dims(outer_space).is_ok());
        Ok(())
    })
    .unwrap();
    assert!(binding.space_dims(outer_space).is_err());
}
