use sediment_base::ErrorKind;
use test_log::test;

use crate::binding::Binding;
use crate::datatype::Datatype;
use crate::registry::{enum_type_path, TypeVariant, DATATYPE_GROUP};
use crate::test::{as_dyn, test_env};

#[test]
fn test_enum_commit_is_idempotent() {
    let (binding, file) = test_env("reg1");
    let w = file.writer().unwrap();
    let t1 = w.enum_type("Color", &["RED", "GREEN", "BLUE"], false).unwrap();
    let t2 = w.enum_type("Color", &["RED", "GREEN", "BLUE"], true).unwrap();
    assert_eq!(t1.values(), t2.values());
    assert!(file.exists(&enum_type_path("Color")).unwrap());
    // Only one committed object appeared.
    let fh = binding.create_file("reg1", false, false).unwrap();
    let members = as_dyn(&binding)
        .group_members(fh, &format!("{DATATYPE_GROUP}/ENUM"))
        .unwrap();
    assert_eq!(members, vec!["Color".to_string()]);
}

#[test]
fn test_enum_check_rejects_reordered_values() {
    let (_binding, file) = test_env("reg2");
    let w = file.writer().unwrap();
    w.enum_type("Color", &["RED", "GREEN", "BLUE"], false).unwrap();
    let e = w.enum_type("Color", &["RED", "BLUE", "GREEN"], true).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::EnumIncompatible(_)));
    let e = w.enum_type("Color", &["RED", "GREEN"], true).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::EnumIncompatible(_)));
    // Without the check, the committed values win.
    let t = w.enum_type("Color", &["RED", "BLUE", "GREEN"], false).unwrap();
    assert_eq!(t.values(), &["RED", "GREEN", "BLUE"]);
}

#[test]
fn test_boolean_type_lives_in_reserved_group() {
    let (_binding, file) = test_env("reg3");
    file.writer().unwrap().write_bool("/flag", true).unwrap();
    assert!(file.exists(&enum_type_path("Boolean")).unwrap());
    // Reserved names stay out of default listings.
    assert_eq!(file.group_members("/").unwrap(), vec!["flag".to_string()]);
    assert!(file
        .all_group_members("/")
        .unwrap()
        .contains(&"__DATATYPES__".to_string()));
}

#[test]
fn test_variant_link_created_fresh() {
    let (binding, file) = test_env("reg4");
    file.writer().unwrap().write_timestamp("/t", 1234).unwrap();
    let link = enum_type_path("TypeVariant");
    assert_eq!(
        file.link_target(&link).unwrap(),
        Some(format!("{link}.0"))
    );
    drop(binding);
}

#[test]
fn test_variant_cardinality_collision_repoints_link() {
    let (binding, file) = test_env("reg5");
    let link = enum_type_path("TypeVariant");
    // Seed a committed variant enum of the wrong cardinality, as an older
    // library would have left behind.
    {
        let b = as_dyn(&binding);
        let fh = b.create_file("reg5", false, false).unwrap();
        let old = Datatype::enumeration(vec!["NONE".into(), "OLD".into()]).unwrap();
        b.commit_datatype(fh, &format!("{link}.0"), &old).unwrap();
        b.create_soft_link(fh, &format!("{link}.0"), &link).unwrap();
        b.close(fh).unwrap();
    }
    file.writer().unwrap().write_timestamp("/t", 99).unwrap();
    // A fresh type went in at .1 and the reserved link moved.
    assert_eq!(
        file.link_target(&link).unwrap(),
        Some(format!("{link}.1"))
    );
    let b = as_dyn(&binding);
    let fh = b.create_file("reg5", false, false).unwrap();
    match b.open_datatype(fh, &link).unwrap() {
        Datatype::Enumeration { names, .. } => {
            assert_eq!(names.len(), TypeVariant::NAMES.len())
        }
        other => panic!("unexpected type {other:?}"),
    }
    assert_eq!(file.reader().read_timestamp("/t").unwrap(), 99);
}

#[test]
fn test_variant_rename_exhaustion() {
    let (binding, file) = test_env("reg6");
    let link = enum_type_path("TypeVariant");
    {
        let b = as_dyn(&binding);
        let fh = b.create_file("reg6", false, false).unwrap();
        let old = Datatype::enumeration(vec!["NONE".into(), "OLD".into()]).unwrap();
        for n in 0..1024 {
            b.commit_datatype(fh, &format!("{link}.{n}"), &old).unwrap();
        }
        b.create_soft_link(fh, &format!("{link}.0"), &link).unwrap();
        b.close(fh).unwrap();
    }
    let e = file.writer().unwrap().write_timestamp("/t", 1).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::LayoutUnsupported(_)));
}

#[test]
fn test_opaque_tag_length_conflict() {
    let (_binding, file) = test_env("reg7");
    let w = file.writer().unwrap();
    w.write_opaque("/b1", "blob", &[1, 2, 3]).unwrap();
    let e = w.write_opaque("/b2", "blob", &[1, 2, 3, 4]).unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::TypeMismatch(_)));
}

#[test]
fn test_soft_link_target_reported() {
    let (_binding, file) = test_env("reg8");
    let w = file.writer().unwrap();
    w.write_array("/data", &[1_i32, 2]).unwrap();
    w.create_soft_link("/data", "/alias").unwrap();
    assert_eq!(file.link_target("/alias").unwrap(), Some("/data".into()));
    assert_eq!(file.link_target("/data").unwrap(), None);
    match file.object_kind("/alias").unwrap() {
        crate::ObjectKind::SoftLink => {}
        other => panic!("unexpected kind {other:?}"),
    }
    // Reads resolve through the link.
    assert_eq!(file.reader().read_array::<i32>("/alias").unwrap(), vec![1, 2]);
}
