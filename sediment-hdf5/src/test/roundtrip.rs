use sediment_base::{BitField, ErrorKind};
use test_log::test;

use crate::binding::{Binding, StorageLayout, TypeRef};
use crate::compound::{AccessMode, CompoundLayout, FieldSource, FieldValue, MemberSpec, Record};
use crate::datatype::Datatype;
use crate::enums::{EnumArray, EnumType, EnumValue};
use crate::mdarray::MdArray;
use crate::members::FactoryRegistry;
use crate::test::{as_dyn, test_env, test_file};
use crate::writer::DatasetOptions;

#[test]
fn test_scalar_round_trips() {
    let file = test_file("rt-scalar");
    let w = file.writer().unwrap();
    w.write_scalar("/i", -42_i32).unwrap();
    w.write_scalar("/f", 2.75_f64).unwrap();
    let r = file.reader();
    assert_eq!(r.read_scalar::<i32>("/i").unwrap(), -42);
    assert_eq!(r.read_scalar::<f64>("/f").unwrap(), 2.75);
    // Scalars are rank 0; the 1-D surface refuses them.
    assert!(matches!(
        r.read_array::<i32>("/i").unwrap_err().kind(),
        ErrorKind::RankMismatch { expected: 1, .. }
    ));
}

#[test]
fn test_array_round_trips_every_kind() {
    let file = test_file("rt-kinds");
    let w = file.writer().unwrap();
    let r = file.reader();
    w.write_array("/i8", &[-1_i8, 0, 127]).unwrap();
    assert_eq!(r.read_array::<i8>("/i8").unwrap(), vec![-1, 0, 127]);
    w.write_array("/i16", &[-300_i16, 300]).unwrap();
    assert_eq!(r.read_array::<i16>("/i16").unwrap(), vec![-300, 300]);
    w.write_array("/i32", &[i32::MIN, i32::MAX]).unwrap();
    assert_eq!(r.read_array::<i32>("/i32").unwrap(), vec![i32::MIN, i32::MAX]);
    w.write_array("/i64", &[i64::MIN, i64::MAX]).unwrap();
    assert_eq!(r.read_array::<i64>("/i64").unwrap(), vec![i64::MIN, i64::MAX]);
    w.write_array("/f32", &[-0.5_f32, 1.25]).unwrap();
    assert_eq!(r.read_array::<f32>("/f32").unwrap(), vec![-0.5, 1.25]);
    w.write_array("/f64", &[1e-300_f64, 1e300]).unwrap();
    assert_eq!(r.read_array::<f64>("/f64").unwrap(), vec![1e-300, 1e300]);
}

#[test]
fn test_chunked_blocks_and_natural_iteration() {
    let file = test_file("rt-s1");
    let w = file.writer().unwrap();
    let data: Vec<i32> = (0..10).collect();
    w.write_array_with("/x", &data, &DatasetOptions::chunked(&[4]))
        .unwrap();
    let r = file.reader();
    assert_eq!(
        r.read_array_block_with_offset::<i32>("/x", 5, 3).unwrap(),
        vec![3, 4, 5, 6, 7]
    );
    let tiles: Vec<_> = r.natural_blocks("/x").unwrap().collect();
    assert_eq!(tiles.len(), 3);
    assert_eq!((tiles[0].offset[0], tiles[0].dims[0]), (0, 4));
    assert_eq!((tiles[1].offset[0], tiles[1].dims[0]), (4, 4));
    assert_eq!((tiles[2].offset[0], tiles[2].dims[0]), (8, 2));
    let mut streamed = Vec::new();
    for item in r.read_natural_blocks::<i32>("/x").unwrap() {
        let (_, arr) = item.unwrap();
        streamed.extend(arr.into_data());
    }
    assert_eq!(streamed, data);
}

#[test]
fn test_block_tiling_concatenates_to_full_read() {
    let file = test_file("rt-tiling");
    let data: Vec<i64> = (0..23).map(|v| v * 3).collect();
    file.writer()
        .unwrap()
        .write_array_with("/d", &data, &DatasetOptions::chunked(&[7]))
        .unwrap();
    let r = file.reader();
    let block = 4_u64;
    let blocks = (data.len() as u64 + block - 1) / block;
    let mut tiled = Vec::new();
    for i in 0..blocks {
        tiled.extend(r.read_array_block::<i64>("/d", block, i).unwrap());
    }
    assert_eq!(tiled, r.read_array::<i64>("/d").unwrap());
}

#[test]
fn test_matrix_round_trip_and_blocks() {
    let file = test_file("rt-s3");
    let m = MdArray::from_rows(&[vec![1.0_f64, 2.0], vec![3.0, 4.0]]).unwrap();
    file.writer().unwrap().write_matrix("/m", &m).unwrap();
    let r = file.reader();
    let block = r
        .read_matrix_block_with_offset::<f64>("/m", (1, 2), (1, 0))
        .unwrap();
    assert_eq!(block.to_matrix().unwrap(), vec![vec![3.0, 4.0]]);
    assert_eq!(r.read_md_array::<f64>("/m").unwrap().to_matrix().unwrap(),
        vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
    assert_eq!(r.read_matrix::<f64>("/m").unwrap(), m);
}

#[test]
fn test_md_array_block_round_trip() {
    let file = test_file("rt-md");
    let cube = MdArray::new(vec![2, 3, 4], (0..24_i32).collect()).unwrap();
    file.writer().unwrap().write_md_array("/cube", &cube).unwrap();
    let r = file.reader();
    assert_eq!(r.read_md_array::<i32>("/cube").unwrap(), cube);
    let block = r
        .read_md_block_with_offset::<i32>("/cube", &[1, 2, 2], &[1, 1, 2])
        .unwrap();
    assert_eq!(block.into_data(), vec![18, 19, 22, 23]);
    // Clamped at the edge.
    let clamped = r
        .read_md_block_with_offset::<i32>("/cube", &[5, 1, 1], &[1, 2, 3])
        .unwrap();
    assert_eq!(clamped.dims(), &[1, 1, 1]);
    assert_eq!(clamped.into_data(), vec![23]);
}

#[test]
fn test_read_into_host_array_with_offset() {
    let file = test_file("rt-host");
    file.writer()
        .unwrap()
        .write_array("/src", &[0_i32, 1, 2, 3])
        .unwrap();
    let mut host = MdArray::filled(vec![6], -1_i32).unwrap();
    file.reader()
        .read_into_md_array::<i32>("/src", &mut host, &[2], &[1], &[3])
        .unwrap();
    assert_eq!(host.data(), &[-1, -1, 1, 2, 3, -1]);
    // Host too small for the requested placement.
    let mut host = MdArray::filled(vec![3], 0_i32).unwrap();
    let e = file
        .reader()
        .read_into_md_array::<i32>("/src", &mut host, &[2], &[0], &[3])
        .unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::ShapeMismatch(_)));
}

#[test]
fn test_width_conversion_on_read_and_rewrite() {
    let file = test_file("rt-widths");
    let w = file.writer().unwrap();
    let r = file.reader();
    w.write_array("/v", &[-5_i16, 1000]).unwrap();
    // Widening read.
    assert_eq!(r.read_array::<i64>("/v").unwrap(), vec![-5, 1000]);
    // Rewriting through the stored narrower type truncates, as the
    // native conversion path does.
    w.write_array("/v", &[70_000_i32, 2]).unwrap();
    assert_eq!(r.read_array::<i16>("/v").unwrap(), vec![70_000_i32 as i16, 2]);
    // Crossing the integer/float divide is refused.
    w.write_array("/f", &[1.5_f64]).unwrap();
    assert!(matches!(
        r.read_array::<i32>("/f").unwrap_err().kind(),
        ErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_fixed_and_variable_strings() {
    let file = test_file("rt-strings");
    let w = file.writer().unwrap();
    let r = file.reader();
    w.write_string("/s", "hello").unwrap();
    assert_eq!(r.read_string("/s").unwrap(), "hello");
    w.write_string_fixed("/clip", "abcdef", 4).unwrap();
    assert_eq!(r.read_string("/clip").unwrap(), "abcd");
    w.write_string_array("/sa", &["a", "bcd", ""]).unwrap();
    assert_eq!(
        r.read_string_array("/sa").unwrap(),
        vec!["a".to_string(), "bcd".into(), "".into()]
    );
    w.write_string_var("/vs", "variable length").unwrap();
    assert_eq!(r.read_string("/vs").unwrap(), "variable length");
    w.write_string_array_var("/vsa", &["x", "yz"]).unwrap();
    assert_eq!(
        r.read_string_array("/vsa").unwrap(),
        vec!["x".to_string(), "yz".into()]
    );
}

#[test]
fn test_booleans() {
    let file = test_file("rt-bool");
    let w = file.writer().unwrap();
    w.write_bool("/yes", true).unwrap();
    w.write_bool("/no", false).unwrap();
    let r = file.reader();
    assert!(r.read_bool("/yes").unwrap());
    assert!(!r.read_bool("/no").unwrap());
    // Booleans are stored as the committed enum; ordinals read back too.
    assert_eq!(r.read_enum_as_string("/yes").unwrap(), "TRUE");
}

#[test]
fn test_bitfields() {
    let file = test_file("rt-bits");
    let w = file.writer().unwrap();
    let r = file.reader();
    let bf = BitField::from_bits(&[0, 5, 64]);
    w.write_bitfield("/bits", &bf).unwrap();
    assert_eq!(r.read_bitfield("/bits").unwrap(), bf);
    let rows = vec![
        BitField::from_bits(&[0]),
        BitField::from_bits(&[70]),
        BitField::new(),
    ];
    w.write_bitfield_array("/table", &rows).unwrap();
    assert_eq!(r.read_bitfield_array("/table").unwrap(), rows);
}

#[test]
fn test_enums_end_to_end() {
    let file = test_file("rt-enum");
    let w = file.writer().unwrap();
    let r = file.reader();
    let color = EnumType::new("Color", &["RED", "GREEN", "BLUE"]).unwrap();
    w.write_enum("/c", &EnumValue::from_name(color.clone(), "GREEN").unwrap())
        .unwrap();
    assert_eq!(r.read_enum("/c").unwrap().ordinal(), 1);
    assert_eq!(r.read_enum_as_string("/c").unwrap(), "GREEN");
    // Ordinals widen onto the numeric surface.
    assert_eq!(r.read_scalar::<i32>("/c").unwrap(), 1);

    let arr = EnumArray::from_names(color, vec![4], &["BLUE", "RED", "RED", "GREEN"]).unwrap();
    w.write_enum_array("/ca", &arr).unwrap();
    let back = r.read_enum_array("/ca").unwrap();
    assert_eq!(back.names(), vec!["BLUE", "RED", "RED", "GREEN"]);
    assert_eq!(back.ty().name(), "Color");
    assert_eq!(back.storage_width(), 1);
}

#[test]
fn test_wide_enum_storage_on_disk() {
    let file = test_file("rt-enum-wide");
    let names: Vec<String> = (0..200).map(|i| format!("V{i}")).collect();
    let refs: Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    let ty = EnumType::new("Wide", &refs).unwrap();
    let arr = EnumArray::from_ordinals(ty, vec![2], &[0, 199]).unwrap();
    file.writer().unwrap().write_enum_array("/w", &arr).unwrap();
    let back = file.reader().read_enum_array("/w").unwrap();
    assert_eq!(back.storage_width(), 2);
    assert_eq!(back.ordinals(), vec![0, 199]);
}

#[test]
fn test_opaque_round_trip() {
    let file = test_file("rt-opaque");
    file.writer()
        .unwrap()
        .write_opaque("/blob", "jpeg-thumbnail", &[0xde, 0xad, 0xbe, 0xef])
        .unwrap();
    let (tag, bytes) = file.reader().read_opaque("/blob").unwrap();
    assert_eq!(tag, "jpeg-thumbnail");
    assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef]);
}

#[derive(Debug, Default, PartialEq)]
struct Row {
    id: i32,
    name: String,
}

impl FieldSource for Row {
    fn get_field(&self, name: &str) -> Option<FieldValue> {
        match name {
            "id" => Some(FieldValue::Int32(self.id)),
            "name" => Some(FieldValue::Text(self.name.clone())),
            _ => None,
        }
    }

    fn set_field(&mut self, name: &str, val: FieldValue) -> bool {
        match (name, val) {
            ("id", FieldValue::Int32(v)) => {
                self.id = v;
                true
            }
            ("name", FieldValue::Text(v)) => {
                self.name = v;
                true
            }
            _ => false,
        }
    }
}

#[test]
fn test_compound_records_end_to_end() {
    let file = test_file("rt-compound");
    let specs = vec![
        MemberSpec::int32("id"),
        MemberSpec::string("name", 16),
        MemberSpec::timestamp("ts"),
    ];
    let layout =
        CompoundLayout::build(&FactoryRegistry::standard(), &specs, AccessMode::Map).unwrap();
    let recs = vec![
        Record::mapped()
            .with("id", FieldValue::Int32(1))
            .with("name", FieldValue::Text("alpha".into()))
            .with("ts", FieldValue::Time(1000)),
        Record::mapped()
            .with("id", FieldValue::Int32(2))
            .with("name", FieldValue::Text("beta".into()))
            .with("ts", FieldValue::Time(2000)),
    ];
    file.writer()
        .unwrap()
        .write_compound("/recs", &layout, &recs)
        .unwrap();

    let back = file.reader().read_compound("/recs").unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back[0].field("id"), Some(FieldValue::Int32(1)));
    assert_eq!(back[1].field("name"), Some(FieldValue::Text("beta".into())));
    // The ts member came back as a timestamp because its variant tag
    // survived the file.
    assert_eq!(back[1].field("ts"), Some(FieldValue::Time(2000)));

    let rows: Vec<Row> = file
        .reader()
        .read_compound_into("/recs", Row::default)
        .unwrap();
    assert_eq!(
        rows,
        vec![
            Row {
                id: 1,
                name: "alpha".into()
            },
            Row {
                id: 2,
                name: "beta".into()
            }
        ]
    );
}

#[test]
fn test_timestamps() {
    let file = test_file("rt-time");
    let w = file.writer().unwrap();
    let r = file.reader();
    w.write_timestamp("/t", 1_700_000_000_123).unwrap();
    assert_eq!(r.read_timestamp("/t").unwrap(), 1_700_000_000_123);
    w.write_timestamp_array("/ta", &[1, 2, 3]).unwrap();
    assert_eq!(r.read_timestamp_array("/ta").unwrap(), vec![1, 2, 3]);
    // A plain i64 is not a timestamp.
    w.write_scalar("/plain", 9_i64).unwrap();
    assert!(matches!(
        r.read_timestamp("/plain").unwrap_err().kind(),
        ErrorKind::TypeMismatch(_)
    ));
}

#[test]
fn test_object_references() {
    let file = test_file("rt-ref");
    let w = file.writer().unwrap();
    let r = file.reader();
    w.write_array("/data", &[1_i32, 2, 3]).unwrap();
    w.write_reference("/r", "/data").unwrap();
    assert_eq!(r.read_reference("/r", true).unwrap(), "/data");
    let encoded = r.read_reference("/r", false).unwrap();
    assert!(encoded.starts_with('\0'));
    assert!(encoded[1..].chars().all(|c| c.is_ascii_digit()));
    // Wrong kinds and missing targets fail typed.
    assert!(matches!(
        r.read_reference("/data", true).unwrap_err().kind(),
        ErrorKind::NotAReference(_)
    ));
    assert!(matches!(
        w.write_reference("/r2", "/missing").unwrap_err().kind(),
        ErrorKind::NoSuchObject(_)
    ));
}

#[test]
fn test_attributes() {
    let file = test_file("rt-attr");
    let w = file.writer().unwrap();
    let r = file.reader();
    w.write_array("/d", &[1_i32]).unwrap();
    w.set_attr("/d", "count", 7_i32).unwrap();
    assert_eq!(r.get_attr::<i32>("/d", "count").unwrap(), 7);
    // Widening read of an attribute.
    assert_eq!(r.get_attr::<i64>("/d", "count").unwrap(), 7);
    // Idempotent add: same shape overwrites, new type recreates.
    w.set_attr("/d", "count", 8_i32).unwrap();
    assert_eq!(r.get_attr::<i32>("/d", "count").unwrap(), 8);
    w.set_attr("/d", "count", 2.5_f64).unwrap();
    assert_eq!(r.get_attr::<f64>("/d", "count").unwrap(), 2.5);
    w.set_attr_array("/d", "dims", &[4_i64, 2]).unwrap();
    assert_eq!(r.get_attr_array::<i64>("/d", "dims").unwrap(), vec![4, 2]);
    w.set_string_attr("/d", "unit", "meters").unwrap();
    assert_eq!(r.get_string_attr("/d", "unit").unwrap(), "meters");
    assert!(r.attr_exists("/d", "unit").unwrap());
    w.delete_attr("/d", "unit").unwrap();
    assert!(!r.attr_exists("/d", "unit").unwrap());
    // Attributes need an existing object.
    assert!(matches!(
        w.set_attr("/nope", "a", 1_i32).unwrap_err().kind(),
        ErrorKind::NoSuchObject(_)
    ));
}

#[test]
fn test_bool_and_enum_attributes() {
    let file = test_file("rt-attr-kinds");
    let w = file.writer().unwrap();
    let r = file.reader();
    w.create_group("/g").unwrap();
    w.set_bool_attr("/g", "active", true).unwrap();
    assert!(r.get_bool_attr("/g", "active").unwrap());
    w.set_bool_attr("/g", "active", false).unwrap();
    assert!(!r.get_bool_attr("/g", "active").unwrap());
    let color = EnumType::new("Color", &["RED", "GREEN", "BLUE"]).unwrap();
    w.set_enum_attr("/g", "hue", &EnumValue::from_name(color, "BLUE").unwrap())
        .unwrap();
    let hue = r.get_enum_attr("/g", "hue").unwrap();
    assert_eq!(hue.ordinal(), 2);
    assert_eq!(hue.as_str(), "BLUE");
}

#[test]
fn test_reserved_attr_names_filtered() {
    let file = test_file("rt-attr-names");
    let w = file.writer().unwrap();
    w.write_timestamp("/t", 5).unwrap();
    w.set_attr("/t", "visible", 1_i32).unwrap();
    assert_eq!(file.reader().attr_names("/t").unwrap(), vec!["visible"]);
}

#[test]
fn test_groups_and_kinds() {
    let file = test_file("rt-groups");
    let w = file.writer().unwrap();
    w.create_group("/a/b/c").unwrap();
    w.write_array("/a/d", &[1_i32]).unwrap();
    assert_eq!(file.object_kind("/a").unwrap(), crate::ObjectKind::Group);
    assert_eq!(file.object_kind("/a/d").unwrap(), crate::ObjectKind::Dataset);
    let mut members = file.group_members("/a").unwrap();
    members.sort();
    assert_eq!(members, vec!["b".to_string(), "d".into()]);
    assert!(matches!(
        file.group_members("/a/d").unwrap_err().kind(),
        ErrorKind::NotAGroup(_)
    ));
    assert!(matches!(
        file.reader().read_array::<i32>("/a/b").unwrap_err().kind(),
        ErrorKind::NotADataset(_)
    ));
    assert!(matches!(
        file.reader().read_array::<i32>("/gone").unwrap_err().kind(),
        ErrorKind::NoSuchObject(_)
    ));
}

#[test]
fn test_external_links() {
    let (binding, file) = test_env("rt-ext-main");
    // Content in a second file served by the same binding.
    {
        let other = crate::H5File::open(
            binding.clone(),
            "rt-ext-other",
            crate::FileOptions::truncate(),
        )
        .unwrap();
        other
            .writer()
            .unwrap()
            .write_array("/payload", &[5_i32, 6])
            .unwrap();
    }
    // Plain files cannot hold external links.
    let e = file
        .writer()
        .unwrap()
        .create_external_link("rt-ext-other", "/payload", "/ext")
        .unwrap_err();
    assert!(matches!(e.kind(), ErrorKind::LayoutUnsupported(_)));

    let latest = crate::H5File::open(
        binding.clone(),
        "rt-ext-latest",
        crate::FileOptions {
            mode: crate::FileMode::Truncate,
            ..Default::default()
        }
        .with_latest_format(),
    )
    .unwrap();
    latest
        .writer()
        .unwrap()
        .create_external_link("rt-ext-other", "/payload", "/ext")
        .unwrap();
    assert_eq!(
        latest.link_target("/ext").unwrap(),
        Some("EXTERNAL::rt-ext-other::/payload".to_string())
    );
    assert_eq!(
        latest.reader().read_array::<i32>("/ext").unwrap(),
        vec![5, 6]
    );
}

#[test]
fn test_array_type_shape_reinterpretation() {
    let (binding, file) = test_env("rt-arrty");
    // A scalar dataspace holding an array type: the other on-disk
    // spelling of a 2x3 matrix. The writer never produces it, so build
    // it through the binding.
    {
        let b = as_dyn(&binding);
        let fh = b.create_file("rt-arrty", false, false).unwrap();
        let ty = Datatype::array(Datatype::le_int(4, true), vec![2, 3]).unwrap();
        let space = b.create_scalar_space().unwrap();
        let ds = b
            .create_dataset(
                fh,
                "/packed",
                &TypeRef::Inline(ty),
                space,
                StorageLayout::Compact,
                None,
                None,
            )
            .unwrap();
        let mem = b.create_scalar_space().unwrap();
        let fsp = b.dataset_space(ds).unwrap();
        let mut bytes = Vec::new();
        for v in [10_i32, 11, 12, 13, 14, 15] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        b.write_dataset(ds, mem, fsp, &bytes).unwrap();
        for h in [mem, fsp, ds, space] {
            b.close(h).unwrap();
        }
        b.close(fh).unwrap();
    }
    let arr = file.reader().read_md_array::<i32>("/packed").unwrap();
    assert_eq!(arr.dims(), &[2, 3]);
    assert_eq!(arr.data(), &[10, 11, 12, 13, 14, 15]);
    // The scalar surface sees rank 2, not a scalar.
    assert!(matches!(
        file.reader().read_scalar::<i32>("/packed").unwrap_err().kind(),
        ErrorKind::RankMismatch { .. }
    ));
}
