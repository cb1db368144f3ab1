// The committed-datatype registry. Each file keeps one, lazily filled:
// named types live under the reserved /__DATATYPES__ group and are
// committed once, then reused by every dataset that mentions them. The
// type-variant enumeration is special: its cardinality can differ between
// the library that wrote a file and the one reading it, so its reserved
// name is a soft link that is repointed at a freshly committed type
// whenever the cardinalities disagree.

use std::collections::HashMap;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use sediment_base::{encode_vec, err, ErrorKind, Order, Result};

use crate::binding::{Binding, Hid, TypeRef};
use crate::datatype::Datatype;
use crate::elem::{decode_disk, Decoded};

/// Reserved group for committed datatypes. Everything under it is
/// filtered from default group listings.
pub const DATATYPE_GROUP: &str = "/__DATATYPES__";

/// Attribute carrying an object's semantic annotation as an ordinal into
/// the committed type-variant enumeration.
pub const TYPE_VARIANT_ATTR: &str = "__TYPE_VARIANT__";

const VARIANT_RENAME_CAP: u32 = 1024;

/// Semantic annotations stored alongside the bit layout.
#[derive(Clone, Copy, PartialEq, Eq, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum TypeVariant {
    None = 0,
    TimestampMillisecondsSinceEpoch = 1,
    StringUtf8 = 2,
    Bitfield = 3,
}

impl TypeVariant {
    pub const NAMES: [&'static str; 4] = [
        "NONE",
        "TIMESTAMP_MILLISECONDS_SINCE_EPOCH",
        "STRING_UTF8",
        "BITFIELD",
    ];

    pub fn name(self) -> &'static str {
        Self::NAMES[i32::from(self) as usize]
    }
}

/// Attribute name carrying the variant of one compound member.
pub(crate) fn member_variant_attr(member: &str) -> String {
    format!("{TYPE_VARIANT_ATTR}{member}__")
}

pub(crate) fn enum_type_path(name: &str) -> String {
    format!("{DATATYPE_GROUP}/ENUM/{name}")
}

pub(crate) fn opaque_type_path(tag: &str) -> String {
    format!("{DATATYPE_GROUP}/OPAQUE/{tag}")
}

pub(crate) const VAR_STRING_PATH: &str = "/__DATATYPES__/STRING/VarLen";

fn variant_link_path() -> String {
    enum_type_path("TypeVariant")
}

#[derive(Default)]
pub(crate) struct Registry {
    cache: HashMap<String, Datatype>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Registry::default()
    }

    fn check_enum_values(name: &str, stored: &[String], wanted: &[String]) -> Result<()> {
        if stored.len() != wanted.len() {
            return Err(err(ErrorKind::EnumIncompatible(format!(
                "{name}: {} stored values, {} requested",
                stored.len(),
                wanted.len()
            ))));
        }
        for (i, (s, w)) in stored.iter().zip(wanted).enumerate() {
            if s != w {
                return Err(err(ErrorKind::EnumIncompatible(format!(
                    "{name}: value {i} is {s}, requested {w}"
                ))));
            }
        }
        Ok(())
    }

    /// The committed enumeration `name`, created on first use. With
    /// `check`, an existing type must list exactly `values` in order.
    pub(crate) fn committed_enum(
        &mut self,
        b: &dyn Binding,
        fh: Hid,
        name: &str,
        values: &[String],
        check: bool,
    ) -> Result<Datatype> {
        let path = enum_type_path(name);
        if let Some(ty) = self.cache.get(&path) {
            if check {
                if let Datatype::Enumeration { names, .. } = ty {
                    Self::check_enum_values(name, names, values)?;
                }
            }
            return Ok(ty.clone());
        }
        let ty = if b.exists(fh, &path)? {
            let ty = b.open_datatype(fh, &path)?;
            match &ty {
                Datatype::Enumeration { names, .. } => {
                    if check {
                        Self::check_enum_values(name, names, values)?;
                    }
                }
                _ => {
                    return Err(err(ErrorKind::TypeMismatch(format!(
                        "{path} is not an enumeration"
                    ))))
                }
            }
            ty
        } else {
            let ty = Datatype::enumeration(values.to_vec())?;
            b.commit_datatype(fh, &path, &ty)?;
            ty
        };
        self.cache.insert(path, ty.clone());
        Ok(ty)
    }

    /// The canonical boolean type: an enumeration {FALSE, TRUE} over i8.
    pub(crate) fn boolean(&mut self, b: &dyn Binding, fh: Hid) -> Result<Datatype> {
        self.committed_enum(
            b,
            fh,
            "Boolean",
            &["FALSE".to_string(), "TRUE".to_string()],
            false,
        )
    }

    /// The committed opaque type for `tag`. An existing tag must agree on
    /// the element length.
    pub(crate) fn opaque(
        &mut self,
        b: &dyn Binding,
        fh: Hid,
        tag: &str,
        len: usize,
    ) -> Result<Datatype> {
        let path = opaque_type_path(tag);
        if let Some(ty) = self.cache.get(&path) {
            if ty.size() != len {
                return Err(err(ErrorKind::TypeMismatch(format!(
                    "opaque tag {tag} committed with length {}, requested {len}",
                    ty.size()
                ))));
            }
            return Ok(ty.clone());
        }
        let ty = if b.exists(fh, &path)? {
            let ty = b.open_datatype(fh, &path)?;
            if ty.size() != len {
                return Err(err(ErrorKind::TypeMismatch(format!(
                    "opaque tag {tag} committed with length {}, requested {len}",
                    ty.size()
                ))));
            }
            ty
        } else {
            let ty = Datatype::Opaque {
                tag: tag.to_string(),
                len,
            };
            b.commit_datatype(fh, &path, &ty)?;
            ty
        };
        self.cache.insert(path, ty.clone());
        Ok(ty)
    }

    /// The variable-length string type, committed once per file.
    pub(crate) fn var_string(&mut self, b: &dyn Binding, fh: Hid) -> Result<Datatype> {
        if let Some(ty) = self.cache.get(VAR_STRING_PATH) {
            return Ok(ty.clone());
        }
        let ty = if b.exists(fh, VAR_STRING_PATH)? {
            b.open_datatype(fh, VAR_STRING_PATH)?
        } else {
            let ty = Datatype::var_string();
            b.commit_datatype(fh, VAR_STRING_PATH, &ty)?;
            ty
        };
        self.cache.insert(VAR_STRING_PATH.to_string(), ty.clone());
        Ok(ty)
    }

    /// The committed type-variant enumeration, reachable through its
    /// reserved soft link. When the committed cardinality disagrees with
    /// this library's enumeration, a fresh type is committed under
    /// `<base>.<n>` and the link repointed at it.
    pub(crate) fn variant_enum(&mut self, b: &dyn Binding, fh: Hid) -> Result<(String, Datatype)> {
        let link = variant_link_path();
        if let Some(ty) = self.cache.get(&link) {
            return Ok((link, ty.clone()));
        }
        if b.exists(fh, &link)? {
            let ty = b.open_datatype(fh, &link)?;
            if let Datatype::Enumeration { names, .. } = &ty {
                if names.len() == TypeVariant::NAMES.len() {
                    self.cache.insert(link.clone(), ty.clone());
                    return Ok((link, ty));
                }
            }
        }
        let names: Vec<String> = TypeVariant::NAMES.iter().map(|n| n.to_string()).collect();
        let ty = Datatype::enumeration(names)?;
        let mut committed_at = None;
        for n in 0..VARIANT_RENAME_CAP {
            let cand = format!("{link}.{n}");
            if !b.exists(fh, &cand)? {
                b.commit_datatype(fh, &cand, &ty)?;
                committed_at = Some(cand);
                break;
            }
        }
        let cand = committed_at.ok_or_else(|| {
            err(ErrorKind::LayoutUnsupported(format!(
                "no free type-variant name under {link} within {VARIANT_RENAME_CAP} attempts"
            )))
        })?;
        // The reserved name may hold a stale link (or an old committed
        // object); clear it before repointing.
        if b.link_info(fh, &link)?.is_some() || b.exists(fh, &link)? {
            b.delete_link(fh, &link)?;
        }
        b.create_soft_link(fh, &cand, &link)?;
        self.cache.insert(link.clone(), ty.clone());
        Ok((link, ty))
    }

    /// Stamps `path` with a type variant via the reserved attribute.
    pub(crate) fn tag_variant(
        &mut self,
        b: &dyn Binding,
        fh: Hid,
        path: &str,
        attr: &str,
        variant: TypeVariant,
    ) -> Result<()> {
        let (type_path, ty) = self.variant_enum(b, fh)?;
        let ordinal = i32::from(variant) as i64;
        let bytes = encode_ordinals(&ty, &[ordinal])?;
        if b.attr_exists(fh, path, attr)? {
            b.delete_attr(fh, path, attr)?;
        }
        b.create_attr(fh, path, attr, &TypeRef::Committed(type_path), None)?;
        b.write_attr(fh, path, attr, &bytes)
    }

    /// Reads a variant attribute back, if present and known.
    pub(crate) fn read_variant(
        b: &dyn Binding,
        fh: Hid,
        path: &str,
        attr: &str,
    ) -> Result<Option<TypeVariant>> {
        if !b.attr_exists(fh, path, attr)? {
            return Ok(None);
        }
        let ty = b.attr_type(fh, path, attr)?;
        let bytes = b.read_attr(fh, path, attr)?;
        let ordinal = match decode_disk(&ty, &bytes)? {
            Decoded::Ints(v) if !v.is_empty() => v[0],
            _ => return Ok(None),
        };
        let ordinal = match i32::try_from(ordinal) {
            Ok(o) => o,
            Err(_) => return Ok(None),
        };
        Ok(TypeVariant::try_from(ordinal).ok())
    }
}

/// Encodes one ordinal at the base width of an enumeration type.
pub(crate) fn encode_ordinals(ty: &Datatype, ordinals: &[i64]) -> Result<Vec<u8>> {
    match ty {
        Datatype::Enumeration { base, .. } => match base.size() {
            1 => Ok(encode_vec(
                &ordinals.iter().map(|o| *o as i8).collect::<Vec<_>>(),
                Order::Little,
            )),
            2 => Ok(encode_vec(
                &ordinals.iter().map(|o| *o as i16).collect::<Vec<_>>(),
                Order::Little,
            )),
            _ => Ok(encode_vec(
                &ordinals.iter().map(|o| *o as i32).collect::<Vec<_>>(),
                Order::Little,
            )),
        },
        _ => Err(err(ErrorKind::TypeMismatch(
            "ordinals need an enumeration type".into(),
        ))),
    }
}

/// Decodes ordinals stored at the base width of an enumeration type.
pub(crate) fn decode_ordinals(ty: &Datatype, bytes: &[u8]) -> Result<Vec<i64>> {
    match decode_disk(ty, bytes)? {
        Decoded::Ints(v) => Ok(v),
        Decoded::Floats(_) => Err(err(ErrorKind::TypeMismatch(
            "enumeration stored over a float base".into(),
        ))),
    }
}
