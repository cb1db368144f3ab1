// An in-memory implementation of the binding seam. It keeps whole files
// as path-keyed object trees and implements hyperslab transfer by
// elementwise scatter/gather between selections. The test suite runs
// against it; it is not an HDF5 file format implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use sediment_base::{err, ErrorKind, Result};

use crate::binding::{Binding, Hid, LinkTarget, ObjectKind, StorageLayout, TypeRef};
use crate::datatype::{Datatype, UNLIMITED};

type Attrs = BTreeMap<String, AttrVal>;

#[derive(Clone)]
struct AttrVal {
    ty: Datatype,
    dims: Option<Vec<u64>>,
    data: Vec<u8>,
}

#[derive(Clone)]
struct DsNode {
    ty: Datatype,
    committed: Option<String>,
    dims: Vec<u64>,
    max_dims: Vec<u64>,
    layout: StorageLayout,
    chunk: Option<Vec<u64>>,
    #[allow(dead_code)] // recorded; the filter itself runs below this seam
    deflate: Option<u8>,
    data: Vec<u8>,
    strs: Option<Vec<String>>,
    attrs: Attrs,
    addr: u64,
}

#[derive(Clone)]
enum Node {
    Group { attrs: Attrs, addr: u64 },
    Dataset(Box<DsNode>),
    Committed { ty: Datatype, attrs: Attrs, addr: u64 },
    SoftLink { target: String },
    ExternalLink { file: String, path: String },
}

impl Node {
    fn attrs_mut(&mut self) -> Option<&mut Attrs> {
        match self {
            Node::Group { attrs, .. } => Some(attrs),
            Node::Dataset(ds) => Some(&mut ds.attrs),
            Node::Committed { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    fn attrs(&self) -> Option<&Attrs> {
        match self {
            Node::Group { attrs, .. } => Some(attrs),
            Node::Dataset(ds) => Some(&ds.attrs),
            Node::Committed { attrs, .. } => Some(attrs),
            _ => None,
        }
    }

    fn addr(&self) -> Option<u64> {
        match self {
            Node::Group { addr, .. } => Some(*addr),
            Node::Dataset(ds) => Some(ds.addr),
            Node::Committed { addr, .. } => Some(*addr),
            _ => None,
        }
    }
}

struct FileStore {
    nodes: BTreeMap<String, Node>,
    addrs: HashMap<u64, String>,
    next_addr: u64,
    #[allow(dead_code)] // recorded; only the format writer below us cares
    latest_format: bool,
}

impl FileStore {
    fn new(latest_format: bool) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert(
            "/".to_string(),
            Node::Group {
                attrs: Attrs::new(),
                addr: 1,
            },
        );
        let mut addrs = HashMap::new();
        addrs.insert(1, "/".to_string());
        FileStore {
            nodes,
            addrs,
            next_addr: 2,
            latest_format,
        }
    }

    fn alloc_addr(&mut self, path: &str) -> u64 {
        let addr = self.next_addr;
        self.next_addr += 1;
        self.addrs.insert(addr, path.to_string());
        addr
    }

    fn ensure_parents(&mut self, path: &str) -> Result<()> {
        let mut at = String::new();
        let parent = match path.rsplit_once('/') {
            Some((p, _)) => p,
            None => return Err(err(ErrorKind::NoSuchObject(path.to_string()))),
        };
        if parent.is_empty() {
            return Ok(());
        }
        for comp in parent.split('/').skip(1) {
            at.push('/');
            at.push_str(comp);
            match self.nodes.get(&at) {
                None => {
                    let addr = self.alloc_addr(&at);
                    self.nodes.insert(
                        at.clone(),
                        Node::Group {
                            attrs: Attrs::new(),
                            addr,
                        },
                    );
                }
                Some(Node::Group { .. }) => {}
                Some(_) => return Err(err(ErrorKind::NotAGroup(at.clone()))),
            }
        }
        Ok(())
    }

    fn remove_subtree(&mut self, path: &str) {
        let prefix = format!("{}/", path);
        let doomed: Vec<String> = self
            .nodes
            .keys()
            .filter(|k| *k == path || k.starts_with(&prefix))
            .cloned()
            .collect();
        for k in doomed {
            if let Some(node) = self.nodes.remove(&k) {
                if let Some(addr) = node.addr() {
                    self.addrs.remove(&addr);
                }
            }
        }
    }
}

#[derive(Clone)]
struct SpaceDef {
    dims: Vec<u64>,
    max_dims: Vec<u64>,
    sel: Option<(Vec<u64>, Vec<u64>)>,
}

impl SpaceDef {
    fn total(&self) -> usize {
        self.dims.iter().map(|d| *d as usize).product()
    }

    // Flat row-major element offsets of the selection within the extent.
    fn offsets(&self) -> Vec<usize> {
        let (start, count) = match &self.sel {
            None => return (0..self.total()).collect(),
            Some((s, c)) => (s, c),
        };
        let rank = self.dims.len();
        let n: usize = count.iter().map(|c| *c as usize).product();
        let mut out = Vec::with_capacity(n);
        if n == 0 {
            return out;
        }
        let mut idx = vec![0_u64; rank];
        loop {
            let mut flat = 0_usize;
            for k in 0..rank {
                flat = flat * self.dims[k] as usize + (start[k] + idx[k]) as usize;
            }
            out.push(flat);
            let mut k = rank;
            loop {
                if k == 0 {
                    return out;
                }
                k -= 1;
                idx[k] += 1;
                if idx[k] < count[k] {
                    break;
                }
                idx[k] = 0;
            }
        }
    }
}

struct OpenFile {
    name: String,
    read_only: bool,
}

struct DsHandle {
    file: String,
    path: String,
}

#[derive(Default)]
struct State {
    next_hid: Hid,
    files: HashMap<String, FileStore>,
    open_files: HashMap<Hid, OpenFile>,
    spaces: HashMap<Hid, SpaceDef>,
    datasets: HashMap<Hid, DsHandle>,
    flushes: u64,
}

impl State {
    fn alloc_hid(&mut self) -> Hid {
        self.next_hid += 1;
        self.next_hid + 0x1000
    }

    fn file_of(&self, fh: Hid) -> Result<&OpenFile> {
        self.open_files
            .get(&fh)
            .ok_or_else(|| binding_err("unknown file handle"))
    }

    fn writable_file_of(&self, fh: Hid) -> Result<String> {
        let open = self.file_of(fh)?;
        if open.read_only {
            return Err(binding_err("file is open read-only"));
        }
        Ok(open.name.clone())
    }

    // Follows soft and external links to the final (file, path).
    fn resolve(&self, file: &str, path: &str) -> Result<(String, String)> {
        let mut file = file.to_string();
        let mut path = path.to_string();
        for _ in 0..16 {
            let store = self
                .files
                .get(&file)
                .ok_or_else(|| err(ErrorKind::NoSuchObject(file.clone())))?;
            match store.nodes.get(&path) {
                Some(Node::SoftLink { target }) => path = target.clone(),
                Some(Node::ExternalLink { file: f, path: p }) => {
                    file = f.clone();
                    path = p.clone();
                }
                _ => return Ok((file, path)),
            }
        }
        Err(err(ErrorKind::NoSuchObject(format!("link loop at {path}"))))
    }

    fn node(&self, file: &str, path: &str) -> Result<&Node> {
        let store = self
            .files
            .get(file)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(file.to_string())))?;
        store
            .nodes
            .get(path)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(path.to_string())))
    }

    fn resolved_node(&self, fh: Hid, path: &str) -> Result<(&Node, String, String)> {
        let name = self.file_of(fh)?.name.clone();
        let (file, path) = self.resolve(&name, path)?;
        let node = self.node(&file, &path)?;
        Ok((node, file, path))
    }

    fn space(&self, h: Hid) -> Result<&SpaceDef> {
        self.spaces
            .get(&h)
            .ok_or_else(|| binding_err("unknown dataspace handle"))
    }

    fn ds_node(&self, ds: Hid) -> Result<&DsNode> {
        let handle = self
            .datasets
            .get(&ds)
            .ok_or_else(|| binding_err("unknown dataset handle"))?;
        match self.node(&handle.file, &handle.path)? {
            Node::Dataset(node) => Ok(node.as_ref()),
            _ => Err(err(ErrorKind::NotADataset(handle.path.clone()))),
        }
    }

    fn ds_node_mut(&mut self, ds: Hid) -> Result<&mut DsNode> {
        let handle = self
            .datasets
            .get(&ds)
            .ok_or_else(|| binding_err("unknown dataset handle"))?;
        let file = handle.file.clone();
        let path = handle.path.clone();
        let store = self
            .files
            .get_mut(&file)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(file.clone())))?;
        match store.nodes.get_mut(&path) {
            Some(Node::Dataset(node)) => Ok(node.as_mut()),
            Some(_) => Err(err(ErrorKind::NotADataset(path))),
            None => Err(err(ErrorKind::NoSuchObject(path))),
        }
    }
}

fn binding_err(msg: &str) -> sediment_base::Error {
    err(ErrorKind::Binding {
        major: 0,
        minor: 0,
        message: msg.to_string(),
    })
}

fn resolve_type(state: &State, file: &str, ty: &TypeRef) -> Result<(Datatype, Option<String>)> {
    match ty {
        TypeRef::Inline(t) => Ok((t.clone(), None)),
        TypeRef::Committed(path) => {
            let (file, path) = state.resolve(file, path)?;
            match state.node(&file, &path)? {
                Node::Committed { ty, .. } => Ok((ty.clone(), Some(path))),
                _ => Err(err(ErrorKind::TypeMismatch(format!(
                    "{path} is not a committed datatype"
                )))),
            }
        }
    }
}

/// The in-memory binding.
pub struct MemBinding {
    state: Mutex<State>,
    version: (u32, u32, u32),
}

impl Default for MemBinding {
    fn default() -> Self {
        MemBinding::new()
    }
}

impl MemBinding {
    pub fn new() -> Self {
        MemBinding::with_version((1, 10, 6))
    }

    /// A binding reporting a specific library version, for exercising
    /// version-conditional behavior.
    pub fn with_version(version: (u32, u32, u32)) -> Self {
        MemBinding {
            state: Mutex::new(State::default()),
            version,
        }
    }

    /// Number of file-level flushes issued so far.
    pub fn flush_count(&self) -> u64 {
        self.state().flushes
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Binding for MemBinding {
    fn version(&self) -> (u32, u32, u32) {
        self.version
    }

    fn create_file(&self, name: &str, truncate: bool, latest_format: bool) -> Result<Hid> {
        let mut st = self.state();
        if truncate || !st.files.contains_key(name) {
            st.files
                .insert(name.to_string(), FileStore::new(latest_format));
        }
        let h = st.alloc_hid();
        st.open_files.insert(
            h,
            OpenFile {
                name: name.to_string(),
                read_only: false,
            },
        );
        Ok(h)
    }

    fn open_file(&self, name: &str, read_only: bool) -> Result<Hid> {
        let mut st = self.state();
        if !st.files.contains_key(name) {
            return Err(err(ErrorKind::NoSuchObject(name.to_string())));
        }
        let h = st.alloc_hid();
        st.open_files.insert(
            h,
            OpenFile {
                name: name.to_string(),
                read_only,
            },
        );
        Ok(h)
    }

    fn flush_file(&self, file: Hid) -> Result<()> {
        let mut st = self.state();
        st.file_of(file)?;
        st.flushes += 1;
        Ok(())
    }

    fn close(&self, handle: Hid) -> Result<()> {
        let mut st = self.state();
        if st.open_files.remove(&handle).is_some()
            || st.spaces.remove(&handle).is_some()
            || st.datasets.remove(&handle).is_some()
        {
            Ok(())
        } else {
            Err(binding_err("close of unknown handle"))
        }
    }

    fn exists(&self, file: Hid, path: &str) -> Result<bool> {
        let st = self.state();
        let name = st.file_of(file)?.name.clone();
        match st.resolve(&name, path) {
            Ok((f, p)) => Ok(st
                .files
                .get(&f)
                .map(|store| store.nodes.contains_key(&p))
                .unwrap_or(false)),
            Err(_) => Ok(false),
        }
    }

    fn object_kind(&self, file: Hid, path: &str) -> Result<ObjectKind> {
        let st = self.state();
        let name = st.file_of(file)?.name.clone();
        match st.node(&name, path)? {
            Node::Group { .. } => Ok(ObjectKind::Group),
            Node::Dataset(_) => Ok(ObjectKind::Dataset),
            Node::Committed { .. } => Ok(ObjectKind::Datatype),
            Node::SoftLink { .. } => Ok(ObjectKind::SoftLink),
            Node::ExternalLink { .. } => Ok(ObjectKind::ExternalLink),
        }
    }

    fn create_group(&self, file: Hid, path: &str) -> Result<()> {
        let mut st = self.state();
        let name = st.writable_file_of(file)?;
        let store = st
            .files
            .get_mut(&name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(name.clone())))?;
        store.ensure_parents(path)?;
        match store.nodes.get(path) {
            Some(Node::Group { .. }) => Ok(()),
            Some(_) => Err(err(ErrorKind::NotAGroup(path.to_string()))),
            None => {
                let addr = store.alloc_addr(path);
                store.nodes.insert(
                    path.to_string(),
                    Node::Group {
                        attrs: Attrs::new(),
                        addr,
                    },
                );
                Ok(())
            }
        }
    }

    fn group_members(&self, file: Hid, path: &str) -> Result<Vec<String>> {
        let st = self.state();
        let (node, f, p) = st.resolved_node(file, path)?;
        if !matches!(node, Node::Group { .. }) {
            return Err(err(ErrorKind::NotAGroup(p)));
        }
        let store = st
            .files
            .get(&f)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(f.clone())))?;
        let prefix = if p == "/" { "/".to_string() } else { format!("{p}/") };
        let mut out = Vec::new();
        for k in store.nodes.keys() {
            if let Some(rest) = k.strip_prefix(&prefix) {
                if !rest.is_empty() && !rest.contains('/') {
                    out.push(rest.to_string());
                }
            }
        }
        Ok(out)
    }

    fn delete_link(&self, file: Hid, path: &str) -> Result<()> {
        let mut st = self.state();
        let name = st.writable_file_of(file)?;
        let store = st
            .files
            .get_mut(&name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(name.clone())))?;
        if path == "/" || !store.nodes.contains_key(path) {
            return Err(err(ErrorKind::NoSuchObject(path.to_string())));
        }
        store.remove_subtree(path);
        Ok(())
    }

    fn create_soft_link(&self, file: Hid, target: &str, link_path: &str) -> Result<()> {
        let mut st = self.state();
        let name = st.writable_file_of(file)?;
        let store = st
            .files
            .get_mut(&name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(name.clone())))?;
        store.ensure_parents(link_path)?;
        if store.nodes.contains_key(link_path) {
            return Err(binding_err("link path already in use"));
        }
        store.nodes.insert(
            link_path.to_string(),
            Node::SoftLink {
                target: target.to_string(),
            },
        );
        Ok(())
    }

    fn create_external_link(
        &self,
        file: Hid,
        target_file: &str,
        target_path: &str,
        link_path: &str,
    ) -> Result<()> {
        let mut st = self.state();
        let name = st.writable_file_of(file)?;
        let store = st
            .files
            .get_mut(&name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(name.clone())))?;
        store.ensure_parents(link_path)?;
        if store.nodes.contains_key(link_path) {
            return Err(binding_err("link path already in use"));
        }
        store.nodes.insert(
            link_path.to_string(),
            Node::ExternalLink {
                file: target_file.to_string(),
                path: target_path.to_string(),
            },
        );
        Ok(())
    }

    fn link_info(&self, file: Hid, path: &str) -> Result<Option<LinkTarget>> {
        let st = self.state();
        let name = st.file_of(file)?.name.clone();
        match st.node(&name, path) {
            Ok(Node::SoftLink { target }) => Ok(Some(LinkTarget::Soft(target.clone()))),
            Ok(Node::ExternalLink { file, path }) => Ok(Some(LinkTarget::External {
                file: file.clone(),
                path: path.clone(),
            })),
            // No link (or nothing at all) at this path.
            _ => Ok(None),
        }
    }

    fn object_address(&self, file: Hid, path: &str) -> Result<u64> {
        let st = self.state();
        let (node, _, p) = st.resolved_node(file, path)?;
        node.addr()
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p)))
    }

    fn path_at_address(&self, file: Hid, address: u64) -> Result<Option<String>> {
        let st = self.state();
        let name = st.file_of(file)?.name.clone();
        let store = st
            .files
            .get(&name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(name.clone())))?;
        Ok(store.addrs.get(&address).cloned())
    }

    fn create_scalar_space(&self) -> Result<Hid> {
        let mut st = self.state();
        let h = st.alloc_hid();
        st.spaces.insert(
            h,
            SpaceDef {
                dims: Vec::new(),
                max_dims: Vec::new(),
                sel: None,
            },
        );
        Ok(h)
    }

    fn create_simple_space(&self, dims: &[u64], max_dims: &[u64]) -> Result<Hid> {
        if dims.len() != max_dims.len() {
            return Err(err(ErrorKind::RankMismatch {
                expected: dims.len(),
                actual: max_dims.len(),
            }));
        }
        let mut st = self.state();
        let h = st.alloc_hid();
        st.spaces.insert(
            h,
            SpaceDef {
                dims: dims.to_vec(),
                max_dims: max_dims.to_vec(),
                sel: None,
            },
        );
        Ok(h)
    }

    fn select_hyperslab(&self, space: Hid, start: &[u64], count: &[u64]) -> Result<()> {
        let mut st = self.state();
        let def = st
            .spaces
            .get_mut(&space)
            .ok_or_else(|| binding_err("unknown dataspace handle"))?;
        let rank = def.dims.len();
        if start.len() != rank || count.len() != rank {
            return Err(err(ErrorKind::RankMismatch {
                expected: rank,
                actual: start.len().max(count.len()),
            }));
        }
        for k in 0..rank {
            if start[k] + count[k] > def.dims[k] {
                return Err(err(ErrorKind::ShapeMismatch(format!(
                    "selection [{}, {}) outside extent {} on axis {}",
                    start[k],
                    start[k] + count[k],
                    def.dims[k],
                    k
                ))));
            }
        }
        def.sel = Some((start.to_vec(), count.to_vec()));
        Ok(())
    }

    fn space_dims(&self, space: Hid) -> Result<(Vec<u64>, Vec<u64>)> {
        let st = self.state();
        let def = st.space(space)?;
        Ok((def.dims.clone(), def.max_dims.clone()))
    }

    fn commit_datatype(&self, file: Hid, path: &str, ty: &Datatype) -> Result<()> {
        let mut st = self.state();
        let name = st.writable_file_of(file)?;
        let store = st
            .files
            .get_mut(&name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(name.clone())))?;
        store.ensure_parents(path)?;
        if store.nodes.contains_key(path) {
            return Err(binding_err("datatype path already in use"));
        }
        let addr = store.alloc_addr(path);
        store.nodes.insert(
            path.to_string(),
            Node::Committed {
                ty: ty.clone(),
                attrs: Attrs::new(),
                addr,
            },
        );
        Ok(())
    }

    fn open_datatype(&self, file: Hid, path: &str) -> Result<Datatype> {
        let st = self.state();
        let (node, _, p) = st.resolved_node(file, path)?;
        match node {
            Node::Committed { ty, .. } => Ok(ty.clone()),
            _ => Err(err(ErrorKind::TypeMismatch(format!(
                "{p} is not a committed datatype"
            )))),
        }
    }

    fn create_dataset(
        &self,
        file: Hid,
        path: &str,
        ty: &TypeRef,
        space: Hid,
        layout: StorageLayout,
        chunk: Option<&[u64]>,
        deflate: Option<u8>,
    ) -> Result<Hid> {
        let mut st = self.state();
        let name = st.writable_file_of(file)?;
        let (dt, committed) = resolve_type(&st, &name, ty)?;
        let def = st.space(space)?.clone();
        let total = def.total();
        let strs = matches!(dt, Datatype::VariableString { .. })
            .then(|| vec![String::new(); total]);
        let data = vec![0_u8; dt.size() * total];
        let store = st
            .files
            .get_mut(&name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(name.clone())))?;
        store.ensure_parents(path)?;
        if store.nodes.contains_key(path) {
            return Err(binding_err("dataset path already in use"));
        }
        let addr = store.alloc_addr(path);
        store.nodes.insert(
            path.to_string(),
            Node::Dataset(Box::new(DsNode {
                ty: dt,
                committed,
                dims: def.dims.clone(),
                max_dims: def.max_dims.clone(),
                layout,
                chunk: chunk.map(|c| c.to_vec()),
                deflate,
                data,
                strs,
                attrs: Attrs::new(),
                addr,
            })),
        );
        let h = st.alloc_hid();
        st.datasets.insert(
            h,
            DsHandle {
                file: name,
                path: path.to_string(),
            },
        );
        Ok(h)
    }

    fn open_dataset(&self, file: Hid, path: &str) -> Result<Hid> {
        let mut st = self.state();
        let name = st.file_of(file)?.name.clone();
        let (f, p) = st.resolve(&name, path)?;
        match st.node(&f, &p)? {
            Node::Dataset(_) => {}
            _ => return Err(err(ErrorKind::NotADataset(p))),
        }
        let h = st.alloc_hid();
        st.datasets.insert(h, DsHandle { file: f, path: p });
        Ok(h)
    }

    fn dataset_space(&self, ds: Hid) -> Result<Hid> {
        let mut st = self.state();
        let node = st.ds_node(ds)?;
        let def = SpaceDef {
            dims: node.dims.clone(),
            max_dims: node.max_dims.clone(),
            sel: None,
        };
        let h = st.alloc_hid();
        st.spaces.insert(h, def);
        Ok(h)
    }

    fn dataset_type(&self, ds: Hid) -> Result<Datatype> {
        Ok(self.state().ds_node(ds)?.ty.clone())
    }

    fn dataset_type_path(&self, ds: Hid) -> Result<Option<String>> {
        Ok(self.state().ds_node(ds)?.committed.clone())
    }

    fn dataset_layout(&self, ds: Hid) -> Result<(StorageLayout, Option<Vec<u64>>)> {
        let st = self.state();
        let node = st.ds_node(ds)?;
        Ok((node.layout, node.chunk.clone()))
    }

    fn set_extent(&self, ds: Hid, dims: &[u64]) -> Result<()> {
        let mut st = self.state();
        {
            let handle = st
                .datasets
                .get(&ds)
                .ok_or_else(|| binding_err("unknown dataset handle"))?;
            let open_rw = st
                .open_files
                .values()
                .any(|o| o.name == handle.file && !o.read_only);
            if !open_rw {
                return Err(binding_err("file is open read-only"));
            }
        }
        let node = st.ds_node_mut(ds)?;
        let rank = node.dims.len();
        if dims.len() != rank {
            return Err(err(ErrorKind::RankMismatch {
                expected: rank,
                actual: dims.len(),
            }));
        }
        for k in 0..rank {
            if node.max_dims[k] != UNLIMITED && dims[k] > node.max_dims[k] {
                return Err(err(ErrorKind::ShapeMismatch(format!(
                    "extent {} exceeds max {} on axis {}",
                    dims[k], node.max_dims[k], k
                ))));
            }
        }
        let es = node.ty.size();
        let old_dims = node.dims.clone();
        let new_total: usize = dims.iter().map(|d| *d as usize).product();
        let mut new_data = vec![0_u8; new_total * es];
        let mut new_strs = node.strs.as_ref().map(|_| vec![String::new(); new_total]);
        let overlap: Vec<u64> = old_dims
            .iter()
            .zip(dims)
            .map(|(o, n)| (*o).min(*n))
            .collect();
        if overlap.iter().all(|d| *d > 0) || rank == 0 {
            let mut idx = vec![0_u64; rank];
            loop {
                let mut old_flat = 0_usize;
                let mut new_flat = 0_usize;
                for k in 0..rank {
                    old_flat = old_flat * old_dims[k] as usize + idx[k] as usize;
                    new_flat = new_flat * dims[k] as usize + idx[k] as usize;
                }
                new_data[new_flat * es..(new_flat + 1) * es]
                    .copy_from_slice(&node.data[old_flat * es..(old_flat + 1) * es]);
                if let (Some(ns), Some(os)) = (new_strs.as_mut(), node.strs.as_ref()) {
                    ns[new_flat] = os[old_flat].clone();
                }
                let mut k = rank;
                let mut done = rank == 0;
                while k > 0 {
                    k -= 1;
                    idx[k] += 1;
                    if idx[k] < overlap[k] {
                        break;
                    }
                    idx[k] = 0;
                    if k == 0 {
                        done = true;
                    }
                }
                if done {
                    break;
                }
            }
        }
        node.dims = dims.to_vec();
        node.data = new_data;
        node.strs = new_strs;
        Ok(())
    }

    fn read_dataset(&self, ds: Hid, mem_space: Hid, file_space: Hid, out: &mut [u8]) -> Result<()> {
        let st = self.state();
        let mdef = st.space(mem_space)?.clone();
        let fdef = st.space(file_space)?.clone();
        let node = st.ds_node(ds)?;
        let es = node.ty.size();
        if es == 0 {
            return Err(binding_err("variable-length data on the byte path"));
        }
        let fsel = fdef.offsets();
        let msel = mdef.offsets();
        if fsel.len() != msel.len() {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "file selection has {} elements, memory selection {}",
                fsel.len(),
                msel.len()
            ))));
        }
        if out.len() != mdef.total() * es {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "buffer holds {} bytes, memory extent needs {}",
                out.len(),
                mdef.total() * es
            ))));
        }
        for (m, f) in msel.iter().zip(&fsel) {
            let src = f * es;
            if src + es > node.data.len() {
                return Err(binding_err("file selection outside dataset storage"));
            }
            out[m * es..m * es + es].copy_from_slice(&node.data[src..src + es]);
        }
        Ok(())
    }

    fn write_dataset(&self, ds: Hid, mem_space: Hid, file_space: Hid, data: &[u8]) -> Result<()> {
        let mut st = self.state();
        let mdef = st.space(mem_space)?.clone();
        let fdef = st.space(file_space)?.clone();
        let node = st.ds_node_mut(ds)?;
        let es = node.ty.size();
        if es == 0 {
            return Err(binding_err("variable-length data on the byte path"));
        }
        let fsel = fdef.offsets();
        let msel = mdef.offsets();
        if fsel.len() != msel.len() {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "file selection has {} elements, memory selection {}",
                fsel.len(),
                msel.len()
            ))));
        }
        if data.len() != mdef.total() * es {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "buffer holds {} bytes, memory extent needs {}",
                data.len(),
                mdef.total() * es
            ))));
        }
        for (m, f) in msel.iter().zip(&fsel) {
            let dst = f * es;
            if dst + es > node.data.len() {
                return Err(binding_err("file selection outside dataset storage"));
            }
            node.data[dst..dst + es].copy_from_slice(&data[m * es..m * es + es]);
        }
        Ok(())
    }

    fn read_strings(&self, ds: Hid, mem_space: Hid, file_space: Hid) -> Result<Vec<String>> {
        let st = self.state();
        let mdef = st.space(mem_space)?.clone();
        let fdef = st.space(file_space)?.clone();
        let node = st.ds_node(ds)?;
        let strs = node
            .strs
            .as_ref()
            .ok_or_else(|| binding_err("dataset is not variable-length"))?;
        let fsel = fdef.offsets();
        let msel = mdef.offsets();
        if fsel.len() != msel.len() {
            return Err(err(ErrorKind::ShapeMismatch(
                "string selections differ in size".into(),
            )));
        }
        let mut out = vec![String::new(); mdef.total()];
        for (m, f) in msel.iter().zip(&fsel) {
            out[*m] = strs
                .get(*f)
                .cloned()
                .ok_or_else(|| binding_err("file selection outside dataset storage"))?;
        }
        Ok(out)
    }

    fn write_strings(
        &self,
        ds: Hid,
        mem_space: Hid,
        file_space: Hid,
        vals: &[String],
    ) -> Result<()> {
        let mut st = self.state();
        let mdef = st.space(mem_space)?.clone();
        let fdef = st.space(file_space)?.clone();
        let node = st.ds_node_mut(ds)?;
        let strs = node
            .strs
            .as_mut()
            .ok_or_else(|| binding_err("dataset is not variable-length"))?;
        let fsel = fdef.offsets();
        let msel = mdef.offsets();
        if fsel.len() != msel.len() || vals.len() != mdef.total() {
            return Err(err(ErrorKind::ShapeMismatch(
                "string selections differ in size".into(),
            )));
        }
        for (m, f) in msel.iter().zip(&fsel) {
            let slot = strs
                .get_mut(*f)
                .ok_or_else(|| binding_err("file selection outside dataset storage"))?;
            *slot = vals[*m].clone();
        }
        Ok(())
    }

    fn attr_exists(&self, file: Hid, path: &str, name: &str) -> Result<bool> {
        let st = self.state();
        let (node, _, _) = st.resolved_node(file, path)?;
        Ok(node.attrs().map(|a| a.contains_key(name)).unwrap_or(false))
    }

    fn attr_names(&self, file: Hid, path: &str) -> Result<Vec<String>> {
        let st = self.state();
        let (node, _, _) = st.resolved_node(file, path)?;
        Ok(node
            .attrs()
            .map(|a| a.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn create_attr(
        &self,
        file: Hid,
        path: &str,
        name: &str,
        ty: &TypeRef,
        dims: Option<&[u64]>,
    ) -> Result<()> {
        let mut st = self.state();
        let fname = st.writable_file_of(file)?;
        let (dt, _) = resolve_type(&st, &fname, ty)?;
        let total: usize = dims
            .map(|d| d.iter().map(|x| *x as usize).product())
            .unwrap_or(1);
        let (f, p) = st.resolve(&fname, path)?;
        let store = st
            .files
            .get_mut(&f)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(f.clone())))?;
        let node = store
            .nodes
            .get_mut(&p)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        let attrs = node
            .attrs_mut()
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        if attrs.contains_key(name) {
            return Err(binding_err("attribute already exists"));
        }
        let data = vec![0_u8; dt.size() * total];
        attrs.insert(
            name.to_string(),
            AttrVal {
                ty: dt,
                dims: dims.map(|d| d.to_vec()),
                data,
            },
        );
        Ok(())
    }

    fn delete_attr(&self, file: Hid, path: &str, name: &str) -> Result<()> {
        let mut st = self.state();
        let fname = st.writable_file_of(file)?;
        let (f, p) = st.resolve(&fname, path)?;
        let store = st
            .files
            .get_mut(&f)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(f.clone())))?;
        let node = store
            .nodes
            .get_mut(&p)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        let attrs = node
            .attrs_mut()
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        if attrs.remove(name).is_none() {
            return Err(err(ErrorKind::NoSuchObject(format!("{p}#{name}"))));
        }
        Ok(())
    }

    fn attr_type(&self, file: Hid, path: &str, name: &str) -> Result<Datatype> {
        let st = self.state();
        let (node, _, p) = st.resolved_node(file, path)?;
        let attrs = node
            .attrs()
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        attrs
            .get(name)
            .map(|a| a.ty.clone())
            .ok_or_else(|| err(ErrorKind::NoSuchObject(format!("{p}#{name}"))))
    }

    fn attr_dims(&self, file: Hid, path: &str, name: &str) -> Result<Option<Vec<u64>>> {
        let st = self.state();
        let (node, _, p) = st.resolved_node(file, path)?;
        let attrs = node
            .attrs()
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        attrs
            .get(name)
            .map(|a| a.dims.clone())
            .ok_or_else(|| err(ErrorKind::NoSuchObject(format!("{p}#{name}"))))
    }

    fn read_attr(&self, file: Hid, path: &str, name: &str) -> Result<Vec<u8>> {
        let st = self.state();
        let (node, _, p) = st.resolved_node(file, path)?;
        let attrs = node
            .attrs()
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        attrs
            .get(name)
            .map(|a| a.data.clone())
            .ok_or_else(|| err(ErrorKind::NoSuchObject(format!("{p}#{name}"))))
    }

    fn write_attr(&self, file: Hid, path: &str, name: &str, data: &[u8]) -> Result<()> {
        let mut st = self.state();
        let fname = st.writable_file_of(file)?;
        let (f, p) = st.resolve(&fname, path)?;
        let store = st
            .files
            .get_mut(&f)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(f.clone())))?;
        let node = store
            .nodes
            .get_mut(&p)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        let attrs = node
            .attrs_mut()
            .ok_or_else(|| err(ErrorKind::NoSuchObject(p.clone())))?;
        let attr = attrs
            .get_mut(name)
            .ok_or_else(|| err(ErrorKind::NoSuchObject(format!("{p}#{name}"))))?;
        if data.len() != attr.data.len() {
            return Err(err(ErrorKind::ShapeMismatch(format!(
                "attribute takes {} bytes, got {}",
                attr.data.len(),
                data.len()
            ))));
        }
        attr.data = data.to_vec();
        Ok(())
    }
}
