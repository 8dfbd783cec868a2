use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;
use ssh_client_lowlevel::{
    FileAttrs, HandleOwned, OpenFlags, ReadStatus, RequestId, SftpTransport,
    TransportError, TransportErrorKind, WriteStatus,
};

const S_IFDIR: u32 = 0o040_000;
const S_IFREG: u32 = 0o100_000;
const S_IFLNK: u32 = 0o120_000;
const S_IFIFO: u32 = 0o010_000;

#[derive(Debug, Clone)]
enum Kind {
    Directory,
    File(Vec<u8>),
    Symlink,
    Special,
}

#[derive(Debug, Clone)]
struct Node {
    kind: Kind,
    mode: u32,
    uid: u32,
    gid: u32,
    atime: u32,
    mtime: u32,
}

impl Node {
    fn new(kind: Kind, mode: u32) -> Self {
        Self {
            kind,
            mode,
            uid: 1000,
            gid: 1000,
            atime: 0,
            mtime: 0,
        }
    }

    fn attrs(&self) -> FileAttrs {
        let (type_bits, size) = match &self.kind {
            Kind::Directory => (S_IFDIR, 4096),
            Kind::File(data) => (S_IFREG, data.len() as u64),
            Kind::Symlink => (S_IFLNK, 0),
            Kind::Special => (S_IFIFO, 0),
        };

        let mut attrs = FileAttrs::new();
        attrs.set_size(size);
        attrs.set_permissions(type_bits | (self.mode & 0o7777));
        attrs.set_id(self.uid, self.gid);
        attrs.set_time(self.atime, self.mtime);
        attrs
    }
}

#[derive(Debug)]
enum OpenHandle {
    Dir { path: String, entries: VecDeque<FileAttrs> },
    File { path: String },
}

#[derive(Debug)]
enum Operation {
    Read { offset: u64, len: u32 },
    Write { offset: u64, data: Bytes },
}

#[derive(Debug)]
struct Request {
    handle: HandleOwned,
    operation: Operation,
    latency: u32,
}

#[derive(Debug)]
struct State {
    home: String,
    nodes: BTreeMap<String, Node>,
    handles: HashMap<HandleOwned, OpenHandle>,
    next_handle: u32,

    requests: HashMap<u32, Request>,
    /// Unconsumed request ids per handle, in submission order.
    order: HashMap<HandleOwned, VecDeque<u32>>,
    next_request: u32,
    latencies: VecDeque<u32>,
    default_latency: u32,

    window: usize,

    events: Vec<String>,
    max_in_flight: usize,
    out_of_order_polls: usize,
    window_violations: usize,

    fail_closedir: bool,
    fail_close: bool,
    fail_submit_read: bool,
    fail_read_at: Option<u64>,
    denied_dirs: HashSet<String>,
}

fn error(kind: TransportErrorKind, message: &str) -> TransportError {
    TransportError::new(kind, message)
}

fn no_such_file() -> TransportError {
    error(TransportErrorKind::NoSuchFile, "No such file")
}

fn failure(message: &str) -> TransportError {
    error(TransportErrorKind::Failure, message)
}

fn normalize(path: &str) -> String {
    let mut components: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => (),
            ".." => {
                components.pop();
            }
            component => components.push(component),
        }
    }
    format!("/{}", components.join("/"))
}

fn parent(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(index) => &path[..index],
    }
}

impl State {
    fn node(&self, path: &str) -> Result<&Node, TransportError> {
        self.nodes.get(path).ok_or_else(no_such_file)
    }

    fn node_mut(&mut self, path: &str) -> Result<&mut Node, TransportError> {
        self.nodes.get_mut(path).ok_or_else(no_such_file)
    }

    fn new_handle(&mut self, open: OpenHandle) -> HandleOwned {
        let handle = HandleOwned::new(self.next_handle.to_be_bytes().to_vec());
        self.next_handle += 1;
        self.handles.insert(handle.clone(), open);
        handle
    }

    fn file_path(&self, handle: &HandleOwned) -> Result<String, TransportError> {
        match self.handles.get(handle) {
            Some(OpenHandle::File { path }) => Ok(path.clone()),
            _ => Err(failure("invalid handle")),
        }
    }

    fn in_flight(&self) -> usize {
        self.requests.len()
    }

    fn submit(&mut self, handle: &HandleOwned, operation: Operation) -> RequestId {
        let id = self.next_request;
        self.next_request += 1;

        let latency = self.latencies.pop_front().unwrap_or(self.default_latency);
        self.requests.insert(
            id,
            Request {
                handle: handle.clone(),
                operation,
                latency,
            },
        );
        self.order.entry(handle.clone()).or_default().push_back(id);
        self.max_in_flight = self.max_in_flight.max(self.in_flight());

        RequestId(id)
    }

    /// Return the request if it is complete, removing it.
    fn complete(
        &mut self,
        handle: &HandleOwned,
        id: RequestId,
    ) -> Result<Option<Request>, TransportError> {
        let request = self
            .requests
            .get_mut(&id.0)
            .filter(|request| &request.handle == handle)
            .ok_or_else(|| failure("unknown request"))?;

        if request.latency > 0 {
            request.latency -= 1;
            let oldest = self.order.get(handle).and_then(|order| order.front());
            if oldest != Some(&id.0) {
                self.out_of_order_polls += 1;
            }
            return Ok(None);
        }

        let oldest = self.order.get(handle).and_then(|order| order.front());
        if oldest != Some(&id.0) {
            self.out_of_order_polls += 1;
        }
        self.forget(handle, id.0);
        Ok(self.requests.remove(&id.0))
    }

    fn forget(&mut self, handle: &HandleOwned, id: u32) {
        if let Some(order) = self.order.get_mut(handle) {
            order.retain(|queued| *queued != id);
        }
    }
}

/// In-memory sftp server.
///
/// Clones share the same state, so a test can keep one to inspect and
/// steer the server while a client owns another.
#[derive(Debug, Clone)]
pub struct MockSftp {
    state: Arc<Mutex<State>>,
}

impl Default for MockSftp {
    fn default() -> Self {
        Self::new("/home/user")
    }
}

impl MockSftp {
    /// Create a server whose home directory (and its ancestors) exist.
    pub fn new(home: &str) -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_owned(), Node::new(Kind::Directory, 0o755));

        let mut path = String::new();
        for component in home.split('/').filter(|component| !component.is_empty()) {
            path.push('/');
            path.push_str(component);
            nodes.insert(path.clone(), Node::new(Kind::Directory, 0o755));
        }

        Self {
            state: Arc::new(Mutex::new(State {
                home: normalize(home),
                nodes,
                handles: HashMap::new(),
                next_handle: 1,
                requests: HashMap::new(),
                order: HashMap::new(),
                next_request: 1,
                latencies: VecDeque::new(),
                default_latency: 0,
                window: 1 << 30,
                events: Vec::new(),
                max_in_flight: 0,
                out_of_order_polls: 0,
                window_violations: 0,
                fail_closedir: false,
                fail_close: false,
                fail_submit_read: false,
                fail_read_at: None,
                denied_dirs: HashSet::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    pub fn insert_dir(&self, path: &str) {
        self.lock()
            .nodes
            .insert(normalize(path), Node::new(Kind::Directory, 0o755));
    }

    pub fn insert_file(&self, path: &str, content: &[u8]) {
        self.lock().nodes.insert(
            normalize(path),
            Node::new(Kind::File(content.to_vec()), 0o644),
        );
    }

    pub fn insert_symlink(&self, path: &str) {
        self.lock()
            .nodes
            .insert(normalize(path), Node::new(Kind::Symlink, 0o777));
    }

    pub fn insert_special(&self, path: &str) {
        self.lock()
            .nodes
            .insert(normalize(path), Node::new(Kind::Special, 0o600));
    }

    pub fn exists(&self, path: &str) -> bool {
        self.lock().nodes.contains_key(&normalize(path))
    }

    pub fn is_dir(&self, path: &str) -> bool {
        matches!(
            self.lock().nodes.get(&normalize(path)).map(|node| &node.kind),
            Some(Kind::Directory)
        )
    }

    pub fn file_content(&self, path: &str) -> Option<Vec<u8>> {
        match self.lock().nodes.get(&normalize(path)).map(|node| &node.kind) {
            Some(Kind::File(data)) => Some(data.clone()),
            _ => None,
        }
    }

    /// Permission bits of `path`, without the file type.
    pub fn mode(&self, path: &str) -> Option<u32> {
        self.lock()
            .nodes
            .get(&normalize(path))
            .map(|node| node.mode & 0o7777)
    }

    /// Metadata calls and request submissions, in order.
    pub fn events(&self) -> Vec<String> {
        self.lock().events.clone()
    }

    pub fn clear_events(&self) {
        self.lock().events.clear();
    }

    /// Set the flow-control window.
    ///
    /// Submitted writes consume the window, confirmed writes give it back.
    pub fn set_window(&self, window: usize) {
        self.lock().window = window;
    }

    /// Number of polls each upcoming request stays pending for, one entry
    /// per request in submission order.
    pub fn push_latencies(&self, latencies: impl IntoIterator<Item = u32>) {
        self.lock().latencies.extend(latencies);
    }

    /// Number of polls requests stay pending for once the scripted
    /// latencies are used up.
    pub fn set_default_latency(&self, latency: u32) {
        self.lock().default_latency = latency;
    }

    pub fn fail_closedir(&self) {
        self.lock().fail_closedir = true;
    }

    pub fn fail_close(&self) {
        self.lock().fail_close = true;
    }

    pub fn fail_submit_read(&self) {
        self.lock().fail_submit_read = true;
    }

    /// Fail the read request submitted at `offset`.
    pub fn fail_read_at(&self, offset: u64) {
        self.lock().fail_read_at = Some(offset);
    }

    /// Refuse to open the directory `path`.
    pub fn deny_opendir(&self, path: &str) {
        self.lock().denied_dirs.insert(normalize(path));
    }

    /// Highest number of requests that were outstanding at once.
    pub fn max_in_flight(&self) -> usize {
        self.lock().max_in_flight
    }

    /// Requests submitted but neither consumed nor abandoned.
    pub fn outstanding(&self) -> usize {
        self.lock().in_flight()
    }

    /// Polls issued for a request that was not the oldest outstanding one
    /// of its handle.
    pub fn out_of_order_polls(&self) -> usize {
        self.lock().out_of_order_polls
    }

    /// Writes submitted while the window was smaller than their length.
    pub fn window_violations(&self) -> usize {
        self.lock().window_violations
    }

    /// File and directory handles not yet closed.
    pub fn open_handles(&self) -> usize {
        self.lock().handles.len()
    }
}

impl SftpTransport for MockSftp {
    fn init(&mut self) -> Result<(), TransportError> {
        self.lock().events.push("init".to_owned());
        Ok(())
    }

    fn canonicalize(&mut self, path: &str) -> Result<String, TransportError> {
        let mut state = self.lock();
        state.events.push(format!("canonicalize {path}"));

        // Existence is not checked, like servers speaking early revisions.
        if path.starts_with('/') {
            Ok(normalize(path))
        } else {
            Ok(normalize(&format!("{}/{path}", state.home)))
        }
    }

    fn stat(&mut self, path: &str) -> Result<FileAttrs, TransportError> {
        let mut state = self.lock();
        state.events.push(format!("stat {path}"));
        state.node(path).map(Node::attrs)
    }

    fn setstat(&mut self, path: &str, attrs: &FileAttrs) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.events.push(format!("setstat {path}"));

        let node = state.node_mut(path)?;
        if let Some(size) = attrs.get_size() {
            match &mut node.kind {
                Kind::File(data) => data.resize(size as usize, 0),
                _ => return Err(failure("cannot resize")),
            }
        }
        if let Some(permissions) = attrs.get_permissions() {
            node.mode = permissions & 0o7777;
        }
        if let Some((uid, gid)) = attrs.get_id() {
            node.uid = uid;
            node.gid = gid;
        }
        if let Some((atime, mtime)) = attrs.get_time() {
            node.atime = atime;
            node.mtime = mtime;
        }
        Ok(())
    }

    fn opendir(&mut self, path: &str) -> Result<HandleOwned, TransportError> {
        let mut state = self.lock();
        state.events.push(format!("opendir {path}"));

        if state.denied_dirs.contains(path) {
            return Err(error(TransportErrorKind::PermissionDenied, "Permission denied"));
        }
        if !matches!(state.node(path)?.kind, Kind::Directory) {
            return Err(failure("not a directory"));
        }

        let prefix = if path == "/" {
            "/".to_owned()
        } else {
            format!("{path}/")
        };
        let entries = state
            .nodes
            .iter()
            .filter_map(|(child, node)| {
                let name = child.strip_prefix(&prefix)?;
                if name.is_empty() || name.contains('/') {
                    return None;
                }
                let mut attrs = node.attrs();
                attrs.set_name(name);
                Some(attrs)
            })
            .collect();

        Ok(state.new_handle(OpenHandle::Dir {
            path: path.to_owned(),
            entries,
        }))
    }

    fn readdir(&mut self, dir: &HandleOwned) -> Result<Option<FileAttrs>, TransportError> {
        match self.lock().handles.get_mut(dir) {
            Some(OpenHandle::Dir { entries, .. }) => Ok(entries.pop_front()),
            _ => Err(failure("invalid handle")),
        }
    }

    fn closedir(&mut self, dir: HandleOwned) -> Result<(), TransportError> {
        let mut state = self.lock();
        let path = match state.handles.remove(&dir) {
            Some(OpenHandle::Dir { path, .. }) => path,
            _ => return Err(failure("invalid handle")),
        };
        state.events.push(format!("closedir {path}"));

        if state.fail_closedir {
            Err(failure("closedir failed"))
        } else {
            Ok(())
        }
    }

    fn open(
        &mut self,
        path: &str,
        flags: OpenFlags,
        mode: u32,
    ) -> Result<HandleOwned, TransportError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        state.events.push(format!("open {path} {:#x}", flags.bits()));

        match state.nodes.get_mut(path) {
            Some(_) if flags.contains(OpenFlags::CREATE | OpenFlags::EXCLUSIVE) => {
                return Err(failure("file exists"))
            }
            Some(Node {
                kind: Kind::File(data),
                ..
            }) => {
                if flags.contains(OpenFlags::TRUNCATE) {
                    data.clear();
                }
            }
            Some(_) => return Err(failure("not a regular file")),
            None if flags.contains(OpenFlags::CREATE) => {
                if !matches!(state.node(parent(path))?.kind, Kind::Directory) {
                    return Err(failure("parent is not a directory"));
                }
                state
                    .nodes
                    .insert(path.to_owned(), Node::new(Kind::File(Vec::new()), mode));
            }
            None => return Err(no_such_file()),
        }

        Ok(state.new_handle(OpenHandle::File {
            path: path.to_owned(),
        }))
    }

    fn close(&mut self, file: HandleOwned) -> Result<(), TransportError> {
        let mut state = self.lock();
        let path = state.file_path(&file)?;
        state.handles.remove(&file);
        state.events.push(format!("close {path}"));

        if state.fail_close {
            Err(failure("close failed"))
        } else {
            Ok(())
        }
    }

    fn mkdir(&mut self, path: &str, mode: u32) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.events.push(format!("mkdir {path}"));

        if state.nodes.contains_key(path) {
            return Err(failure("file exists"));
        }
        if !matches!(state.node(parent(path))?.kind, Kind::Directory) {
            return Err(failure("parent is not a directory"));
        }
        state
            .nodes
            .insert(path.to_owned(), Node::new(Kind::Directory, mode));
        Ok(())
    }

    fn rmdir(&mut self, path: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.events.push(format!("rmdir {path}"));

        if !matches!(state.node(path)?.kind, Kind::Directory) {
            return Err(failure("not a directory"));
        }
        let prefix = format!("{path}/");
        if state.nodes.keys().any(|child| child.starts_with(&prefix)) {
            return Err(failure("directory not empty"));
        }
        state.nodes.remove(path);
        Ok(())
    }

    fn unlink(&mut self, path: &str) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.events.push(format!("unlink {path}"));

        if matches!(state.node(path)?.kind, Kind::Directory) {
            return Err(failure("is a directory"));
        }
        state.nodes.remove(path);
        Ok(())
    }

    fn submit_read(
        &mut self,
        file: &HandleOwned,
        offset: u64,
        len: u32,
    ) -> Result<RequestId, TransportError> {
        let mut state = self.lock();
        state.file_path(file)?;
        state.events.push(format!("submit_read {offset} {len}"));

        if state.fail_submit_read {
            return Err(failure("cannot allocate request"));
        }
        Ok(state.submit(file, Operation::Read { offset, len }))
    }

    fn poll_read(
        &mut self,
        file: &HandleOwned,
        id: RequestId,
    ) -> Result<ReadStatus, TransportError> {
        let mut state = self.lock();
        let (offset, len) = match state.complete(file, id)? {
            None => return Ok(ReadStatus::Pending),
            Some(Request {
                operation: Operation::Read { offset, len },
                ..
            }) => (offset, len),
            Some(_) => return Err(failure("not a read request")),
        };

        if state.fail_read_at == Some(offset) {
            return Err(failure("read failed"));
        }

        let path = state.file_path(file)?;
        let data = match &state.node(&path)?.kind {
            Kind::File(data) => data,
            _ => return Err(failure("not a regular file")),
        };

        let start = offset as usize;
        if start >= data.len() {
            return Ok(ReadStatus::Eof);
        }
        let end = data.len().min(start + len as usize);
        Ok(ReadStatus::Data(Bytes::copy_from_slice(&data[start..end])))
    }

    fn submit_write(
        &mut self,
        file: &HandleOwned,
        offset: u64,
        data: Bytes,
    ) -> Result<RequestId, TransportError> {
        let mut state = self.lock();
        state.file_path(file)?;
        state
            .events
            .push(format!("submit_write {offset} {}", data.len()));

        if data.len() > state.window {
            state.window_violations += 1;
        }
        state.window = state.window.saturating_sub(data.len());

        Ok(state.submit(file, Operation::Write { offset, data }))
    }

    fn poll_write(
        &mut self,
        file: &HandleOwned,
        id: RequestId,
    ) -> Result<WriteStatus, TransportError> {
        let mut state = self.lock();
        let (offset, data) = match state.complete(file, id)? {
            None => return Ok(WriteStatus::Pending),
            Some(Request {
                operation: Operation::Write { offset, data },
                ..
            }) => (offset, data),
            Some(_) => return Err(failure("not a write request")),
        };

        state.window = state.window.saturating_add(data.len());

        let path = state.file_path(file)?;
        let content = match &mut state.node_mut(&path)?.kind {
            Kind::File(content) => content,
            _ => return Err(failure("not a regular file")),
        };

        let start = offset as usize;
        let end = start + data.len();
        if content.len() < end {
            content.resize(end, 0);
        }
        content[start..end].copy_from_slice(&data);
        Ok(WriteStatus::Done)
    }

    fn abandon(&mut self, file: &HandleOwned, id: RequestId) -> Result<(), TransportError> {
        let mut state = self.lock();
        state.events.push(format!("abandon {}", id.0));

        if let Some(Request {
            operation: Operation::Write { data, .. },
            ..
        }) = state.requests.remove(&id.0)
        {
            state.window = state.window.saturating_add(data.len());
        }
        state.forget(file, id.0);
        Ok(())
    }

    fn window_size(&self) -> usize {
        self.lock().window
    }
}
