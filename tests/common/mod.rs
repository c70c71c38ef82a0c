//! Shared test helpers

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;
use treekv::service::{
    Coordinator, CreateMode, MultiError, Request, Response, ServiceResult, Stat,
};
use treekv::version::NativeVersion;
use treekv::{Client, Config, MemorySession, MemoryTree, RetryPolicy, WatchHandle};

pub const PREFIX: &str = "/ns";

/// A callback standing in for a concurrent actor
pub type Hook = Box<dyn FnOnce() + Send>;

pub fn config() -> Config {
    Config::builder().prefix(PREFIX).build()
}

pub fn setup() -> (MemoryTree, Client<MemorySession>) {
    let tree = MemoryTree::new();
    let client = Client::connect(&tree, config()).unwrap();
    (tree, client)
}

/// Second client on the same tree, with its own session
pub fn other_client(tree: &MemoryTree) -> Client<MemorySession> {
    Client::connect(tree, config()).unwrap()
}

pub fn racing_client(tree: &MemoryTree) -> Client<Racing> {
    Client::with_service(Racing::new(tree.session()), &config()).unwrap()
}

pub fn racing_client_with_retry(tree: &MemoryTree, retry: RetryPolicy) -> Client<Racing> {
    let config = Config::builder().prefix(PREFIX).retry(retry).build();
    Client::with_service(Racing::new(tree.session()), &config).unwrap()
}

/// Session wrapper that runs queued hooks right before `multi` and
/// `set_data` reach the tree
pub struct Racing {
    inner: MemorySession,
    before_multi: Mutex<VecDeque<Hook>>,
    before_set: Mutex<VecDeque<Hook>>,
    multi_calls: AtomicUsize,
}

impl Racing {
    pub fn new(inner: MemorySession) -> Self {
        Self {
            inner,
            before_multi: Mutex::new(VecDeque::new()),
            before_set: Mutex::new(VecDeque::new()),
            multi_calls: AtomicUsize::new(0),
        }
    }

    pub fn before_multi(&self, hook: impl FnOnce() + Send + 'static) {
        self.before_multi.lock().push_back(Box::new(hook));
    }

    pub fn before_set(&self, hook: impl FnOnce() + Send + 'static) {
        self.before_set.lock().push_back(Box::new(hook));
    }

    pub fn multi_calls(&self) -> usize {
        self.multi_calls.load(Ordering::SeqCst)
    }
}

fn run_next(queue: &Mutex<VecDeque<Hook>>) {
    let hook = queue.lock().pop_front();
    if let Some(hook) = hook {
        hook();
    }
}

impl Coordinator for Racing {
    fn create(&self, path: &str, data: Bytes, mode: CreateMode) -> ServiceResult<String> {
        self.inner.create(path, data, mode)
    }

    fn set_data(&self, path: &str, data: Bytes, version: NativeVersion) -> ServiceResult<Stat> {
        run_next(&self.before_set);
        self.inner.set_data(path, data, version)
    }

    fn delete(&self, path: &str, version: NativeVersion) -> ServiceResult<()> {
        self.inner.delete(path, version)
    }

    fn exists(&self, path: &str, watch: bool)
        -> ServiceResult<(Option<Stat>, Option<WatchHandle>)> {
        self.inner.exists(path, watch)
    }

    fn get_data(&self, path: &str, watch: bool)
        -> ServiceResult<(Bytes, Stat, Option<WatchHandle>)> {
        self.inner.get_data(path, watch)
    }

    fn children(&self, path: &str, watch: bool)
        -> ServiceResult<(Vec<String>, Option<WatchHandle>)> {
        self.inner.children(path, watch)
    }

    fn multi(&self, requests: Vec<Request>) -> Result<Vec<Response>, MultiError> {
        self.multi_calls.fetch_add(1, Ordering::SeqCst);
        run_next(&self.before_multi);
        self.inner.multi(requests)
    }

    fn close(&self) {
        self.inner.close()
    }
}

/// Build `/ns<key>` style node paths for raw session calls
pub fn node(key: &str) -> String {
    format!("{}{}", PREFIX, key)
}
