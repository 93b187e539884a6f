//! The VM facade: one heap, one class cache, one static-field map,
//! one monitor map, one native registry and one event loop, shared
//! behind `Arc<Vm>`.
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use crate::classfile::ClassFile;
use crate::eventloop::EventLoop;
use crate::heap::Heap;
use crate::monitor::MonitorMap;
use crate::native::NativeRegistry;
use crate::value::{Reference, Value};

/// External hook the interpreter consults when a class is not in the
/// cache: given a class name, produce a class image.
pub trait ClassLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<ClassFile>;
}

/// Lazy file resolution: look for `<name>.class` in each search
/// directory.
pub struct FileLoader {
    search_dirs: Vec<PathBuf>,
}

impl FileLoader {
    pub fn new(search_dirs: Vec<PathBuf>) -> FileLoader {
        FileLoader { search_dirs }
    }
}

impl Default for FileLoader {
    fn default() -> Self {
        FileLoader {
            search_dirs: vec![PathBuf::from(".")],
        }
    }
}

impl ClassLoader for FileLoader {
    fn load(&self, name: &str) -> Option<ClassFile> {
        for dir in &self.search_dirs {
            let path = dir.join(format!("{name}.class"));
            if let Ok(cf) = ClassFile::parse_file(&path) {
                return Some(cf);
            }
        }
        None
    }
}

/// The Java Virtual Machine instance.
pub struct Vm {
    pub heap: Heap,
    pub monitors: MonitorMap,
    pub natives: NativeRegistry,
    pub event_loop: EventLoop,
    classes: RwLock<HashMap<String, Arc<ClassFile>>>,
    statics: Mutex<HashMap<String, Value>>,
    interned: Mutex<HashMap<String, Arc<str>>>,
    loader: Mutex<Box<dyn ClassLoader>>,
    thread_counter: AtomicI64,
    running: AtomicBool,
}

impl Vm {
    pub fn new() -> Vm {
        Vm {
            heap: Heap::new(),
            monitors: MonitorMap::new(),
            natives: NativeRegistry::new(),
            event_loop: EventLoop::new(),
            classes: RwLock::new(HashMap::new()),
            statics: Mutex::new(HashMap::new()),
            interned: Mutex::new(HashMap::new()),
            loader: Mutex::new(Box::<FileLoader>::default()),
            thread_counter: AtomicI64::new(0),
            running: AtomicBool::new(true),
        }
    }

    /// Replace the lazy class loader.
    pub fn set_loader(&self, loader: Box<dyn ClassLoader>) {
        *self.loader.lock() = loader;
    }

    /// Cache a class image under its name.
    pub fn load_class(&self, name: &str, cf: Arc<ClassFile>) {
        self.classes.write().insert(name.to_string(), cf);
    }

    pub fn get_class(&self, name: &str) -> Option<Arc<ClassFile>> {
        self.classes.read().get(name).cloned()
    }

    /// Ask the external loader for a class image and cache a hit.
    pub fn load_from_loader(&self, name: &str) -> Option<Arc<ClassFile>> {
        let cf = self.loader.lock().load(name)?;
        let cf = Arc::new(cf);
        self.load_class(name, cf.clone());
        Some(cf)
    }

    /// Static field read, keyed `"class.field"`. Unset fields read as
    /// the descriptor's default.
    pub fn get_static(&self, key: &str, descriptor: &str) -> Value {
        self.statics
            .lock()
            .get(key)
            .cloned()
            .unwrap_or_else(|| Value::default_of(descriptor))
    }

    pub fn set_static(&self, key: &str, value: Value) {
        self.statics.lock().insert(key.to_string(), value);
    }

    /// Reference-valued statics, as GC roots.
    pub fn static_roots(&self) -> Vec<Reference> {
        self.statics
            .lock()
            .values()
            .filter_map(|v| match v {
                Value::Ref(r) if !r.is_null() => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Process-wide string intern table; interning the same text twice
    /// yields the same storage.
    pub fn intern(&self, text: &str) -> Arc<str> {
        let mut interned = self.interned.lock();
        if let Some(existing) = interned.get(text) {
            return existing.clone();
        }
        let stored: Arc<str> = text.into();
        interned.insert(text.to_string(), stored.clone());
        stored
    }

    pub fn next_thread_id(&self) -> i64 {
        self.thread_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Default for Vm {
    fn default() -> Self {
        Vm::new()
    }
}
