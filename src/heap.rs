//! Id-addressed heap with size accounting and mark-sweep collection.
//!
//! The heap owns all objects and arrays; the rest of the runtime holds
//! 64-bit ids. That keeps collection safe (no host pointers to chase)
//! and gives monitors a ready-made identity key.
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::classfile::ClassFile;
use crate::frame::Frame;
use crate::object::{Array, Object};
use crate::value::{Reference, Value};

/// Default heap-size threshold before a collection is requested.
const DEFAULT_GC_THRESHOLD: i64 = 10 * 1024 * 1024;

/// A heap-resident entity.
#[derive(Debug, Clone)]
pub enum HeapEntry {
    Object(Object),
    Array(Array),
}

/// Heap statistics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub alloc_count: u64,
    pub free_count: u64,
    pub live_objects: u64,
    pub total_bytes: i64,
    pub gc_runs: u64,
    pub gc_threshold: i64,
}

/// The JVM heap: a registry of entries keyed by monotonically
/// increasing id.
pub struct Heap {
    objects: Mutex<HashMap<u64, HeapEntry>>,
    next_id: AtomicU64,
    alloc_count: AtomicU64,
    free_count: AtomicU64,
    total_bytes: AtomicI64,
    gc_runs: AtomicU64,
    gc_threshold: AtomicI64,
    gc_enabled: AtomicBool,
}

impl Heap {
    pub fn new() -> Heap {
        Heap {
            objects: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            alloc_count: AtomicU64::new(0),
            free_count: AtomicU64::new(0),
            total_bytes: AtomicI64::new(0),
            gc_runs: AtomicU64::new(0),
            gc_threshold: AtomicI64::new(DEFAULT_GC_THRESHOLD),
            gc_enabled: AtomicBool::new(true),
        }
    }

    /// Register an entry and return its id.
    pub fn alloc(&self, entry: HeapEntry) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.alloc_count.fetch_add(1, Ordering::Relaxed);
        let size = estimate_size(&entry);
        self.objects.lock().insert(id, entry);
        self.total_bytes.fetch_add(size, Ordering::Relaxed);
        id
    }

    /// Remove an entry explicitly.
    pub fn free(&self, id: u64) {
        let mut objects = self.objects.lock();
        if let Some(entry) = objects.remove(&id) {
            self.total_bytes
                .fetch_sub(estimate_size(&entry), Ordering::Relaxed);
            self.free_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Run `f` against the entry with the given id.
    pub fn with_entry<R>(&self, id: u64, f: impl FnOnce(&mut HeapEntry) -> R) -> Option<R> {
        let mut objects = self.objects.lock();
        objects.get_mut(&id).map(f)
    }

    /// Class image of the object with the given id.
    pub fn object_class(&self, id: u64) -> Option<Arc<ClassFile>> {
        let objects = self.objects.lock();
        match objects.get(&id) {
            Some(HeapEntry::Object(obj)) => Some(obj.class.clone()),
            _ => None,
        }
    }

    /// True once the estimated live bytes exceed the threshold. The
    /// interpreter checks this after allocation sites and supplies the
    /// real root set; the heap itself never collects blindly.
    pub fn should_collect(&self) -> bool {
        self.gc_enabled.load(Ordering::Relaxed)
            && self.total_bytes.load(Ordering::Relaxed) > self.gc_threshold.load(Ordering::Relaxed)
    }

    /// Mark-sweep collection over the given roots plus every frame's
    /// locals and operand-stack reference cells.
    pub fn collect(&self, roots: &[Reference], frames: &[Frame]) {
        if !self.gc_enabled.load(Ordering::Relaxed) {
            return;
        }
        self.gc_runs.fetch_add(1, Ordering::Relaxed);

        let mut objects = self.objects.lock();
        let mut marked = HashSet::new();

        for root in roots {
            mark(&objects, root, &mut marked);
        }
        for frame in frames {
            for slot in frame.locals.slots().iter().chain(frame.stack.slots()) {
                if let Value::Ref(reference) = slot {
                    mark(&objects, reference, &mut marked);
                }
            }
        }

        let dead: Vec<u64> = objects
            .keys()
            .filter(|id| !marked.contains(id))
            .copied()
            .collect();
        for id in dead {
            if let Some(entry) = objects.remove(&id) {
                self.total_bytes
                    .fetch_sub(estimate_size(&entry), Ordering::Relaxed);
                self.free_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn contains(&self, id: u64) -> bool {
        self.objects.lock().contains_key(&id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn set_gc_enabled(&self, enabled: bool) {
        self.gc_enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn set_gc_threshold(&self, bytes: i64) {
        self.gc_threshold.store(bytes, Ordering::Relaxed);
    }

    pub fn stats(&self) -> HeapStats {
        let alloc_count = self.alloc_count.load(Ordering::Relaxed);
        let free_count = self.free_count.load(Ordering::Relaxed);
        HeapStats {
            alloc_count,
            free_count,
            live_objects: alloc_count - free_count,
            total_bytes: self.total_bytes.load(Ordering::Relaxed),
            gc_runs: self.gc_runs.load(Ordering::Relaxed),
            gc_threshold: self.gc_threshold.load(Ordering::Relaxed),
        }
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}

/// Mark one reference and everything reachable from it. Objects
/// recurse through reference fields, reference arrays through their
/// elements; strings, class tokens and host values are terminal.
fn mark(objects: &HashMap<u64, HeapEntry>, reference: &Reference, marked: &mut HashSet<u64>) {
    let id = match reference {
        Reference::Object(id) | Reference::Array(id) => *id,
        _ => return,
    };
    if !marked.insert(id) {
        return;
    }
    match objects.get(&id) {
        Some(HeapEntry::Object(obj)) => {
            for field in obj.references() {
                mark(objects, field, marked);
            }
        }
        Some(HeapEntry::Array(Array::Ref { data, .. })) => {
            for element in data {
                mark(objects, element, marked);
            }
        }
        _ => {}
    }
}

/// Coarse per-kind size formula, carried over from the original
/// runtime's accounting.
fn estimate_size(entry: &HeapEntry) -> i64 {
    match entry {
        HeapEntry::Object(obj) => {
            let (refs, slots) = obj.field_counts();
            64 + (refs * 16) as i64 + (slots * 8) as i64
        }
        HeapEntry::Array(arr) => {
            let elem = match arr {
                Array::Int { .. } | Array::Float(_) => 4,
                Array::Long(_) | Array::Double(_) | Array::Ref { .. } => 8,
            };
            32 + i64::from(arr.len()) * elem
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ArrayKind;

    fn int_array(len: i32) -> HeapEntry {
        HeapEntry::Array(Array::primitive(ArrayKind::Int, len))
    }

    #[test]
    fn ids_are_monotonic() {
        let heap = Heap::new();
        let a = heap.alloc(int_array(1));
        let b = heap.alloc(int_array(1));
        assert!(b > a);
        assert_eq!(heap.object_count(), 2);
    }

    #[test]
    fn free_updates_accounting() {
        let heap = Heap::new();
        let id = heap.alloc(int_array(8));
        let before = heap.stats();
        assert!(before.total_bytes > 0);
        heap.free(id);
        let after = heap.stats();
        assert_eq!(after.free_count, 1);
        assert_eq!(after.live_objects, 0);
        assert_eq!(after.total_bytes, 0);
    }

    #[test]
    fn collect_keeps_reachable_and_drops_the_rest() {
        let heap = Heap::new();
        let live = heap.alloc(int_array(4));
        let dead = heap.alloc(int_array(4));

        let roots = [Reference::Array(live)];
        heap.collect(&roots, &[]);

        assert!(heap.contains(live));
        assert!(!heap.contains(dead));
        assert_eq!(heap.stats().gc_runs, 1);
    }

    #[test]
    fn collect_traces_through_reference_arrays() {
        let heap = Heap::new();
        let inner = heap.alloc(int_array(2));
        let mut outer = Array::reference("java/lang/Object", 1);
        outer.set_ref(0, Reference::Array(inner));
        let outer_id = heap.alloc(HeapEntry::Array(outer));

        heap.collect(&[Reference::Array(outer_id)], &[]);

        assert!(heap.contains(outer_id));
        assert!(heap.contains(inner));
    }

    #[test]
    fn disabled_gc_never_sweeps() {
        let heap = Heap::new();
        let id = heap.alloc(int_array(1));
        heap.set_gc_enabled(false);
        heap.collect(&[], &[]);
        assert!(heap.contains(id));
        assert!(!heap.should_collect());
    }

    #[test]
    fn threshold_drives_should_collect() {
        let heap = Heap::new();
        heap.set_gc_threshold(16);
        assert!(!heap.should_collect());
        heap.alloc(int_array(32));
        assert!(heap.should_collect());
    }
}
