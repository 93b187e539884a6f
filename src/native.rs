//! Native method registry and built-in natives.
//!
//! The lookup key is the `(class, name, descriptor)` triple joined
//! with dots. A native receives the interpreter with the caller's
//! frame on top, pops its arguments from that frame's operand stack
//! per the descriptor it was registered under, and pushes its return
//! value if it has one.
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::VmError;
use crate::eventloop::TaskBody;
use crate::exception::{ARRAY_STORE_EXCEPTION, NULL_POINTER_EXCEPTION};
use crate::heap::HeapEntry;
use crate::interpreter::Interpreter;
use crate::object::Array;
use crate::value::Reference;

/// A native method implementation.
pub type NativeFn = fn(&mut Interpreter) -> Result<(), VmError>;

/// Registry of native methods keyed `"class.name.descriptor"`.
pub struct NativeRegistry {
    methods: RwLock<HashMap<String, NativeFn>>,
}

impl NativeRegistry {
    pub fn new() -> NativeRegistry {
        let registry = NativeRegistry {
            methods: RwLock::new(HashMap::new()),
        };
        registry.register_builtins();
        registry
    }

    /// Register a native method; the extension hook for user natives.
    pub fn register(&self, class_name: &str, method_name: &str, descriptor: &str, f: NativeFn) {
        let key = format!("{class_name}.{method_name}.{descriptor}");
        self.methods.write().insert(key, f);
    }

    pub fn lookup(&self, class_name: &str, method_name: &str, descriptor: &str) -> Option<NativeFn> {
        let key = format!("{class_name}.{method_name}.{descriptor}");
        self.methods.read().get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }

    fn register_builtins(&self) {
        self.register("java/lang/System", "currentTimeMillis", "()J", current_time_millis);
        self.register("java/lang/System", "nanoTime", "()J", nano_time);
        self.register(
            "java/lang/System",
            "arraycopy",
            "(Ljava/lang/Object;ILjava/lang/Object;II)V",
            arraycopy,
        );
        self.register(
            "java/lang/System",
            "identityHashCode",
            "(Ljava/lang/Object;)I",
            identity_hash_code,
        );

        self.register(
            "java/lang/Thread",
            "currentThread",
            "()Ljava/lang/Thread;",
            current_thread,
        );
        self.register("java/lang/Thread", "sleep", "(J)V", thread_sleep);

        self.register("java/lang/Math", "sqrt", "(D)D", math_sqrt);
        self.register("java/lang/Math", "abs", "(I)I", math_abs_int);
        self.register("java/lang/Math", "abs", "(J)J", math_abs_long);
        self.register("java/lang/Math", "max", "(II)I", math_max_int);
        self.register("java/lang/Math", "min", "(II)I", math_min_int);

        self.register(
            "java/lang/String",
            "intern",
            "()Ljava/lang/String;",
            string_intern,
        );

        self.register("java/lang/Float", "floatToRawIntBits", "(F)I", float_to_raw_int_bits);
        self.register(
            "java/lang/Double",
            "doubleToRawLongBits",
            "(D)J",
            double_to_raw_long_bits,
        );

        self.register(
            "java/lang/Runtime",
            "availableProcessors",
            "()I",
            available_processors,
        );
        self.register("java/lang/Runtime", "freeMemory", "()J", free_memory);
        self.register("java/lang/Runtime", "totalMemory", "()J", total_memory);
        self.register("java/lang/Runtime", "maxMemory", "()J", max_memory);
        self.register("java/lang/Runtime", "gc", "()V", run_gc);

        // The event-loop surface is reachable both through the library
        // class name and the demo class that declares the natives.
        for class_name in ["EventLoop", "EventLoopDemo"] {
            self.register(class_name, "submit", "(ILjava/lang/String;)V", el_submit);
            self.register(
                class_name,
                "submitRunnable",
                "(Ljava/lang/Runnable;)V",
                el_submit_runnable,
            );
            self.register(class_name, "setTimeout", "(ILjava/lang/String;J)V", el_set_timeout);
            self.register(
                class_name,
                "setTimeoutRunnable",
                "(Ljava/lang/Runnable;J)V",
                el_set_timeout_runnable,
            );
            self.register(class_name, "setInterval", "(ILjava/lang/String;J)V", el_set_interval);
            self.register(class_name, "run", "()V", el_run);
            self.register(class_name, "runFor", "(J)V", el_run_for);
            self.register(class_name, "stop", "()V", el_stop);
            self.register(class_name, "isRunning", "()Z", el_is_running);
            self.register(class_name, "printStats", "()V", el_print_stats);
            self.register(class_name, "reset", "()V", el_reset);
        }
    }
}

impl Default for NativeRegistry {
    fn default() -> Self {
        NativeRegistry::new()
    }
}

// =============== System natives ===============

fn current_time_millis(interp: &mut Interpreter) -> Result<(), VmError> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64;
    interp.frame_mut().stack.push_long(millis);
    Ok(())
}

fn nano_time(interp: &mut Interpreter) -> Result<(), VmError> {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64;
    interp.frame_mut().stack.push_long(nanos);
    Ok(())
}

// Copied-out slice of array elements; lets the copy work even when
// source and destination are the same array.
enum CopySlice {
    Int(Vec<i32>),
    Long(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Ref(Vec<Reference>),
}

fn arraycopy(interp: &mut Interpreter) -> Result<(), VmError> {
    let (length, dest_pos, dest_ref, src_pos, src_ref) = {
        let frame = interp.frame_mut();
        let length = frame.stack.pop_int();
        let dest_pos = frame.stack.pop_int();
        let dest_ref = frame.stack.pop_ref();
        let src_pos = frame.stack.pop_int();
        let src_ref = frame.stack.pop_ref();
        (length, dest_pos, dest_ref, src_pos, src_ref)
    };

    if src_ref.is_null() || dest_ref.is_null() {
        return Err(VmError::exception(NULL_POINTER_EXCEPTION));
    }
    let (src_id, dest_id) = match (&src_ref, &dest_ref) {
        (Reference::Array(s), Reference::Array(d)) => (*s, *d),
        _ => return Err(VmError::exception(ARRAY_STORE_EXCEPTION)),
    };

    let slice = interp
        .vm
        .heap
        .with_entry(src_id, |entry| {
            let HeapEntry::Array(arr) = entry else {
                return None;
            };
            if src_pos < 0 || length < 0 || src_pos + length > arr.len() {
                return None;
            }
            let (from, to) = (src_pos as usize, (src_pos + length) as usize);
            Some(match arr {
                Array::Int { data, .. } => CopySlice::Int(data[from..to].to_vec()),
                Array::Long(data) => CopySlice::Long(data[from..to].to_vec()),
                Array::Float(data) => CopySlice::Float(data[from..to].to_vec()),
                Array::Double(data) => CopySlice::Double(data[from..to].to_vec()),
                Array::Ref { data, .. } => CopySlice::Ref(data[from..to].to_vec()),
            })
        })
        .flatten()
        .ok_or_else(|| VmError::exception(crate::exception::ARRAY_INDEX_EXCEPTION))?;

    let copied = interp
        .vm
        .heap
        .with_entry(dest_id, |entry| {
            let HeapEntry::Array(arr) = entry else {
                return false;
            };
            if dest_pos < 0 || dest_pos + length > arr.len() {
                return false;
            }
            let from = dest_pos as usize;
            match (arr, slice) {
                (Array::Int { data, .. }, CopySlice::Int(src)) => {
                    data[from..from + src.len()].copy_from_slice(&src);
                }
                (Array::Long(data), CopySlice::Long(src)) => {
                    data[from..from + src.len()].copy_from_slice(&src);
                }
                (Array::Float(data), CopySlice::Float(src)) => {
                    data[from..from + src.len()].copy_from_slice(&src);
                }
                (Array::Double(data), CopySlice::Double(src)) => {
                    data[from..from + src.len()].copy_from_slice(&src);
                }
                (Array::Ref { data, .. }, CopySlice::Ref(src)) => {
                    data[from..from + src.len()].clone_from_slice(&src);
                }
                _ => return false,
            }
            true
        })
        .unwrap_or(false);

    if !copied {
        return Err(VmError::exception(crate::exception::ARRAY_INDEX_EXCEPTION));
    }
    Ok(())
}

fn identity_hash_code(interp: &mut Interpreter) -> Result<(), VmError> {
    let reference = interp.frame_mut().stack.pop_ref();
    let hash = match reference {
        Reference::Object(id) | Reference::Array(id) => id as i32,
        _ => 0,
    };
    interp.frame_mut().stack.push_int(hash);
    Ok(())
}

// =============== Thread natives ===============

fn current_thread(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.frame_mut().stack.push_ref(Reference::Host("Thread<main>"));
    Ok(())
}

fn thread_sleep(interp: &mut Interpreter) -> Result<(), VmError> {
    let millis = interp.frame_mut().stack.pop_long();
    if millis > 0 {
        std::thread::sleep(Duration::from_millis(millis as u64));
    }
    Ok(())
}

// =============== Math natives ===============

fn math_sqrt(interp: &mut Interpreter) -> Result<(), VmError> {
    let val = interp.frame_mut().stack.pop_double();
    // Newton iteration; negative input degrades to zero since NaN is
    // out of scope.
    let result = if val <= 0.0 {
        0.0
    } else {
        let mut x = val;
        for _ in 0..20 {
            x = (x + val / x) / 2.0;
        }
        x
    };
    interp.frame_mut().stack.push_double(result);
    Ok(())
}

fn math_abs_int(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let val = frame.stack.pop_int();
    frame.stack.push_int(val.wrapping_abs());
    Ok(())
}

fn math_abs_long(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let val = frame.stack.pop_long();
    frame.stack.push_long(val.wrapping_abs());
    Ok(())
}

fn math_max_int(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let b = frame.stack.pop_int();
    let a = frame.stack.pop_int();
    frame.stack.push_int(a.max(b));
    Ok(())
}

fn math_min_int(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let b = frame.stack.pop_int();
    let a = frame.stack.pop_int();
    frame.stack.push_int(a.min(b));
    Ok(())
}

// =============== String natives ===============

fn string_intern(interp: &mut Interpreter) -> Result<(), VmError> {
    let receiver = interp.frame_mut().stack.pop_ref();
    let result = match &receiver {
        Reference::Str(s) => Reference::Str(interp.vm.intern(s)),
        _ => receiver,
    };
    interp.frame_mut().stack.push_ref(result);
    Ok(())
}

// =============== Float/Double natives ===============

fn float_to_raw_int_bits(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let val = frame.stack.pop_float();
    frame.stack.push_int(val.to_bits() as i32);
    Ok(())
}

fn double_to_raw_long_bits(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let val = frame.stack.pop_double();
    frame.stack.push_long(val.to_bits() as i64);
    Ok(())
}

// =============== Runtime natives ===============

fn available_processors(interp: &mut Interpreter) -> Result<(), VmError> {
    // The interpreter is single-threaded.
    interp.frame_mut().stack.push_int(1);
    Ok(())
}

fn free_memory(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.frame_mut().stack.push_long(100 * 1024 * 1024);
    Ok(())
}

fn total_memory(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.frame_mut().stack.push_long(256 * 1024 * 1024);
    Ok(())
}

fn max_memory(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.frame_mut().stack.push_long(512 * 1024 * 1024);
    Ok(())
}

fn run_gc(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.collect_garbage();
    Ok(())
}

// =============== Event loop natives ===============

fn task_name(reference: &Reference, fallback: &str) -> String {
    match reference {
        Reference::Str(s) => s.to_string(),
        _ => fallback.to_string(),
    }
}

fn el_submit(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let name_ref = frame.stack.pop_ref();
    let task_id = frame.stack.pop_int();
    let name = task_name(&name_ref, "task");
    interp.vm.event_loop.submit(task_id, &name, TaskBody::Report);
    Ok(())
}

fn el_submit_runnable(interp: &mut Interpreter) -> Result<(), VmError> {
    let runnable = interp.frame_mut().stack.pop_ref();
    if runnable.is_null() {
        return Err(VmError::exception(NULL_POINTER_EXCEPTION));
    }
    let task_id = interp.vm.event_loop.stats().0 as i32 + 1;
    interp
        .vm
        .event_loop
        .submit(task_id, "lambda", TaskBody::Runnable(runnable));
    Ok(())
}

fn el_set_timeout(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let delay_ms = frame.stack.pop_long();
    let name_ref = frame.stack.pop_ref();
    let task_id = frame.stack.pop_int();
    let name = task_name(&name_ref, "timer");
    interp
        .vm
        .event_loop
        .set_timeout(task_id, &name, delay_ms, TaskBody::Report);
    Ok(())
}

fn el_set_timeout_runnable(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let delay_ms = frame.stack.pop_long();
    let runnable = frame.stack.pop_ref();
    if runnable.is_null() {
        return Err(VmError::exception(NULL_POINTER_EXCEPTION));
    }
    let task_id = interp.vm.event_loop.stats().1 as i32 + 100;
    interp.vm.event_loop.set_timeout(
        task_id,
        "timer-lambda",
        delay_ms,
        TaskBody::Runnable(runnable),
    );
    Ok(())
}

fn el_set_interval(interp: &mut Interpreter) -> Result<(), VmError> {
    let frame = interp.frame_mut();
    let period_ms = frame.stack.pop_long();
    let name_ref = frame.stack.pop_ref();
    let task_id = frame.stack.pop_int();
    let name = task_name(&name_ref, "interval");
    interp
        .vm
        .event_loop
        .set_interval(task_id, &name, period_ms, TaskBody::Report);
    Ok(())
}

fn el_run(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.run_event_loop(None)
}

fn el_run_for(interp: &mut Interpreter) -> Result<(), VmError> {
    let max_ms = interp.frame_mut().stack.pop_long();
    interp.run_event_loop(Some(Duration::from_millis(max_ms.max(0) as u64)))
}

fn el_stop(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.vm.event_loop.stop();
    Ok(())
}

fn el_is_running(interp: &mut Interpreter) -> Result<(), VmError> {
    let running = interp.vm.event_loop.is_running();
    interp.frame_mut().stack.push_int(i32::from(running));
    Ok(())
}

fn el_print_stats(interp: &mut Interpreter) -> Result<(), VmError> {
    let (tasks, timers) = interp.vm.event_loop.stats();
    let pending_tasks = interp.vm.event_loop.pending_tasks();
    let pending_timers = interp.vm.event_loop.pending_timers();
    interp.write_line("=== Event Loop Statistics ===");
    interp.write_line(&format!("Tasks Processed:  {tasks}"));
    interp.write_line(&format!("Timers Fired:     {timers}"));
    interp.write_line(&format!("Pending Tasks:    {pending_tasks}"));
    interp.write_line(&format!("Pending Timers:   {pending_timers}"));
    Ok(())
}

fn el_reset(interp: &mut Interpreter) -> Result<(), VmError> {
    interp.vm.event_loop.reset();
    Ok(())
}
