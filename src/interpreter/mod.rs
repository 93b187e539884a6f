//! The bytecode interpreter: one fetch/decode/execute loop per
//! thread, per-category instruction handlers, structured exception
//! propagation, and the callback bridge that lets natives run a
//! method on an object and return when its frame retires.
//!
//! Handlers are split by opcode category:
//!   - consts.rs: constant-pushing instructions (iconst, ldc, ...)
//!   - loads.rs / stores.rs: local-variable transfers
//!   - math.rs: arithmetic, bitwise, stack ops, conversions
//!   - control.rs: branches and returns
//!   - arrays.rs: array allocation and element access
//!   - objects.rs: fields, new, type checks, monitors, athrow
//!   - invoke.rs: the three call forms
mod arrays;
mod consts;
mod control;
mod invoke;
mod loads;
mod math;
mod objects;
mod stores;

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::bytecode::{Category, OPCode};
use crate::classfile::{ClassFile, ConstantPool, CpInfo};
use crate::error::VmError;
use crate::eventloop::{Task, TaskBody, TimerTask, POLL_INTERVAL};
use crate::exception::find_exception_handler;
use crate::frame::Frame;
use crate::heap::HeapEntry;
use crate::value::{Reference, Value};
use crate::vm::Vm;

/// The bytecode interpreter for one thread.
pub struct Interpreter {
    pub vm: Arc<Vm>,
    pub(crate) frames: Vec<Frame>,
    thread_id: i64,
    verbose: bool,
    debug: bool,
    trace: bool,
    trace_method: String,
    out: Box<dyn Write + Send>,
}

impl Interpreter {
    pub fn new(vm: Arc<Vm>) -> Interpreter {
        let thread_id = vm.next_thread_id();
        Interpreter {
            vm,
            frames: Vec::with_capacity(32),
            thread_id,
            verbose: false,
            debug: false,
            trace: false,
            trace_method: String::new(),
            out: Box::new(std::io::stdout()),
        }
    }

    /// Print every executed instruction.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Print frame state (locals and operand stack) per instruction.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// Trace calls and returns, filtered to one method name.
    pub fn set_trace(&mut self, method_name: &str) {
        self.trace = true;
        self.trace_method = method_name.to_string();
    }

    /// Redirect the console-output sink (used by tests).
    pub fn set_output(&mut self, out: Box<dyn Write + Send>) {
        self.out = out;
    }

    pub fn thread_id(&self) -> i64 {
        self.thread_id
    }

    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push_frame(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn frame_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("no active frame")
    }

    pub(crate) fn write_line(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    pub(crate) fn write_raw(&mut self, text: &str) {
        let _ = write!(self.out, "{text}");
        let _ = self.out.flush();
    }

    /// Run the `main` method of a class.
    pub fn execute(&mut self, cf: ClassFile) -> Result<(), VmError> {
        let class_name = cf.class_name().to_string();
        let cf = Arc::new(cf);
        self.vm.load_class(&class_name, cf.clone());

        if self.debug {
            self.print_constant_pool(&cf.constant_pool);
        }

        let mut frame = self
            .new_frame(cf, "main", "([Ljava/lang/String;)V")
            .ok_or_else(|| VmError::MethodNotFound(format!("{class_name}.main")))?;
        frame.locals.set_ref(0, Reference::Null); // args placeholder
        self.frames.push(frame);
        self.run()
    }

    /// Run a specific method of a class.
    pub fn execute_method(
        &mut self,
        cf: ClassFile,
        method_name: &str,
        descriptor: &str,
    ) -> Result<(), VmError> {
        let class_name = cf.class_name().to_string();
        let cf = Arc::new(cf);
        self.vm.load_class(&class_name, cf.clone());

        let frame = self
            .new_frame(cf, method_name, descriptor)
            .ok_or_else(|| VmError::MethodNotFound(format!("{class_name}.{method_name}")))?;
        self.frames.push(frame);
        self.run()
    }

    fn run(&mut self) -> Result<(), VmError> {
        while self.step()? {}
        Ok(())
    }

    /// One iteration of the dispatch loop. Returns false once the
    /// frame stack is empty.
    fn step(&mut self) -> Result<bool, VmError> {
        let fetched = match self.frames.last_mut() {
            None => return Ok(false),
            Some(frame) => {
                if frame.pc >= frame.code.code.len() {
                    None
                } else {
                    let pc = frame.pc;
                    Some((pc, frame.read_u8()))
                }
            }
        };
        // A frame whose pc ran past the end of code retires.
        let Some((insn_pc, opcode)) = fetched else {
            self.frames.pop();
            return Ok(true);
        };

        let Some(op) = OPCode::from_u8(opcode) else {
            return Err(VmError::UnknownOpcode {
                opcode,
                pc: insn_pc,
            });
        };

        if self.debug {
            self.print_frame_debug(insn_pc, op);
        } else if self.verbose {
            let method_name = self
                .frames
                .last()
                .map(|f| f.method_name.clone())
                .unwrap_or_default();
            self.write_line(&format!(
                "[{method_name}] PC={insn_pc} opcode=0x{opcode:02X} {op}"
            ));
        }

        match self.execute_op(op, insn_pc) {
            Ok(()) => Ok(true),
            Err(VmError::Exception {
                reference,
                class_name,
            }) => {
                self.dispatch_exception(reference, &class_name)?;
                Ok(true)
            }
            Err(err) => Err(err),
        }
    }

    fn execute_op(&mut self, op: OPCode, insn_pc: usize) -> Result<(), VmError> {
        match op.category() {
            Category::Const => self.execute_const(op),
            Category::Load => self.execute_load(op),
            Category::Store => self.execute_store(op),
            Category::Math => self.execute_math(op),
            Category::Control => self.execute_control(op, insn_pc),
            Category::Array => self.execute_array(op),
            Category::Object => self.execute_object(op),
            Category::Invoke => self.execute_invoke(op),
        }
    }

    /// Unwind-and-handler-search. Walks frames from the top; on a
    /// match installs the handler pc, clears the operand stack and
    /// pushes the exception reference. An empty stack means the
    /// exception was never caught.
    fn dispatch_exception(
        &mut self,
        exception: Reference,
        class_name: &str,
    ) -> Result<(), VmError> {
        while let Some(frame) = self.frames.last_mut() {
            // The pc sits just past the raising instruction's bytes;
            // step back inside it for the range check.
            let raising_pc = frame.pc.saturating_sub(1);
            let handler = find_exception_handler(
                &frame.code,
                &frame.class.constant_pool,
                raising_pc,
                class_name,
            );
            if let Some(handler_pc) = handler {
                frame.pc = handler_pc;
                frame.stack.clear();
                frame.stack.push_ref(exception);
                return Ok(());
            }
            self.frames.pop();
        }
        Err(VmError::UncaughtException {
            class_name: class_name.to_string(),
        })
    }

    // ---- resolution helpers ----

    /// Find a class image: the cache first, then the current frame's
    /// own class, then the external lazy loader.
    pub(crate) fn find_class(&self, name: &str) -> Option<Arc<ClassFile>> {
        if let Some(cf) = self.vm.get_class(name) {
            return Some(cf);
        }
        if let Some(frame) = self.frames.last() {
            if frame.class.class_name() == name {
                return Some(frame.class.clone());
            }
        }
        self.vm.load_from_loader(name)
    }

    /// Build a frame for `class.method`; `None` when the method does
    /// not exist or has no code.
    pub(crate) fn new_frame(
        &self,
        class: Arc<ClassFile>,
        method_name: &str,
        descriptor: &str,
    ) -> Option<Frame> {
        let method = class.find_method(method_name, descriptor)?;
        let code = method.code_attribute()?;
        Some(Frame::new(class.clone(), method_name, descriptor, Arc::new(code)))
    }

    pub(crate) fn method_ref_parts(
        &self,
        index: u16,
    ) -> Result<(String, String, String), VmError> {
        let frame = self
            .frames
            .last()
            .ok_or_else(|| VmError::Internal("no active frame".to_string()))?;
        let cp = &frame.class.constant_pool;
        match cp.get(index) {
            Some(
                CpInfo::MethodRef {
                    class_index,
                    name_and_type_index,
                }
                | CpInfo::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                },
            ) => {
                let class_name = cp.get_class_name(*class_index).to_string();
                let (name, descriptor) = cp.get_name_and_type(*name_and_type_index);
                Ok((class_name, name.to_string(), descriptor.to_string()))
            }
            other => Err(VmError::Internal(format!(
                "constant #{index} is not a method reference: {other:?}"
            ))),
        }
    }

    pub(crate) fn field_ref_parts(&self, index: u16) -> Result<(String, String, String), VmError> {
        let frame = self
            .frames
            .last()
            .ok_or_else(|| VmError::Internal("no active frame".to_string()))?;
        let cp = &frame.class.constant_pool;
        match cp.get(index) {
            Some(CpInfo::FieldRef {
                class_index,
                name_and_type_index,
            }) => {
                let class_name = cp.get_class_name(*class_index).to_string();
                let (name, descriptor) = cp.get_name_and_type(*name_and_type_index);
                Ok((class_name, name.to_string(), descriptor.to_string()))
            }
            other => Err(VmError::Internal(format!(
                "constant #{index} is not a field reference: {other:?}"
            ))),
        }
    }

    /// Class name of a reference, for type checks and exception
    /// matching.
    pub(crate) fn class_name_of(&self, reference: &Reference) -> String {
        match reference {
            Reference::Object(id) => self
                .vm
                .heap
                .object_class(*id)
                .map(|c| c.class_name().to_string())
                .unwrap_or_default(),
            Reference::Array(id) => self
                .vm
                .heap
                .with_entry(*id, |entry| match entry {
                    HeapEntry::Array(arr) => arr.type_descriptor(),
                    _ => String::new(),
                })
                .unwrap_or_default(),
            Reference::Str(_) => "java/lang/String".to_string(),
            Reference::Class(name) => name.to_string(),
            Reference::Null | Reference::Host(_) => String::new(),
        }
    }

    // ---- garbage collection ----

    /// Collect when the heap's size threshold has been crossed. Called
    /// after allocation sites, with the new object already rooted on
    /// the operand stack.
    pub(crate) fn maybe_collect(&mut self) {
        if self.vm.heap.should_collect() {
            self.collect_garbage();
        }
    }

    /// Mark-sweep over static references and every frame.
    pub fn collect_garbage(&mut self) {
        let roots = self.vm.static_roots();
        self.vm.heap.collect(&roots, &self.frames);
    }

    // ---- callback bridge ----

    /// Invoke a method on an object and run the interpreter until the
    /// pushed frame has retired; the frame-stack depth at return
    /// equals the depth at entry.
    pub fn invoke_method(
        &mut self,
        obj: Reference,
        method_name: &str,
        descriptor: &str,
    ) -> Result<(), VmError> {
        let Reference::Object(id) = &obj else {
            return Err(VmError::Internal(format!(
                "callback target is not an object: {obj}"
            )));
        };
        let class = self
            .vm
            .heap
            .object_class(*id)
            .ok_or_else(|| VmError::Internal(format!("callback target vanished: obj@{id}")))?;
        let mut frame = self
            .new_frame(class.clone(), method_name, descriptor)
            .ok_or_else(|| {
                VmError::MethodNotFound(format!(
                    "{}.{method_name}{descriptor}",
                    class.class_name()
                ))
            })?;
        frame.locals.set_ref(0, obj);

        let entry_depth = self.frames.len();
        self.frames.push(frame);
        self.run_until_depth(entry_depth)
    }

    /// `run ()V` on a host object.
    pub fn invoke_runnable(&mut self, runnable: Reference) -> Result<(), VmError> {
        self.invoke_method(runnable, "run", "()V")
    }

    fn run_until_depth(&mut self, depth: usize) -> Result<(), VmError> {
        while self.frames.len() > depth {
            if !self.step()? {
                break;
            }
        }
        Ok(())
    }

    // ---- event loop ----

    /// Drive the event loop on this thread until both queues drain,
    /// `stop()` is requested, or `max_duration` elapses. Timer and
    /// task bodies carrying host objects re-enter the interpreter
    /// through the callback bridge.
    pub fn run_event_loop(&mut self, max_duration: Option<Duration>) -> Result<(), VmError> {
        if !self.vm.event_loop.begin_run() {
            return Ok(());
        }
        let started = Instant::now();
        self.event_loop_ticks(max_duration, started);
        self.vm.event_loop.end_run();
        Ok(())
    }

    fn event_loop_ticks(&mut self, max_duration: Option<Duration>, started: Instant) {
        loop {
            if self.vm.event_loop.stop_requested() {
                return;
            }
            if let Some(max) = max_duration {
                if started.elapsed() >= max {
                    return;
                }
            }

            // Fire every timer whose deadline has passed.
            let now = Instant::now();
            while let Some(mut timer) = self.vm.event_loop.take_ready_timer(now) {
                self.vm.event_loop.count_timer();
                timer.ticks += 1;
                self.fire_timer(&timer);
                self.vm.event_loop.reschedule(timer);
                if self.vm.event_loop.stop_requested() {
                    return;
                }
            }

            // Then at most one queued task per tick.
            if let Some(task) = self.vm.event_loop.take_task() {
                self.vm.event_loop.count_task();
                self.run_task(&task);
                continue;
            }

            if self.vm.event_loop.is_idle() {
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn fire_timer(&mut self, timer: &TimerTask) {
        match &timer.body {
            TaskBody::Report => {
                let line = if timer.interval.is_some() {
                    format!("[{}] Interval {} tick #{}", timer.name, timer.id, timer.ticks)
                } else {
                    format!(
                        "[{}] Timer {} fired after {}ms",
                        timer.name, timer.id, timer.delay_ms
                    )
                };
                self.write_line(&line);
            }
            TaskBody::Runnable(obj) => {
                if let Err(err) = self.invoke_runnable(obj.clone()) {
                    let name = timer.name.clone();
                    self.write_line(&format!("[{name}] Error executing runnable: {err}"));
                }
            }
        }
    }

    fn run_task(&mut self, task: &Task) {
        match &task.body {
            TaskBody::Report => {
                self.write_line(&format!("[{}] Task {} executing", task.name, task.id));
            }
            TaskBody::Runnable(obj) => {
                if let Err(err) = self.invoke_runnable(obj.clone()) {
                    let name = task.name.clone();
                    self.write_line(&format!("[{name}] Error executing runnable: {err}"));
                }
            }
        }
    }

    // ---- console intercept ----

    /// `java/io/PrintStream.println(...)`: pop per the descriptor and
    /// write one line to the console sink. The receiver sits beneath
    /// the argument.
    pub(crate) fn handle_println(&mut self, descriptor: &str) -> Result<(), VmError> {
        let line = self.pop_print_argument(descriptor);
        self.write_line(&line);
        Ok(())
    }

    /// `java/io/PrintStream.print(...)`: same, without the newline.
    pub(crate) fn handle_print(&mut self, descriptor: &str) -> Result<(), VmError> {
        let text = self.pop_print_argument(descriptor);
        self.write_raw(&text);
        Ok(())
    }

    fn pop_print_argument(&mut self, descriptor: &str) -> String {
        let frame = self.frame_mut();
        match descriptor {
            "()V" => {
                frame.stack.pop_ref();
                String::new()
            }
            "(I)V" => {
                let val = frame.stack.pop_int();
                frame.stack.pop_ref();
                val.to_string()
            }
            "(J)V" => {
                let val = frame.stack.pop_long();
                frame.stack.pop_ref();
                val.to_string()
            }
            "(Z)V" => {
                let val = frame.stack.pop_int();
                frame.stack.pop_ref();
                (if val != 0 { "true" } else { "false" }).to_string()
            }
            "(C)V" => {
                let val = frame.stack.pop_int();
                frame.stack.pop_ref();
                char::from_u32(val as u32).unwrap_or('?').to_string()
            }
            "(Ljava/lang/String;)V" | "(Ljava/lang/Object;)V" => {
                let val = frame.stack.pop_ref();
                frame.stack.pop_ref();
                match val {
                    Reference::Str(s) => s.to_string(),
                    other => other.to_string(),
                }
            }
            _ => {
                frame.stack.pop();
                frame.stack.pop_ref();
                "<unknown println>".to_string()
            }
        }
    }

    // ---- tracing and debug printing ----

    pub(crate) fn trace_call(&mut self, method_name: &str, args: &[i32]) {
        if !self.trace {
            return;
        }
        if !self.trace_method.is_empty() && self.trace_method != method_name {
            return;
        }
        let indent = "  ".repeat(self.frames.len().saturating_sub(1));
        let args_str = args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        self.write_line(&format!("{indent}→ {method_name}({args_str})"));
    }

    pub(crate) fn trace_return(&mut self, method_name: &str, value: i32, has_return: bool) {
        if !self.trace {
            return;
        }
        if !self.trace_method.is_empty() && self.trace_method != method_name {
            return;
        }
        let indent = "  ".repeat(self.frames.len());
        if has_return {
            self.write_line(&format!("{indent}← {method_name} = {value}"));
        } else {
            self.write_line(&format!("{indent}← {method_name}"));
        }
    }

    fn format_reference(&self, reference: &Reference) -> String {
        match reference {
            Reference::Null => "null".to_string(),
            Reference::Str(s) => {
                if s.len() > 15 {
                    format!("\"{}...\"", &s[..12])
                } else {
                    format!("\"{s}\"")
                }
            }
            Reference::Object(id) => {
                let name = self
                    .vm
                    .heap
                    .object_class(*id)
                    .map(|c| c.class_name().to_string())
                    .unwrap_or_default();
                let short = name.rsplit('/').next().unwrap_or("?").to_string();
                format!("<{short}>")
            }
            Reference::Array(id) => {
                let len = self
                    .vm
                    .heap
                    .with_entry(*id, |entry| match entry {
                        HeapEntry::Array(arr) => arr.len(),
                        _ => 0,
                    })
                    .unwrap_or(0);
                format!("arr[{len}]")
            }
            Reference::Class(name) => format!("class<{name}>"),
            Reference::Host(token) => token.to_string(),
        }
    }

    fn format_slot(&self, value: &Value) -> String {
        match value {
            Value::Int(v) => v.to_string(),
            Value::Long(v) => format!("{v}L"),
            Value::Float(v) => format!("{v}f"),
            Value::Double(v) => format!("{v}d"),
            Value::Ref(r) => self.format_reference(r),
        }
    }

    fn print_frame_debug(&mut self, pc: usize, op: OPCode) {
        let Some(frame) = self.frames.last() else {
            return;
        };
        let header = format!("─ {}.{} ", frame.class.class_name(), frame.method_name);
        let mut lines = Vec::new();
        lines.push(format!("┌{header}{}", "─".repeat(60usize.saturating_sub(header.len()))));
        lines.push(format!("│ PC={pc:<3}  {}", op.mnemonic()));

        let mut locals = Vec::new();
        for (i, slot) in frame.locals.slots().iter().enumerate().take(8) {
            locals.push(format!("[{i}]={}", self.format_slot(slot)));
        }
        if frame.locals.len() > 8 {
            locals.push("...".to_string());
        }
        lines.push(format!(
            "│ Locals: {}",
            if locals.is_empty() {
                "(none)".to_string()
            } else {
                locals.join(", ")
            }
        ));

        let mut stack = Vec::new();
        for i in 0..frame.stack.size() {
            if let Some(slot) = frame.stack.peek(i) {
                stack.push(self.format_slot(slot));
            }
        }
        lines.push(format!("│ Stack:  [{}]", stack.join(", ")));
        lines.push(format!("└{}", "─".repeat(60)));

        for line in lines {
            self.write_line(&line);
        }
    }

    /// Pretty-print a constant pool, skipping the unusable slots.
    pub fn print_constant_pool(&mut self, cp: &ConstantPool) {
        let mut lines = Vec::new();
        lines.push("┌─ Constant Pool ─────────────────────────────".to_string());
        for index in 1..cp.len() as u16 {
            let desc = match cp.get(index) {
                Some(CpInfo::Utf8 { value }) => format!("Utf8          \"{value}\""),
                Some(CpInfo::Integer { value }) => format!("Integer       {value}"),
                Some(CpInfo::Float { bits }) => format!("Float         {:#X}", bits),
                Some(CpInfo::Long { value }) => format!("Long          {value}"),
                Some(CpInfo::Double { bits }) => format!("Double        {:#X}", bits),
                Some(CpInfo::Class { name_index }) => {
                    format!("Class         #{name_index} → {}", cp.get_utf8(*name_index))
                }
                Some(CpInfo::String { string_index }) => {
                    format!("String        #{string_index} → \"{}\"", cp.get_utf8(*string_index))
                }
                Some(CpInfo::FieldRef {
                    class_index,
                    name_and_type_index,
                }) => {
                    let (name, descriptor) = cp.get_name_and_type(*name_and_type_index);
                    format!(
                        "Fieldref      {}.{name}:{descriptor}",
                        cp.get_class_name(*class_index)
                    )
                }
                Some(CpInfo::MethodRef {
                    class_index,
                    name_and_type_index,
                }) => {
                    let (name, descriptor) = cp.get_name_and_type(*name_and_type_index);
                    format!(
                        "Methodref     {}.{name}{descriptor}",
                        cp.get_class_name(*class_index)
                    )
                }
                Some(CpInfo::InterfaceMethodRef {
                    class_index,
                    name_and_type_index,
                }) => {
                    let (name, descriptor) = cp.get_name_and_type(*name_and_type_index);
                    format!(
                        "InterfaceRef  {}.{name}{descriptor}",
                        cp.get_class_name(*class_index)
                    )
                }
                Some(CpInfo::NameAndType {
                    name_index,
                    descriptor_index,
                }) => format!(
                    "NameAndType   {}:{}",
                    cp.get_utf8(*name_index),
                    cp.get_utf8(*descriptor_index)
                ),
                Some(CpInfo::Unusable) | None => continue,
                Some(other) => format!("{other:?}"),
            };
            lines.push(format!("│ #{index:<3}  {desc}"));
        }
        lines.push("└─────────────────────────────────────────────".to_string());
        for line in lines {
            self.write_line(&line);
        }
    }
}
