//! Method invocation: the static, virtual and special call forms.
//!
//! Statics consult the native registry first. Virtual calls dispatch
//! on the receiver's runtime class, with the `java/io/PrintStream`
//! println/print intercept routing to the console sink without a
//! frame. Special calls resolve against the named class and absorb
//! constructors whose class cannot be executed.
use crate::bytecode::OPCode;
use crate::descriptor::{count_args, parse_arg_types};
use crate::error::VmError;
use crate::exception::NULL_POINTER_EXCEPTION;
use crate::value::{Reference, Value};

use super::Interpreter;

impl Interpreter {
    pub(crate) fn execute_invoke(&mut self, op: OPCode) -> Result<(), VmError> {
        match op {
            OPCode::InvokeStatic => {
                let index = self.frame_mut().read_u16();
                let (class_name, method_name, descriptor) = self.method_ref_parts(index)?;
                self.invoke_static(&class_name, &method_name, &descriptor)
            }
            OPCode::InvokeVirtual => {
                let index = self.frame_mut().read_u16();
                let (class_name, method_name, descriptor) = self.method_ref_parts(index)?;
                self.invoke_virtual(&class_name, &method_name, &descriptor)
            }
            OPCode::InvokeSpecial => {
                let index = self.frame_mut().read_u16();
                let (class_name, method_name, descriptor) = self.method_ref_parts(index)?;
                self.invoke_special(&class_name, &method_name, &descriptor)
            }
            other => Err(VmError::Internal(format!(
                "{other} reached the invoke handler"
            ))),
        }
    }

    fn invoke_static(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
    ) -> Result<(), VmError> {
        if let Some(native) = self.vm.natives.lookup(class_name, method_name, descriptor) {
            return native(self);
        }

        let target = self
            .find_class(class_name)
            .ok_or_else(|| VmError::ClassNotFound(class_name.to_string()))?;
        let mut callee = self
            .new_frame(target, method_name, descriptor)
            .ok_or_else(|| {
                VmError::MethodNotFound(format!("{class_name}.{method_name}{descriptor}"))
            })?;

        // Arguments pop right-to-left and land in locals from slot 0.
        let arg_count = parse_arg_types(descriptor).len();
        let mut trace_args = vec![0i32; arg_count];
        {
            let frame = self.frame_mut();
            for j in (0..arg_count).rev() {
                let value = frame.stack.pop();
                trace_args[j] = value.as_int();
                callee.locals.set(j, value);
            }
        }

        self.frames.push(callee);
        self.trace_call(method_name, &trace_args);
        Ok(())
    }

    fn invoke_virtual(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
    ) -> Result<(), VmError> {
        // Console-output intercept: the only built-in class method
        // recognised by name.
        if class_name == "java/io/PrintStream" {
            if method_name == "println" {
                return self.handle_println(descriptor);
            }
            if method_name == "print" {
                return self.handle_print(descriptor);
            }
        }

        // Instance natives (String.intern and friends) pop their own
        // receiver.
        if let Some(native) = self.vm.natives.lookup(class_name, method_name, descriptor) {
            return native(self);
        }

        let arg_count = count_args(descriptor);
        let mut args = vec![Value::Int(0); arg_count];
        let receiver = {
            let frame = self.frame_mut();
            for j in (0..arg_count).rev() {
                args[j] = frame.stack.pop();
            }
            frame.stack.pop_ref()
        };

        if receiver.is_null() {
            return Err(VmError::exception(NULL_POINTER_EXCEPTION));
        }
        let Reference::Object(id) = &receiver else {
            return Err(VmError::Internal(format!(
                "invokevirtual {class_name}.{method_name} on non-object receiver: {receiver}"
            )));
        };

        // Dispatch on the receiver's runtime class.
        let class = self
            .vm
            .heap
            .object_class(*id)
            .ok_or_else(|| VmError::Internal(format!("receiver vanished: obj@{id}")))?;
        let mut callee = self
            .new_frame(class.clone(), method_name, descriptor)
            .ok_or_else(|| {
                VmError::MethodNotFound(format!(
                    "{}.{method_name}{descriptor}",
                    class.class_name()
                ))
            })?;

        callee.locals.set_ref(0, receiver);
        for (j, value) in args.into_iter().enumerate() {
            callee.locals.set(j + 1, value);
        }

        self.frames.push(callee);
        self.trace_call(method_name, &[]);
        Ok(())
    }

    fn invoke_special(
        &mut self,
        class_name: &str,
        method_name: &str,
        descriptor: &str,
    ) -> Result<(), VmError> {
        if let Some(target) = self.find_class(class_name) {
            if let Some(mut callee) = self.new_frame(target, method_name, descriptor) {
                let arg_count = parse_arg_types(descriptor).len();
                {
                    let frame = self.frame_mut();
                    for j in (0..arg_count).rev() {
                        let value = frame.stack.pop();
                        callee.locals.set(j + 1, value);
                    }
                    let receiver = frame.stack.pop_ref();
                    callee.locals.set_ref(0, receiver);
                }
                self.frames.push(callee);
                return Ok(());
            }
        }

        // Constructors on classes we cannot load or execute are
        // absorbed: drop the arguments and the receiver.
        if method_name == "<init>" {
            let frame = self.frame_mut();
            for _ in 0..count_args(descriptor) {
                frame.stack.pop();
            }
            frame.stack.pop_ref();
            return Ok(());
        }

        Err(VmError::MethodNotFound(format!(
            "invokespecial {class_name}.{method_name}{descriptor}"
        )))
    }
}
