//! Object instructions: static and instance fields, allocation, type
//! checks, monitors and athrow.
use std::sync::Arc;

use crate::bytecode::OPCode;
use crate::error::VmError;
use crate::exception::NULL_POINTER_EXCEPTION;
use crate::heap::HeapEntry;
use crate::monitor::MonitorKey;
use crate::object::Object;
use crate::value::{Reference, Value};

use super::Interpreter;

impl Interpreter {
    pub(crate) fn execute_object(&mut self, op: OPCode) -> Result<(), VmError> {
        match op {
            OPCode::GetStatic => {
                let index = self.frame_mut().read_u16();
                let (class_name, field_name, descriptor) = self.field_ref_parts(index)?;

                // The console object is the one well-known static.
                if class_name == "java/lang/System" && field_name == "out" {
                    self.frame_mut().stack.push_ref(Reference::Host("System.out"));
                    return Ok(());
                }

                let key = format!("{class_name}.{field_name}");
                let value = self.vm.get_static(&key, &descriptor);
                self.frame_mut().stack.push(value);
                Ok(())
            }

            OPCode::PutStatic => {
                let index = self.frame_mut().read_u16();
                let (class_name, field_name, _descriptor) = self.field_ref_parts(index)?;
                let value = self.frame_mut().stack.pop();
                let key = format!("{class_name}.{field_name}");
                self.vm.set_static(&key, value);
                Ok(())
            }

            OPCode::GetField => {
                let index = self.frame_mut().read_u16();
                let (_, field_name, descriptor) = self.field_ref_parts(index)?;
                let obj_ref = self.frame_mut().stack.pop_ref();
                let id = self.expect_object(&obj_ref)?;

                let value = self
                    .vm
                    .heap
                    .with_entry(id, |entry| {
                        let HeapEntry::Object(obj) = entry else {
                            return Value::Int(0);
                        };
                        match descriptor.as_bytes().first() {
                            Some(b'B' | b'C' | b'I' | b'S' | b'Z') => {
                                Value::Int(obj.get_field_int(&field_name))
                            }
                            Some(b'J') => Value::Long(obj.get_field_long(&field_name)),
                            Some(b'F') => Value::Float(obj.get_field_float(&field_name)),
                            Some(b'D') => Value::Double(obj.get_field_double(&field_name)),
                            _ => Value::Ref(obj.get_field_ref(&field_name)),
                        }
                    })
                    .ok_or_else(|| {
                        VmError::Internal(format!("getfield on missing object obj@{id}"))
                    })?;

                self.frame_mut().stack.push(value);
                Ok(())
            }

            OPCode::PutField => {
                let index = self.frame_mut().read_u16();
                let (_, field_name, descriptor) = self.field_ref_parts(index)?;
                let (value, obj_ref) = {
                    let frame = self.frame_mut();
                    (frame.stack.pop(), frame.stack.pop_ref())
                };
                let id = self.expect_object(&obj_ref)?;

                self.vm.heap.with_entry(id, |entry| {
                    if let HeapEntry::Object(obj) = entry {
                        match descriptor.as_bytes().first() {
                            Some(b'B' | b'C' | b'I' | b'S' | b'Z') => {
                                obj.set_field_int(&field_name, value.as_int());
                            }
                            Some(b'J') => obj.set_field_long(&field_name, value.as_long()),
                            Some(b'F') => obj.set_field_float(&field_name, value.as_float()),
                            Some(b'D') => obj.set_field_double(&field_name, value.as_double()),
                            _ => obj.set_field_ref(&field_name, value.as_ref_value()),
                        }
                    }
                });
                Ok(())
            }

            OPCode::New => {
                let index = self.frame_mut().read_u16();
                let class = Arc::clone(&self.frame_mut().class);
                let class_name = class.constant_pool.get_class_name(index).to_string();

                match self.find_class(&class_name) {
                    Some(cf) => {
                        let id = self.vm.heap.alloc(HeapEntry::Object(Object::new(cf)));
                        self.frame_mut().stack.push_ref(Reference::Object(id));
                        self.maybe_collect();
                    }
                    None => {
                        // System classes without an image degrade to a
                        // bare class token.
                        let token = self.vm.intern(&class_name);
                        self.frame_mut().stack.push_ref(Reference::Class(token));
                    }
                }
                Ok(())
            }

            OPCode::CheckCast => {
                let index = self.frame_mut().read_u16();
                let class = Arc::clone(&self.frame_mut().class);
                let target = class.constant_pool.get_class_name(index).to_string();
                let obj_ref = self.frame_mut().stack.pop_ref();

                if !obj_ref.is_null() {
                    let actual = self.class_name_of(&obj_ref);
                    if actual != target && target != "java/lang/Object" {
                        log::warn!("checkcast: {actual} is not a {target}");
                    }
                }
                self.frame_mut().stack.push_ref(obj_ref);
                Ok(())
            }

            OPCode::InstanceOf => {
                let index = self.frame_mut().read_u16();
                let class = Arc::clone(&self.frame_mut().class);
                let target = class.constant_pool.get_class_name(index).to_string();
                let obj_ref = self.frame_mut().stack.pop_ref();

                // null is never an instance of anything.
                let result = if obj_ref.is_null() {
                    0
                } else {
                    let actual = self.class_name_of(&obj_ref);
                    i32::from(actual == target || target == "java/lang/Object")
                };
                self.frame_mut().stack.push_int(result);
                Ok(())
            }

            OPCode::MonitorEnter => {
                let obj_ref = self.frame_mut().stack.pop_ref();
                if obj_ref.is_null() {
                    return Err(VmError::exception(NULL_POINTER_EXCEPTION));
                }
                if let Some(key) = MonitorKey::for_reference(&obj_ref) {
                    let monitor = self.vm.monitors.monitor_for(key);
                    monitor.enter(self.thread_id());
                }
                Ok(())
            }

            OPCode::MonitorExit => {
                let obj_ref = self.frame_mut().stack.pop_ref();
                if obj_ref.is_null() {
                    return Err(VmError::exception(NULL_POINTER_EXCEPTION));
                }
                if let Some(key) = MonitorKey::for_reference(&obj_ref) {
                    let monitor = self.vm.monitors.monitor_for(key);
                    monitor.exit(self.thread_id())?;
                }
                Ok(())
            }

            OPCode::AThrow => {
                let exception = self.frame_mut().stack.pop_ref();
                if exception.is_null() {
                    return Err(VmError::exception(NULL_POINTER_EXCEPTION));
                }
                let class_name = self.class_name_of(&exception);
                Err(VmError::thrown(exception, class_name))
            }

            other => Err(VmError::Internal(format!(
                "{other} reached the object handler"
            ))),
        }
    }

    fn expect_object(&self, reference: &Reference) -> Result<u64, VmError> {
        match reference {
            Reference::Object(id) => Ok(*id),
            Reference::Null => Err(VmError::exception(NULL_POINTER_EXCEPTION)),
            other => Err(VmError::Internal(format!(
                "expected an object reference, got {other}"
            ))),
        }
    }
}
