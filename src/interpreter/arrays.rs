//! Array instructions: allocation, element loads and stores, and
//! arraylength. Every element access null-checks the array reference
//! and bounds-checks the index.
use std::sync::Arc;

use crate::bytecode::OPCode;
use crate::error::VmError;
use crate::exception::{
    ARRAY_INDEX_EXCEPTION, NEGATIVE_ARRAY_SIZE_EXCEPTION, NULL_POINTER_EXCEPTION,
};
use crate::heap::HeapEntry;
use crate::object::{Array, ArrayKind};
use crate::value::{Reference, Value};

use super::Interpreter;

impl Interpreter {
    pub(crate) fn execute_array(&mut self, op: OPCode) -> Result<(), VmError> {
        match op {
            OPCode::IALoad
            | OPCode::LALoad
            | OPCode::FALoad
            | OPCode::DALoad
            | OPCode::AALoad
            | OPCode::BALoad
            | OPCode::CALoad
            | OPCode::SALoad => self.array_load(op),

            OPCode::IAStore
            | OPCode::LAStore
            | OPCode::FAStore
            | OPCode::DAStore
            | OPCode::AAStore
            | OPCode::BAStore
            | OPCode::CAStore
            | OPCode::SAStore => self.array_store(op),

            OPCode::NewArray => {
                let atype = self.frame_mut().read_u8();
                let count = self.frame_mut().stack.pop_int();
                if count < 0 {
                    return Err(VmError::exception(NEGATIVE_ARRAY_SIZE_EXCEPTION));
                }
                let kind = ArrayKind::from_atype(atype)
                    .ok_or_else(|| VmError::Internal(format!("bad newarray type byte {atype}")))?;
                let id = self
                    .vm
                    .heap
                    .alloc(HeapEntry::Array(Array::primitive(kind, count)));
                self.frame_mut().stack.push_ref(Reference::Array(id));
                self.maybe_collect();
                Ok(())
            }

            OPCode::ANewArray => {
                let index = self.frame_mut().read_u16();
                let class = Arc::clone(&self.frame_mut().class);
                let class_name = class.constant_pool.get_class_name(index).to_string();
                let count = self.frame_mut().stack.pop_int();
                if count < 0 {
                    return Err(VmError::exception(NEGATIVE_ARRAY_SIZE_EXCEPTION));
                }
                let id = self
                    .vm
                    .heap
                    .alloc(HeapEntry::Array(Array::reference(&class_name, count)));
                self.frame_mut().stack.push_ref(Reference::Array(id));
                self.maybe_collect();
                Ok(())
            }

            OPCode::ArrayLength => {
                let array_ref = self.frame_mut().stack.pop_ref();
                let id = self.expect_array(&array_ref)?;
                let length = self
                    .vm
                    .heap
                    .with_entry(id, |entry| match entry {
                        HeapEntry::Array(arr) => arr.len(),
                        _ => 0,
                    })
                    .unwrap_or(0);
                self.frame_mut().stack.push_int(length);
                Ok(())
            }

            other => Err(VmError::Internal(format!(
                "{other} reached the array handler"
            ))),
        }
    }

    fn array_load(&mut self, op: OPCode) -> Result<(), VmError> {
        let (index, array_ref) = {
            let frame = self.frame_mut();
            (frame.stack.pop_int(), frame.stack.pop_ref())
        };
        let id = self.expect_array(&array_ref)?;

        let value = self
            .vm
            .heap
            .with_entry(id, |entry| {
                let HeapEntry::Array(arr) = entry else {
                    return None;
                };
                if index < 0 || index >= arr.len() {
                    return None;
                }
                Some(match op {
                    OPCode::LALoad => Value::Long(arr.get_long(index)),
                    OPCode::FALoad => Value::Float(arr.get_float(index)),
                    OPCode::DALoad => Value::Double(arr.get_double(index)),
                    OPCode::AALoad => Value::Ref(arr.get_ref(index)),
                    // iaload, baload, caload, saload share int storage
                    _ => Value::Int(arr.get_int(index)),
                })
            })
            .flatten()
            .ok_or_else(|| VmError::exception(ARRAY_INDEX_EXCEPTION))?;

        self.frame_mut().stack.push(value);
        Ok(())
    }

    fn array_store(&mut self, op: OPCode) -> Result<(), VmError> {
        let (value, index, array_ref) = {
            let frame = self.frame_mut();
            (
                frame.stack.pop(),
                frame.stack.pop_int(),
                frame.stack.pop_ref(),
            )
        };
        let id = self.expect_array(&array_ref)?;

        let stored = self
            .vm
            .heap
            .with_entry(id, |entry| {
                let HeapEntry::Array(arr) = entry else {
                    return false;
                };
                if index < 0 || index >= arr.len() {
                    return false;
                }
                match op {
                    OPCode::LAStore => arr.set_long(index, value.as_long()),
                    OPCode::FAStore => arr.set_float(index, value.as_float()),
                    OPCode::DAStore => arr.set_double(index, value.as_double()),
                    OPCode::AAStore => arr.set_ref(index, value.as_ref_value()),
                    // Narrowing stores truncate to the element width.
                    OPCode::BAStore => arr.set_int(index, value.as_int() as i8 as i32),
                    OPCode::CAStore => arr.set_int(index, value.as_int() as u16 as i32),
                    OPCode::SAStore => arr.set_int(index, value.as_int() as i16 as i32),
                    _ => arr.set_int(index, value.as_int()),
                }
                true
            })
            .unwrap_or(false);

        if !stored {
            return Err(VmError::exception(ARRAY_INDEX_EXCEPTION));
        }
        Ok(())
    }

    pub(crate) fn expect_array(&self, reference: &Reference) -> Result<u64, VmError> {
        match reference {
            Reference::Array(id) => Ok(*id),
            Reference::Null => Err(VmError::exception(NULL_POINTER_EXCEPTION)),
            other => Err(VmError::Internal(format!(
                "expected an array reference, got {other}"
            ))),
        }
    }
}
