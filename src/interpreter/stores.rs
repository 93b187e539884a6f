//! Store instructions: operand stack to local variable.
use crate::bytecode::OPCode;
use crate::error::VmError;

use super::Interpreter;

impl Interpreter {
    pub(crate) fn execute_store(&mut self, op: OPCode) -> Result<(), VmError> {
        let frame = self.frame_mut();
        match op {
            OPCode::IStore => {
                let index = frame.read_u8() as usize;
                let val = frame.stack.pop_int();
                frame.locals.set_int(index, val);
            }
            OPCode::IStore0 | OPCode::IStore1 | OPCode::IStore2 | OPCode::IStore3 => {
                let index = (op as u8 - OPCode::IStore0 as u8) as usize;
                let val = frame.stack.pop_int();
                frame.locals.set_int(index, val);
            }

            OPCode::LStore => {
                let index = frame.read_u8() as usize;
                let val = frame.stack.pop_long();
                frame.locals.set_long(index, val);
            }
            OPCode::LStore0 | OPCode::LStore1 | OPCode::LStore2 | OPCode::LStore3 => {
                let index = (op as u8 - OPCode::LStore0 as u8) as usize;
                let val = frame.stack.pop_long();
                frame.locals.set_long(index, val);
            }

            OPCode::FStore => {
                let index = frame.read_u8() as usize;
                let val = frame.stack.pop_float();
                frame.locals.set_float(index, val);
            }
            OPCode::FStore0 | OPCode::FStore1 | OPCode::FStore2 | OPCode::FStore3 => {
                let index = (op as u8 - OPCode::FStore0 as u8) as usize;
                let val = frame.stack.pop_float();
                frame.locals.set_float(index, val);
            }

            OPCode::DStore => {
                let index = frame.read_u8() as usize;
                let val = frame.stack.pop_double();
                frame.locals.set_double(index, val);
            }
            OPCode::DStore0 | OPCode::DStore1 | OPCode::DStore2 | OPCode::DStore3 => {
                let index = (op as u8 - OPCode::DStore0 as u8) as usize;
                let val = frame.stack.pop_double();
                frame.locals.set_double(index, val);
            }

            OPCode::AStore => {
                let index = frame.read_u8() as usize;
                let val = frame.stack.pop_ref();
                frame.locals.set_ref(index, val);
            }
            OPCode::AStore0 | OPCode::AStore1 | OPCode::AStore2 | OPCode::AStore3 => {
                let index = (op as u8 - OPCode::AStore0 as u8) as usize;
                let val = frame.stack.pop_ref();
                frame.locals.set_ref(index, val);
            }

            other => {
                return Err(VmError::Internal(format!(
                    "{other} reached the store handler"
                )))
            }
        }
        Ok(())
    }
}
