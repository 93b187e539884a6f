//! Load instructions: local variable to operand stack.
use crate::bytecode::OPCode;
use crate::error::VmError;

use super::Interpreter;

impl Interpreter {
    pub(crate) fn execute_load(&mut self, op: OPCode) -> Result<(), VmError> {
        let frame = self.frame_mut();
        match op {
            OPCode::ILoad => {
                let index = frame.read_u8() as usize;
                let val = frame.locals.get_int(index);
                frame.stack.push_int(val);
            }
            OPCode::ILoad0 | OPCode::ILoad1 | OPCode::ILoad2 | OPCode::ILoad3 => {
                let index = (op as u8 - OPCode::ILoad0 as u8) as usize;
                let val = frame.locals.get_int(index);
                frame.stack.push_int(val);
            }

            OPCode::LLoad => {
                let index = frame.read_u8() as usize;
                let val = frame.locals.get_long(index);
                frame.stack.push_long(val);
            }
            OPCode::LLoad0 | OPCode::LLoad1 | OPCode::LLoad2 | OPCode::LLoad3 => {
                let index = (op as u8 - OPCode::LLoad0 as u8) as usize;
                let val = frame.locals.get_long(index);
                frame.stack.push_long(val);
            }

            OPCode::FLoad => {
                let index = frame.read_u8() as usize;
                let val = frame.locals.get_float(index);
                frame.stack.push_float(val);
            }
            OPCode::FLoad0 | OPCode::FLoad1 | OPCode::FLoad2 | OPCode::FLoad3 => {
                let index = (op as u8 - OPCode::FLoad0 as u8) as usize;
                let val = frame.locals.get_float(index);
                frame.stack.push_float(val);
            }

            OPCode::DLoad => {
                let index = frame.read_u8() as usize;
                let val = frame.locals.get_double(index);
                frame.stack.push_double(val);
            }
            OPCode::DLoad0 | OPCode::DLoad1 | OPCode::DLoad2 | OPCode::DLoad3 => {
                let index = (op as u8 - OPCode::DLoad0 as u8) as usize;
                let val = frame.locals.get_double(index);
                frame.stack.push_double(val);
            }

            OPCode::ALoad => {
                let index = frame.read_u8() as usize;
                let val = frame.locals.get_ref(index);
                frame.stack.push_ref(val);
            }
            OPCode::ALoad0 | OPCode::ALoad1 | OPCode::ALoad2 | OPCode::ALoad3 => {
                let index = (op as u8 - OPCode::ALoad0 as u8) as usize;
                let val = frame.locals.get_ref(index);
                frame.stack.push_ref(val);
            }

            other => {
                return Err(VmError::Internal(format!(
                    "{other} reached the load handler"
                )))
            }
        }
        Ok(())
    }
}
