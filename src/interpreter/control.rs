//! Control flow: conditional and unconditional branches, and the
//! return family. Branch offsets are signed and measured from the
//! opcode's own position.
use crate::bytecode::OPCode;
use crate::error::VmError;

use super::Interpreter;

fn branch_target(insn_pc: usize, offset: i32) -> usize {
    (insn_pc as i64 + i64::from(offset)) as usize
}

impl Interpreter {
    pub(crate) fn execute_control(&mut self, op: OPCode, insn_pc: usize) -> Result<(), VmError> {
        match op {
            // Compare one int against zero.
            OPCode::IfEq
            | OPCode::IfNe
            | OPCode::IfLt
            | OPCode::IfGe
            | OPCode::IfGt
            | OPCode::IfLe => {
                let frame = self.frame_mut();
                let offset = i32::from(frame.read_i16());
                let value = frame.stack.pop_int();
                let taken = match op {
                    OPCode::IfEq => value == 0,
                    OPCode::IfNe => value != 0,
                    OPCode::IfLt => value < 0,
                    OPCode::IfGe => value >= 0,
                    OPCode::IfGt => value > 0,
                    _ => value <= 0,
                };
                if taken {
                    frame.pc = branch_target(insn_pc, offset);
                }
            }

            // Compare two ints.
            OPCode::IfICmpEq
            | OPCode::IfICmpNe
            | OPCode::IfICmpLt
            | OPCode::IfICmpGe
            | OPCode::IfICmpGt
            | OPCode::IfICmpLe => {
                let frame = self.frame_mut();
                let offset = i32::from(frame.read_i16());
                let v2 = frame.stack.pop_int();
                let v1 = frame.stack.pop_int();
                let taken = match op {
                    OPCode::IfICmpEq => v1 == v2,
                    OPCode::IfICmpNe => v1 != v2,
                    OPCode::IfICmpLt => v1 < v2,
                    OPCode::IfICmpGe => v1 >= v2,
                    OPCode::IfICmpGt => v1 > v2,
                    _ => v1 <= v2,
                };
                if taken {
                    frame.pc = branch_target(insn_pc, offset);
                }
            }

            // Compare two references by identity.
            OPCode::IfACmpEq | OPCode::IfACmpNe => {
                let frame = self.frame_mut();
                let offset = i32::from(frame.read_i16());
                let v2 = frame.stack.pop_ref();
                let v1 = frame.stack.pop_ref();
                let taken = (v1 == v2) == (op == OPCode::IfACmpEq);
                if taken {
                    frame.pc = branch_target(insn_pc, offset);
                }
            }

            // Null checks.
            OPCode::IfNull | OPCode::IfNonNull => {
                let frame = self.frame_mut();
                let offset = i32::from(frame.read_i16());
                let reference = frame.stack.pop_ref();
                let taken = reference.is_null() == (op == OPCode::IfNull);
                if taken {
                    frame.pc = branch_target(insn_pc, offset);
                }
            }

            // Unconditional jumps.
            OPCode::Goto => {
                let frame = self.frame_mut();
                let offset = i32::from(frame.read_i16());
                frame.pc = branch_target(insn_pc, offset);
            }
            OPCode::GotoW => {
                let frame = self.frame_mut();
                let offset = frame.read_i32();
                frame.pc = branch_target(insn_pc, offset);
            }

            // Returns: pop the frame and hand any value to the caller.
            OPCode::Return => {
                let method_name = self.frame_mut().method_name.clone();
                self.frames.pop();
                self.trace_return(&method_name, 0, false);
            }
            OPCode::IReturn => {
                let value = self.frame_mut().stack.pop_int();
                let method_name = self.frame_mut().method_name.clone();
                self.frames.pop();
                self.trace_return(&method_name, value, true);
                if let Some(caller) = self.frames.last_mut() {
                    caller.stack.push_int(value);
                }
            }
            OPCode::LReturn | OPCode::FReturn | OPCode::DReturn | OPCode::AReturn => {
                let value = self.frame_mut().stack.pop();
                self.frames.pop();
                if let Some(caller) = self.frames.last_mut() {
                    caller.stack.push(value);
                }
            }

            other => {
                return Err(VmError::Internal(format!(
                    "{other} reached the control handler"
                )))
            }
        }
        Ok(())
    }
}
