//! Arithmetic, bitwise, shift, conversion, comparison and stack
//! manipulation instructions. Integer and long arithmetic wraps, and
//! int shift counts mask to 0x1F (0x3F for long).
use crate::bytecode::OPCode;
use crate::error::VmError;
use crate::exception::ARITHMETIC_EXCEPTION;

use super::Interpreter;

impl Interpreter {
    pub(crate) fn execute_math(&mut self, op: OPCode) -> Result<(), VmError> {
        let frame = self.frame_mut();
        let stack = &mut frame.stack;
        match op {
            // Stack manipulation.
            OPCode::Pop => {
                stack.pop();
            }
            OPCode::Pop2 => {
                stack.pop();
                stack.pop();
            }
            OPCode::Dup => stack.dup(),
            OPCode::Swap => stack.swap(),

            // Integer arithmetic.
            OPCode::IAdd => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                stack.push_int(v1.wrapping_add(v2));
            }
            OPCode::ISub => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                stack.push_int(v1.wrapping_sub(v2));
            }
            OPCode::IMul => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                stack.push_int(v1.wrapping_mul(v2));
            }
            OPCode::IDiv => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                if v2 == 0 {
                    return Err(VmError::exception(ARITHMETIC_EXCEPTION));
                }
                stack.push_int(v1.wrapping_div(v2));
            }
            OPCode::IRem => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                if v2 == 0 {
                    return Err(VmError::exception(ARITHMETIC_EXCEPTION));
                }
                stack.push_int(v1.wrapping_rem(v2));
            }
            OPCode::INeg => {
                let v = stack.pop_int();
                stack.push_int(v.wrapping_neg());
            }

            // Long arithmetic.
            OPCode::LAdd => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                stack.push_long(v1.wrapping_add(v2));
            }
            OPCode::LSub => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                stack.push_long(v1.wrapping_sub(v2));
            }
            OPCode::LMul => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                stack.push_long(v1.wrapping_mul(v2));
            }
            OPCode::LDiv => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                if v2 == 0 {
                    return Err(VmError::exception(ARITHMETIC_EXCEPTION));
                }
                stack.push_long(v1.wrapping_div(v2));
            }
            OPCode::LRem => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                if v2 == 0 {
                    return Err(VmError::exception(ARITHMETIC_EXCEPTION));
                }
                stack.push_long(v1.wrapping_rem(v2));
            }
            OPCode::LNeg => {
                let v = stack.pop_long();
                stack.push_long(v.wrapping_neg());
            }

            // Float arithmetic.
            OPCode::FAdd => {
                let v2 = stack.pop_float();
                let v1 = stack.pop_float();
                stack.push_float(v1 + v2);
            }
            OPCode::FSub => {
                let v2 = stack.pop_float();
                let v1 = stack.pop_float();
                stack.push_float(v1 - v2);
            }
            OPCode::FMul => {
                let v2 = stack.pop_float();
                let v1 = stack.pop_float();
                stack.push_float(v1 * v2);
            }
            OPCode::FDiv => {
                let v2 = stack.pop_float();
                let v1 = stack.pop_float();
                stack.push_float(v1 / v2);
            }
            OPCode::FRem => {
                let v2 = stack.pop_float();
                let v1 = stack.pop_float();
                stack.push_float(v1 % v2);
            }
            OPCode::FNeg => {
                let v = stack.pop_float();
                stack.push_float(-v);
            }

            // Double arithmetic.
            OPCode::DAdd => {
                let v2 = stack.pop_double();
                let v1 = stack.pop_double();
                stack.push_double(v1 + v2);
            }
            OPCode::DSub => {
                let v2 = stack.pop_double();
                let v1 = stack.pop_double();
                stack.push_double(v1 - v2);
            }
            OPCode::DMul => {
                let v2 = stack.pop_double();
                let v1 = stack.pop_double();
                stack.push_double(v1 * v2);
            }
            OPCode::DDiv => {
                let v2 = stack.pop_double();
                let v1 = stack.pop_double();
                stack.push_double(v1 / v2);
            }
            OPCode::DRem => {
                let v2 = stack.pop_double();
                let v1 = stack.pop_double();
                stack.push_double(v1 % v2);
            }
            OPCode::DNeg => {
                let v = stack.pop_double();
                stack.push_double(-v);
            }

            // Shifts.
            OPCode::IShl => {
                let v2 = stack.pop_int() & 0x1F;
                let v1 = stack.pop_int();
                stack.push_int(v1.wrapping_shl(v2 as u32));
            }
            OPCode::IShr => {
                let v2 = stack.pop_int() & 0x1F;
                let v1 = stack.pop_int();
                stack.push_int(v1 >> v2);
            }
            OPCode::IUShr => {
                let v2 = stack.pop_int() & 0x1F;
                let v1 = stack.pop_int();
                stack.push_int(((v1 as u32) >> v2) as i32);
            }
            OPCode::LShl => {
                let v2 = stack.pop_int() & 0x3F;
                let v1 = stack.pop_long();
                stack.push_long(v1.wrapping_shl(v2 as u32));
            }
            OPCode::LShr => {
                let v2 = stack.pop_int() & 0x3F;
                let v1 = stack.pop_long();
                stack.push_long(v1 >> v2);
            }
            OPCode::LUShr => {
                let v2 = stack.pop_int() & 0x3F;
                let v1 = stack.pop_long();
                stack.push_long(((v1 as u64) >> v2) as i64);
            }

            // Bitwise.
            OPCode::IAnd => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                stack.push_int(v1 & v2);
            }
            OPCode::IOr => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                stack.push_int(v1 | v2);
            }
            OPCode::IXor => {
                let v2 = stack.pop_int();
                let v1 = stack.pop_int();
                stack.push_int(v1 ^ v2);
            }
            OPCode::LAnd => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                stack.push_long(v1 & v2);
            }
            OPCode::LOr => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                stack.push_long(v1 | v2);
            }
            OPCode::LXor => {
                let v2 = stack.pop_long();
                let v1 = stack.pop_long();
                stack.push_long(v1 ^ v2);
            }

            // Increment a local by a signed byte delta.
            OPCode::IInc => {
                let index = frame.read_u8() as usize;
                let delta = i32::from(frame.read_i8());
                let val = frame.locals.get_int(index);
                frame.locals.set_int(index, val.wrapping_add(delta));
            }

            // Conversions.
            OPCode::I2L => {
                let v = frame.stack.pop();
                frame.stack.push_long(v.as_long());
            }
            OPCode::I2F | OPCode::L2F | OPCode::D2F => {
                let v = frame.stack.pop();
                frame.stack.push_float(v.as_float());
            }
            OPCode::I2D | OPCode::L2D | OPCode::F2D => {
                let v = frame.stack.pop();
                frame.stack.push_double(v.as_double());
            }
            OPCode::L2I | OPCode::F2I | OPCode::D2I => {
                let v = frame.stack.pop();
                frame.stack.push_int(v.as_int());
            }
            OPCode::F2L | OPCode::D2L => {
                let v = frame.stack.pop();
                frame.stack.push_long(v.as_long());
            }

            // Comparisons pushing -1/0/1.
            OPCode::LCmp => {
                let v2 = frame.stack.pop_long();
                let v1 = frame.stack.pop_long();
                frame.stack.push_int(compare(v1, v2));
            }
            OPCode::FCmpL | OPCode::FCmpG => {
                let v2 = frame.stack.pop_float();
                let v1 = frame.stack.pop_float();
                let nan = if op == OPCode::FCmpG { 1 } else { -1 };
                frame.stack.push_int(compare_float(v1.into(), v2.into(), nan));
            }
            OPCode::DCmpL | OPCode::DCmpG => {
                let v2 = frame.stack.pop_double();
                let v1 = frame.stack.pop_double();
                let nan = if op == OPCode::DCmpG { 1 } else { -1 };
                frame.stack.push_int(compare_float(v1, v2, nan));
            }

            other => {
                return Err(VmError::Internal(format!(
                    "{other} reached the math handler"
                )))
            }
        }
        Ok(())
    }
}

fn compare<T: Ord>(v1: T, v2: T) -> i32 {
    match v1.cmp(&v2) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    }
}

// Unordered operands push the opcode's NaN bias.
fn compare_float(v1: f64, v2: f64, nan: i32) -> i32 {
    match v1.partial_cmp(&v2) {
        Some(std::cmp::Ordering::Less) => -1,
        Some(std::cmp::Ordering::Equal) => 0,
        Some(std::cmp::Ordering::Greater) => 1,
        None => nan,
    }
}
