//! Constant-pushing instructions: nop, aconst_null, iconst/lconst/
//! fconst/dconst, bipush, sipush and the ldc family.
use std::sync::Arc;

use crate::bytecode::OPCode;
use crate::classfile::CpInfo;
use crate::error::VmError;
use crate::value::Reference;

use super::Interpreter;

impl Interpreter {
    pub(crate) fn execute_const(&mut self, op: OPCode) -> Result<(), VmError> {
        match op {
            OPCode::Nop => {}

            OPCode::AconstNull => self.frame_mut().stack.push_ref(Reference::Null),

            OPCode::IconstM1 => self.frame_mut().stack.push_int(-1),
            OPCode::Iconst0 => self.frame_mut().stack.push_int(0),
            OPCode::Iconst1 => self.frame_mut().stack.push_int(1),
            OPCode::Iconst2 => self.frame_mut().stack.push_int(2),
            OPCode::Iconst3 => self.frame_mut().stack.push_int(3),
            OPCode::Iconst4 => self.frame_mut().stack.push_int(4),
            OPCode::Iconst5 => self.frame_mut().stack.push_int(5),

            OPCode::Lconst0 => self.frame_mut().stack.push_long(0),
            OPCode::Lconst1 => self.frame_mut().stack.push_long(1),

            OPCode::Fconst0 => self.frame_mut().stack.push_float(0.0),
            OPCode::Fconst1 => self.frame_mut().stack.push_float(1.0),
            OPCode::Fconst2 => self.frame_mut().stack.push_float(2.0),

            OPCode::Dconst0 => self.frame_mut().stack.push_double(0.0),
            OPCode::Dconst1 => self.frame_mut().stack.push_double(1.0),

            OPCode::BiPush => {
                let frame = self.frame_mut();
                let val = frame.read_i8();
                frame.stack.push_int(i32::from(val));
            }
            OPCode::SiPush => {
                let frame = self.frame_mut();
                let val = frame.read_i16();
                frame.stack.push_int(i32::from(val));
            }

            OPCode::Ldc => {
                let index = u16::from(self.frame_mut().read_u8());
                self.load_constant(index);
            }
            OPCode::LdcW => {
                let index = self.frame_mut().read_u16();
                self.load_constant(index);
            }
            OPCode::Ldc2W => {
                let index = self.frame_mut().read_u16();
                self.load_constant2(index);
            }

            other => {
                return Err(VmError::Internal(format!(
                    "{other} reached the constant handler"
                )))
            }
        }
        Ok(())
    }

    /// Single-slot ldc: integer, float bits, string, or class token.
    fn load_constant(&mut self, index: u16) {
        let class = Arc::clone(&self.frame_mut().class);
        match class.constant_pool.get(index) {
            Some(CpInfo::Integer { value }) => self.frame_mut().stack.push_int(*value),
            Some(CpInfo::Float { bits }) => {
                self.frame_mut().stack.push_float(f32::from_bits(*bits));
            }
            Some(CpInfo::String { string_index }) => {
                let text = class.constant_pool.get_utf8(*string_index);
                let interned = self.vm.intern(text);
                self.frame_mut().stack.push_ref(Reference::Str(interned));
            }
            Some(CpInfo::Class { name_index }) => {
                let name = class.constant_pool.get_utf8(*name_index);
                let token = self.vm.intern(name);
                self.frame_mut().stack.push_ref(Reference::Class(token));
            }
            _ => {}
        }
    }

    /// Two-slot ldc2_w: long or double.
    fn load_constant2(&mut self, index: u16) {
        let class = Arc::clone(&self.frame_mut().class);
        match class.constant_pool.get(index) {
            Some(CpInfo::Long { value }) => self.frame_mut().stack.push_long(*value),
            Some(CpInfo::Double { bits }) => {
                self.frame_mut().stack.push_double(f64::from_bits(*bits));
            }
            _ => {}
        }
    }
}
