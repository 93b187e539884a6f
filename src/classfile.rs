//! Parser and decoder for JVM class files: a big-endian cursor over an
//! immutable byte slice, the tagged constant pool, and the structured
//! `Code` attribute.
use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use std::path::Path;

use crate::error::DecodeError;

/// Value of the magic bytes of a JVM class file.
pub const CLASS_FILE_MAGIC: u32 = 0xCAFE_BABE;

/// `CpInfo` represents constant pool entries.
#[derive(Debug, Clone)]
pub enum CpInfo {
    Class {
        name_index: u16,
    },
    FieldRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    MethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    InterfaceMethodRef {
        class_index: u16,
        name_and_type_index: u16,
    },
    String {
        string_index: u16,
    },
    Integer {
        value: i32,
    },
    Float {
        bits: u32,
    },
    Long {
        value: i64,
    },
    Double {
        bits: u64,
    },
    NameAndType {
        name_index: u16,
        descriptor_index: u16,
    },
    Utf8 {
        value: String,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    InvokeDynamic {
        bootstrap_method_attr_index: u16,
        name_and_type_index: u16,
    },
    // Fills index 0 and the dead slot after a long/double entry.
    Unusable,
}

/// `ConstantTag` encodes the kind of a constant in the pool.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConstantTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    InvokeDynamic = 18,
    Unknown,
}

impl From<u8> for ConstantTag {
    fn from(v: u8) -> Self {
        match v {
            1 => Self::Utf8,
            3 => Self::Integer,
            4 => Self::Float,
            5 => Self::Long,
            6 => Self::Double,
            7 => Self::Class,
            8 => Self::String,
            9 => Self::FieldRef,
            10 => Self::MethodRef,
            11 => Self::InterfaceMethodRef,
            12 => Self::NameAndType,
            15 => Self::MethodHandle,
            16 => Self::MethodType,
            18 => Self::InvokeDynamic,
            _ => Self::Unknown,
        }
    }
}

/// The 1-indexed tagged entry table embedded in a class image. Index 0
/// never resolves, and the slot after a long/double entry is unusable.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    entries: Vec<CpInfo>,
}

impl ConstantPool {
    pub fn get(&self, index: u16) -> Option<&CpInfo> {
        self.entries.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// UTF-8 entry at `index`. Returns an empty string on a tag
    /// mismatch so callers can use it freely during dispatch.
    pub fn get_utf8(&self, index: u16) -> &str {
        match self.get(index) {
            Some(CpInfo::Utf8 { value }) => value,
            _ => "",
        }
    }

    /// Name of the class referenced by the `Class` entry at `index`.
    pub fn get_class_name(&self, index: u16) -> &str {
        match self.get(index) {
            Some(CpInfo::Class { name_index }) => self.get_utf8(*name_index),
            _ => "",
        }
    }

    /// `(name, descriptor)` of the `NameAndType` entry at `index`.
    pub fn get_name_and_type(&self, index: u16) -> (&str, &str) {
        match self.get(index) {
            Some(CpInfo::NameAndType {
                name_index,
                descriptor_index,
            }) => (self.get_utf8(*name_index), self.get_utf8(*descriptor_index)),
            _ => ("", ""),
        }
    }
}

/// One row of a `Code` attribute's exception table.
#[derive(Debug, Clone)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

/// An attribute, stored as opaque name + body bytes. The `Code`
/// attribute gets its structured form on first use.
#[derive(Debug, Clone)]
pub struct AttributeInfo {
    pub name: String,
    pub info: Vec<u8>,
}

/// Structured form of the `Code` attribute.
#[derive(Debug, Clone)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code: Vec<u8>,
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone)]
pub struct FieldInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Debug, Clone)]
pub struct MethodInfo {
    pub access_flags: u16,
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes: Vec<AttributeInfo>,
}

impl MethodInfo {
    pub fn name<'a>(&self, cp: &'a ConstantPool) -> &'a str {
        cp.get_utf8(self.name_index)
    }

    pub fn descriptor<'a>(&self, cp: &'a ConstantPool) -> &'a str {
        cp.get_utf8(self.descriptor_index)
    }

    /// Parse this method's `Code` attribute. Returns `None` for
    /// methods without one (abstract and native methods).
    pub fn code_attribute(&self) -> Option<CodeAttribute> {
        let attr = self.attributes.iter().find(|a| a.name == "Code")?;
        parse_code_attribute(&attr.info).ok()
    }
}

/// `ClassFile` is the immutable decoded form of one class file.
#[derive(Debug, Clone)]
pub struct ClassFile {
    pub magic: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub constant_pool: ConstantPool,
    pub access_flags: u16,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces: Vec<u16>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Parse a class file image.
    pub fn parse(data: &[u8]) -> Result<ClassFile, DecodeError> {
        let mut buffer = Cursor::new(data);

        let magic = buffer.read_u32::<BigEndian>()?;
        if magic != CLASS_FILE_MAGIC {
            return Err(DecodeError::BadMagic(magic));
        }

        let minor_version = buffer.read_u16::<BigEndian>()?;
        let major_version = buffer.read_u16::<BigEndian>()?;
        let constant_pool = parse_constant_pool(&mut buffer)?;

        let access_flags = buffer.read_u16::<BigEndian>()?;
        let this_class = buffer.read_u16::<BigEndian>()?;
        let super_class = buffer.read_u16::<BigEndian>()?;

        let interface_count = buffer.read_u16::<BigEndian>()?;
        let mut interfaces = Vec::with_capacity(interface_count as usize);
        for _ in 0..interface_count {
            interfaces.push(buffer.read_u16::<BigEndian>()?);
        }

        let fields = parse_fields(&mut buffer, &constant_pool)?;
        let methods = parse_methods(&mut buffer, &constant_pool)?;
        let attributes = parse_attributes(&mut buffer, &constant_pool)?;

        Ok(ClassFile {
            magic,
            minor_version,
            major_version,
            constant_pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Read and parse a class file from disk.
    pub fn parse_file(path: &Path) -> Result<ClassFile, DecodeError> {
        let data = std::fs::read(path)?;
        ClassFile::parse(&data)
    }

    /// Name of this class.
    pub fn class_name(&self) -> &str {
        self.constant_pool.get_class_name(self.this_class)
    }

    /// Name of the superclass, empty for `java/lang/Object`.
    pub fn super_class_name(&self) -> &str {
        if self.super_class == 0 {
            return "";
        }
        self.constant_pool.get_class_name(self.super_class)
    }

    /// Find a method by name and descriptor. An empty descriptor
    /// matches any overload.
    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|m| {
            m.name(&self.constant_pool) == name
                && (descriptor.is_empty() || m.descriptor(&self.constant_pool) == descriptor)
        })
    }
}

fn parse_constant_pool(buffer: &mut Cursor<&[u8]>) -> Result<ConstantPool, DecodeError> {
    let count = buffer.read_u16::<BigEndian>()?;
    let mut entries = vec![CpInfo::Unusable; count as usize];

    // The first entry in the pool is at index 1; long and double
    // entries consume two logical slots.
    let mut index = 1usize;
    while index < count as usize {
        let tag = buffer.read_u8()?;
        let mut wide = false;
        let entry = match ConstantTag::from(tag) {
            ConstantTag::Utf8 => {
                let length = buffer.read_u16::<BigEndian>()?;
                let mut buf = vec![0u8; length as usize];
                buffer.read_exact(&mut buf)?;
                CpInfo::Utf8 {
                    value: String::from_utf8(buf)?,
                }
            }
            ConstantTag::Integer => CpInfo::Integer {
                value: buffer.read_u32::<BigEndian>()? as i32,
            },
            ConstantTag::Float => CpInfo::Float {
                bits: buffer.read_u32::<BigEndian>()?,
            },
            ConstantTag::Long => {
                wide = true;
                let high = u64::from(buffer.read_u32::<BigEndian>()?);
                let low = u64::from(buffer.read_u32::<BigEndian>()?);
                CpInfo::Long {
                    value: (high << 32 | low) as i64,
                }
            }
            ConstantTag::Double => {
                wide = true;
                let high = u64::from(buffer.read_u32::<BigEndian>()?);
                let low = u64::from(buffer.read_u32::<BigEndian>()?);
                CpInfo::Double {
                    bits: high << 32 | low,
                }
            }
            ConstantTag::Class => CpInfo::Class {
                name_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::String => CpInfo::String {
                string_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::FieldRef => CpInfo::FieldRef {
                class_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::MethodRef => CpInfo::MethodRef {
                class_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::InterfaceMethodRef => CpInfo::InterfaceMethodRef {
                class_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::NameAndType => CpInfo::NameAndType {
                name_index: buffer.read_u16::<BigEndian>()?,
                descriptor_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::MethodHandle => CpInfo::MethodHandle {
                reference_kind: buffer.read_u8()?,
                reference_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::MethodType => CpInfo::MethodType {
                descriptor_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::InvokeDynamic => CpInfo::InvokeDynamic {
                bootstrap_method_attr_index: buffer.read_u16::<BigEndian>()?,
                name_and_type_index: buffer.read_u16::<BigEndian>()?,
            },
            ConstantTag::Unknown => return Err(DecodeError::UnknownConstantTag(tag)),
        };
        entries[index] = entry;
        index += if wide { 2 } else { 1 };
    }

    Ok(ConstantPool { entries })
}

fn parse_fields(
    buffer: &mut Cursor<&[u8]>,
    cp: &ConstantPool,
) -> Result<Vec<FieldInfo>, DecodeError> {
    let count = buffer.read_u16::<BigEndian>()?;
    let mut fields = Vec::with_capacity(count as usize);
    for _ in 0..count {
        fields.push(FieldInfo {
            access_flags: buffer.read_u16::<BigEndian>()?,
            name_index: buffer.read_u16::<BigEndian>()?,
            descriptor_index: buffer.read_u16::<BigEndian>()?,
            attributes: parse_attributes(buffer, cp)?,
        });
    }
    Ok(fields)
}

fn parse_methods(
    buffer: &mut Cursor<&[u8]>,
    cp: &ConstantPool,
) -> Result<Vec<MethodInfo>, DecodeError> {
    let count = buffer.read_u16::<BigEndian>()?;
    let mut methods = Vec::with_capacity(count as usize);
    for _ in 0..count {
        methods.push(MethodInfo {
            access_flags: buffer.read_u16::<BigEndian>()?,
            name_index: buffer.read_u16::<BigEndian>()?,
            descriptor_index: buffer.read_u16::<BigEndian>()?,
            attributes: parse_attributes(buffer, cp)?,
        });
    }
    Ok(methods)
}

fn parse_attributes(
    buffer: &mut Cursor<&[u8]>,
    cp: &ConstantPool,
) -> Result<Vec<AttributeInfo>, DecodeError> {
    let count = buffer.read_u16::<BigEndian>()?;
    let mut attributes = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_index = buffer.read_u16::<BigEndian>()?;
        let length = buffer.read_u32::<BigEndian>()?;
        let mut info = vec![0u8; length as usize];
        buffer.read_exact(&mut info)?;
        attributes.push(AttributeInfo {
            name: cp.get_utf8(name_index).to_string(),
            info,
        });
    }
    Ok(attributes)
}

fn parse_code_attribute(data: &[u8]) -> Result<CodeAttribute, DecodeError> {
    let mut buffer = Cursor::new(data);

    let max_stack = buffer.read_u16::<BigEndian>()?;
    let max_locals = buffer.read_u16::<BigEndian>()?;

    let code_length = buffer.read_u32::<BigEndian>()?;
    let mut code = vec![0u8; code_length as usize];
    buffer.read_exact(&mut code)?;

    let exception_table_length = buffer.read_u16::<BigEndian>()?;
    let mut exception_table = Vec::with_capacity(exception_table_length as usize);
    for _ in 0..exception_table_length {
        exception_table.push(ExceptionEntry {
            start_pc: buffer.read_u16::<BigEndian>()?,
            end_pc: buffer.read_u16::<BigEndian>()?,
            handler_pc: buffer.read_u16::<BigEndian>()?,
            catch_type: buffer.read_u16::<BigEndian>()?,
        });
    }

    // Nested attributes (LineNumberTable and friends) stay opaque.
    let attr_count = buffer.read_u16::<BigEndian>()?;
    let mut attributes = Vec::with_capacity(attr_count as usize);
    for _ in 0..attr_count {
        // The nested attribute names live in the enclosing class's
        // pool, which is not available here; keep the raw index.
        let name_index = buffer.read_u16::<BigEndian>()?;
        let length = buffer.read_u32::<BigEndian>()?;
        let mut info = vec![0u8; length as usize];
        buffer.read_exact(&mut info)?;
        attributes.push(AttributeInfo {
            name: format!("#{name_index}"),
            info,
        });
    }

    Ok(CodeAttribute {
        max_stack,
        max_locals,
        code,
        exception_table,
        attributes,
    })
}
