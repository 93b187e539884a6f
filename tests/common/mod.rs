//! A small class-image builder for the end-to-end tests: emits the
//! big-endian class-file byte format directly, so the scenarios run
//! against real parsed images rather than canned structures.
use std::collections::HashMap;

/// Builds one class file image in memory.
pub struct ClassBuilder {
    class_name: String,
    entries: Vec<Vec<u8>>,
    next_index: u16,
    utf8_cache: HashMap<String, u16>,
    class_cache: HashMap<String, u16>,
    fields: Vec<FieldDef>,
    methods: Vec<MethodDef>,
}

struct FieldDef {
    access: u16,
    name_index: u16,
    descriptor_index: u16,
}

struct MethodDef {
    access: u16,
    name_index: u16,
    descriptor_index: u16,
    max_stack: u16,
    max_locals: u16,
    code: Vec<u8>,
    exceptions: Vec<(u16, u16, u16, u16)>,
}

/// High byte of a pool index, for inline operands.
pub fn hi(index: u16) -> u8 {
    (index >> 8) as u8
}

/// Low byte of a pool index.
pub fn lo(index: u16) -> u8 {
    (index & 0xFF) as u8
}

impl ClassBuilder {
    pub fn new(class_name: &str) -> ClassBuilder {
        ClassBuilder {
            class_name: class_name.to_string(),
            entries: Vec::new(),
            next_index: 1,
            utf8_cache: HashMap::new(),
            class_cache: HashMap::new(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    fn push_entry(&mut self, bytes: Vec<u8>, wide: bool) -> u16 {
        let index = self.next_index;
        self.entries.push(bytes);
        self.next_index += if wide { 2 } else { 1 };
        index
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        if let Some(&index) = self.utf8_cache.get(text) {
            return index;
        }
        let mut bytes = vec![1u8];
        bytes.extend_from_slice(&(text.len() as u16).to_be_bytes());
        bytes.extend_from_slice(text.as_bytes());
        let index = self.push_entry(bytes, false);
        self.utf8_cache.insert(text.to_string(), index);
        index
    }

    pub fn class(&mut self, name: &str) -> u16 {
        if let Some(&index) = self.class_cache.get(name) {
            return index;
        }
        let name_index = self.utf8(name);
        let mut bytes = vec![7u8];
        bytes.extend_from_slice(&name_index.to_be_bytes());
        let index = self.push_entry(bytes, false);
        self.class_cache.insert(name.to_string(), index);
        index
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let string_index = self.utf8(text);
        let mut bytes = vec![8u8];
        bytes.extend_from_slice(&string_index.to_be_bytes());
        self.push_entry(bytes, false)
    }

    pub fn long_const(&mut self, value: i64) -> u16 {
        let mut bytes = vec![5u8];
        bytes.extend_from_slice(&value.to_be_bytes());
        self.push_entry(bytes, true)
    }

    fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        let mut bytes = vec![12u8];
        bytes.extend_from_slice(&name_index.to_be_bytes());
        bytes.extend_from_slice(&descriptor_index.to_be_bytes());
        self.push_entry(bytes, false)
    }

    pub fn method_ref(&mut self, class_name: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class_name);
        let nat_index = self.name_and_type(name, descriptor);
        let mut bytes = vec![10u8];
        bytes.extend_from_slice(&class_index.to_be_bytes());
        bytes.extend_from_slice(&nat_index.to_be_bytes());
        self.push_entry(bytes, false)
    }

    pub fn field_ref(&mut self, class_name: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.class(class_name);
        let nat_index = self.name_and_type(name, descriptor);
        let mut bytes = vec![9u8];
        bytes.extend_from_slice(&class_index.to_be_bytes());
        bytes.extend_from_slice(&nat_index.to_be_bytes());
        self.push_entry(bytes, false)
    }

    pub fn add_field(&mut self, access: u16, name: &str, descriptor: &str) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.fields.push(FieldDef {
            access,
            name_index,
            descriptor_index,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_method(
        &mut self,
        access: u16,
        name: &str,
        descriptor: &str,
        max_stack: u16,
        max_locals: u16,
        code: Vec<u8>,
        exceptions: Vec<(u16, u16, u16, u16)>,
    ) {
        let name_index = self.utf8(name);
        let descriptor_index = self.utf8(descriptor);
        self.methods.push(MethodDef {
            access,
            name_index,
            descriptor_index,
            max_stack,
            max_locals,
            code,
            exceptions,
        });
    }

    pub fn build(mut self) -> Vec<u8> {
        let name = self.class_name.clone();
        let this_class = self.class(&name);
        let super_class = self.class("java/lang/Object");
        let code_name = self.utf8("Code");

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // minor
        out.extend_from_slice(&52u16.to_be_bytes()); // major
        out.extend_from_slice(&self.next_index.to_be_bytes());
        for entry in &self.entries {
            out.extend_from_slice(entry);
        }
        out.extend_from_slice(&0x0021u16.to_be_bytes()); // access
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        out.extend_from_slice(&0u16.to_be_bytes()); // interfaces

        out.extend_from_slice(&(self.fields.len() as u16).to_be_bytes());
        for field in &self.fields {
            out.extend_from_slice(&field.access.to_be_bytes());
            out.extend_from_slice(&field.name_index.to_be_bytes());
            out.extend_from_slice(&field.descriptor_index.to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes()); // attributes
        }

        out.extend_from_slice(&(self.methods.len() as u16).to_be_bytes());
        for method in &self.methods {
            out.extend_from_slice(&method.access.to_be_bytes());
            out.extend_from_slice(&method.name_index.to_be_bytes());
            out.extend_from_slice(&method.descriptor_index.to_be_bytes());
            out.extend_from_slice(&1u16.to_be_bytes()); // one attribute

            let mut body = Vec::new();
            body.extend_from_slice(&method.max_stack.to_be_bytes());
            body.extend_from_slice(&method.max_locals.to_be_bytes());
            body.extend_from_slice(&(method.code.len() as u32).to_be_bytes());
            body.extend_from_slice(&method.code);
            body.extend_from_slice(&(method.exceptions.len() as u16).to_be_bytes());
            for (start_pc, end_pc, handler_pc, catch_type) in &method.exceptions {
                body.extend_from_slice(&start_pc.to_be_bytes());
                body.extend_from_slice(&end_pc.to_be_bytes());
                body.extend_from_slice(&handler_pc.to_be_bytes());
                body.extend_from_slice(&catch_type.to_be_bytes());
            }
            body.extend_from_slice(&0u16.to_be_bytes()); // nested attributes

            out.extend_from_slice(&code_name.to_be_bytes());
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(&body);
        }

        out.extend_from_slice(&0u16.to_be_bytes()); // class attributes
        out
    }
}
