//! Exception-handler search and the well-known exception class
//! tables used for catch matching.
use crate::classfile::{CodeAttribute, ConstantPool};

pub const NULL_POINTER_EXCEPTION: &str = "java/lang/NullPointerException";
pub const ARITHMETIC_EXCEPTION: &str = "java/lang/ArithmeticException";
pub const ARRAY_INDEX_EXCEPTION: &str = "java/lang/ArrayIndexOutOfBoundsException";
pub const NEGATIVE_ARRAY_SIZE_EXCEPTION: &str = "java/lang/NegativeArraySizeException";
pub const ILLEGAL_MONITOR_STATE_EXCEPTION: &str = "java/lang/IllegalMonitorStateException";
pub const ARRAY_STORE_EXCEPTION: &str = "java/lang/ArrayStoreException";

/// Classes treated as subclasses of `java/lang/Exception`. There is
/// no class hierarchy in this runtime; catch matching consults this
/// fixed table instead.
const EXCEPTION_CLASSES: &[&str] = &[
    "java/lang/Exception",
    "java/lang/RuntimeException",
    "java/lang/NullPointerException",
    "java/lang/ArrayIndexOutOfBoundsException",
    "java/lang/ArithmeticException",
    "java/lang/NegativeArraySizeException",
    "java/lang/IllegalArgumentException",
    "java/lang/IllegalStateException",
    "java/lang/IllegalMonitorStateException",
    "java/lang/IndexOutOfBoundsException",
    "java/lang/ClassCastException",
    "java/lang/NumberFormatException",
    "java/io/IOException",
    "java/io/FileNotFoundException",
];

/// Classes treated as subclasses of `java/lang/RuntimeException`.
const RUNTIME_EXCEPTION_CLASSES: &[&str] = &[
    "java/lang/RuntimeException",
    "java/lang/NullPointerException",
    "java/lang/ArrayIndexOutOfBoundsException",
    "java/lang/ArithmeticException",
    "java/lang/NegativeArraySizeException",
    "java/lang/IllegalArgumentException",
    "java/lang/IllegalStateException",
    "java/lang/IllegalMonitorStateException",
    "java/lang/IndexOutOfBoundsException",
    "java/lang/ClassCastException",
    "java/lang/NumberFormatException",
];

pub fn is_exception(class_name: &str) -> bool {
    EXCEPTION_CLASSES.contains(&class_name)
}

pub fn is_runtime_exception(class_name: &str) -> bool {
    RUNTIME_EXCEPTION_CLASSES.contains(&class_name)
}

/// Does a thrown `thrown_class` match a handler catching
/// `catch_class`? Exact name equality, plus `Throwable` catching
/// everything and the Exception/RuntimeException tables above.
pub fn matches_exception(thrown_class: &str, catch_class: &str) -> bool {
    if thrown_class == catch_class {
        return true;
    }
    match catch_class {
        "java/lang/Throwable" => true,
        "java/lang/Exception" => is_exception(thrown_class),
        "java/lang/RuntimeException" => is_runtime_exception(thrown_class),
        _ => false,
    }
}

/// Find the handler pc for an exception raised at `pc`, or `None`.
/// The first table entry whose `[start_pc, end_pc)` range contains
/// `pc` and whose catch type is 0 (catch-any) or matches the thrown
/// class wins.
pub fn find_exception_handler(
    code: &CodeAttribute,
    cp: &ConstantPool,
    pc: usize,
    exception_class: &str,
) -> Option<usize> {
    for entry in &code.exception_table {
        if pc < entry.start_pc as usize || pc >= entry.end_pc as usize {
            continue;
        }
        if entry.catch_type == 0 {
            return Some(entry.handler_pc as usize);
        }
        let catch_class = cp.get_class_name(entry.catch_type);
        if matches_exception(exception_class, catch_class) {
            return Some(entry.handler_pc as usize);
        }
    }
    None
}
