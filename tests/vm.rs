//! End-to-end scenarios: class images are assembled byte-by-byte,
//! parsed by the real decoder, and executed by the real interpreter;
//! assertions run against the console-output sink.
mod common;

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use espresso::classfile::ClassFile;
use espresso::error::VmError;
use espresso::interpreter::Interpreter;
use espresso::monitor::MonitorKey;
use espresso::vm::Vm;

use common::{hi, lo, ClassBuilder};

const ACC_PUBLIC: u16 = 0x0001;
const ACC_PRIVATE: u16 = 0x0002;
const ACC_PUBLIC_STATIC: u16 = 0x0009;

#[derive(Clone)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Run {
    result: Result<(), VmError>,
    output: String,
    vm: Arc<Vm>,
}

fn run_class(image: &[u8]) -> Run {
    let cf = ClassFile::parse(image).expect("class image parses");
    let vm = Arc::new(Vm::new());
    let mut interp = Interpreter::new(vm.clone());
    let buf = Arc::new(Mutex::new(Vec::new()));
    interp.set_output(Box::new(SharedBuf(buf.clone())));
    let result = interp.execute(cf);
    let output = String::from_utf8(buf.lock().unwrap().clone()).expect("utf8 output");
    Run { result, output, vm }
}

fn lines(run: &Run) -> Vec<String> {
    run.output.lines().map(str::to_string).collect()
}

#[test]
fn hello_world_arithmetic_and_loops() {
    let mut b = ClassBuilder::new("HelloWorld");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let p_s = b.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let hello = b.string("Hello from SimpleJVM!");
    let add = b.method_ref("HelloWorld", "add", "(II)I");
    let mul = b.method_ref("HelloWorld", "multiply", "(II)I");
    let max = b.method_ref("HelloWorld", "max", "(II)I");
    let fact = b.method_ref("HelloWorld", "factorial", "(I)I");

    #[rustfmt::skip]
    let main = vec![
        0xB2, hi(out), lo(out),             // getstatic System.out
        0x12, hello as u8,                  // ldc "Hello from SimpleJVM!"
        0xB6, hi(p_s), lo(p_s),             // println(String)
        0xB2, hi(out), lo(out),
        0x10, 10,                           // bipush 10
        0x10, 20,                           // bipush 20
        0xB8, hi(add), lo(add),             // invokestatic add
        0xB6, hi(p_i), lo(p_i),             // println(I) -> 30
        0xB2, hi(out), lo(out),
        0x08,                               // iconst_5
        0x10, 7,                            // bipush 7
        0xB8, hi(mul), lo(mul),
        0xB6, hi(p_i), lo(p_i),             // -> 35
        0xB2, hi(out), lo(out),
        0x10, 42,
        0x10, 17,
        0xB8, hi(max), lo(max),
        0xB6, hi(p_i), lo(p_i),             // -> 42
        0xB2, hi(out), lo(out),
        0x08,                               // iconst_5
        0xB8, hi(fact), lo(fact),
        0xB6, hi(p_i), lo(p_i),             // -> 120
        0xB1,                               // return
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 3, 1, main, vec![]);

    b.add_method(
        ACC_PUBLIC_STATIC,
        "add",
        "(II)I",
        2,
        2,
        vec![0x1A, 0x1B, 0x60, 0xAC], // iload_0 iload_1 iadd ireturn
        vec![],
    );
    b.add_method(
        ACC_PUBLIC_STATIC,
        "multiply",
        "(II)I",
        2,
        2,
        vec![0x1A, 0x1B, 0x68, 0xAC], // imul
        vec![],
    );
    #[rustfmt::skip]
    b.add_method(
        ACC_PUBLIC_STATIC, "max", "(II)I", 2, 2,
        vec![
            0x1A, 0x1B,                 //  0: iload_0 iload_1
            0xA4, 0x00, 0x05,           //  2: if_icmple -> 7
            0x1A, 0xAC,                 //  5: iload_0 ireturn
            0x1B, 0xAC,                 //  7: iload_1 ireturn
        ],
        vec![],
    );
    #[rustfmt::skip]
    b.add_method(
        ACC_PUBLIC_STATIC, "factorial", "(I)I", 2, 3,
        vec![
            0x04, 0x3C,                 //  0: iconst_1 istore_1   result = 1
            0x05, 0x3D,                 //  2: iconst_2 istore_2   i = 2
            0x1C, 0x1A,                 //  4: iload_2 iload_0
            0xA3, 0x00, 0x0D,           //  6: if_icmpgt -> 19
            0x1B, 0x1C, 0x68, 0x3C,     //  9: result = result * i
            0x84, 0x02, 0x01,           // 13: iinc 2, 1
            0xA7, 0xFF, 0xF4,           // 16: goto -> 4
            0x1B, 0xAC,                 // 19: iload_1 ireturn
        ],
        vec![],
    );

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(
        lines(&run),
        vec!["Hello from SimpleJVM!", "30", "35", "42", "120"]
    );
}

#[test]
fn calculator_recursion_bitops_and_count() {
    let mut b = ClassBuilder::new("Calculator");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let p_z = b.method_ref("java/io/PrintStream", "println", "(Z)V");
    let fib = b.method_ref("Calculator", "fib", "(I)I");
    let gcd = b.method_ref("Calculator", "gcd", "(II)I");
    let count_to = b.method_ref("Calculator", "countTo", "(I)V");

    #[rustfmt::skip]
    b.add_method(
        ACC_PUBLIC_STATIC, "fib", "(I)I", 3, 1,
        vec![
            0x1A, 0x05,                 //  0: iload_0 iconst_2
            0xA2, 0x00, 0x05,           //  2: if_icmpge -> 7
            0x1A, 0xAC,                 //  5: iload_0 ireturn
            0x1A, 0x04, 0x64,           //  7: n - 1
            0xB8, hi(fib), lo(fib),     // 10: fib(n-1)
            0x1A, 0x05, 0x64,           // 13: n - 2
            0xB8, hi(fib), lo(fib),     // 16: fib(n-2)
            0x60, 0xAC,                 // 19: iadd ireturn
        ],
        vec![],
    );
    #[rustfmt::skip]
    b.add_method(
        ACC_PUBLIC_STATIC, "gcd", "(II)I", 2, 3,
        vec![
            0x1B,                       //  0: iload_1
            0x99, 0x00, 0x0E,           //  1: ifeq -> 15
            0x1B, 0x3D,                 //  4: t = b
            0x1A, 0x1B, 0x70, 0x3C,     //  6: b = a % b
            0x1C, 0x3B,                 // 10: a = t
            0xA7, 0xFF, 0xF4,           // 12: goto -> 0
            0x1A, 0xAC,                 // 15: iload_0 ireturn
        ],
        vec![],
    );
    #[rustfmt::skip]
    b.add_method(
        ACC_PUBLIC_STATIC, "countTo", "(I)V", 2, 2,
        vec![
            0x04, 0x3C,                 //  0: i = 1
            0x1B, 0x1A,                 //  2: iload_1 iload_0
            0xA3, 0x00, 0x10,           //  4: if_icmpgt -> 20
            0xB2, hi(out), lo(out),     //  7: getstatic System.out
            0x1B,                       // 10: iload_1
            0xB6, hi(p_i), lo(p_i),     // 11: println(I)
            0x84, 0x01, 0x01,           // 14: iinc 1, 1
            0xA7, 0xFF, 0xF1,           // 17: goto -> 2
            0xB1,                       // 20: return
        ],
        vec![],
    );

    #[rustfmt::skip]
    let main = vec![
        0xB2, hi(out), lo(out), 0x10, 10, 0xB8, hi(fib), lo(fib), 0xB6, hi(p_i), lo(p_i),
        0xB2, hi(out), lo(out), 0x10, 48, 0x10, 18, 0xB8, hi(gcd), lo(gcd), 0xB6, hi(p_i), lo(p_i),
        0xB2, hi(out), lo(out), 0x08, 0x06, 0x7E, 0xB6, hi(p_i), lo(p_i), // 5 & 3
        0xB2, hi(out), lo(out), 0x08, 0x06, 0x80, 0xB6, hi(p_i), lo(p_i), // 5 | 3
        0xB2, hi(out), lo(out), 0x08, 0x06, 0x82, 0xB6, hi(p_i), lo(p_i), // 5 ^ 3
        0xB2, hi(out), lo(out), 0x08, 0x05, 0x78, 0xB6, hi(p_i), lo(p_i), // 5 << 2
        0xB2, hi(out), lo(out), 0x04, 0xB6, hi(p_z), lo(p_z),             // true
        0xB2, hi(out), lo(out), 0x03, 0xB6, hi(p_z), lo(p_z),             // false
        0x08, 0xB8, hi(count_to), lo(count_to),                           // countTo(5)
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 3, 1, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(
        lines(&run),
        vec!["55", "6", "1", "7", "6", "20", "true", "false", "1", "2", "3", "4", "5"]
    );
}

#[test]
fn int_and_long_arrays() {
    let mut b = ClassBuilder::new("ArrayTest");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let p_j = b.method_ref("java/io/PrintStream", "println", "(J)V");
    let big = b.long_const(100_000_000_000);

    #[rustfmt::skip]
    let main = vec![
        0x08, 0xBC, 0x0A, 0x4C,                         // int[5] -> local 1
        0x2B, 0x03, 0x10, 10, 0x4F,                     // a[0] = 10
        0x2B, 0x05, 0x10, 30, 0x4F,                     // a[2] = 30
        0x2B, 0x07, 0x10, 50, 0x4F,                     // a[4] = 50
        0xB2, hi(out), lo(out), 0x2B, 0x03, 0x2E, 0xB6, hi(p_i), lo(p_i),
        0xB2, hi(out), lo(out), 0x2B, 0x05, 0x2E, 0xB6, hi(p_i), lo(p_i),
        0xB2, hi(out), lo(out), 0x2B, 0x07, 0x2E, 0xB6, hi(p_i), lo(p_i),
        0xB2, hi(out), lo(out), 0x2B, 0xBE, 0xB6, hi(p_i), lo(p_i), // length
        0x05, 0xBC, 0x0B, 0x4D,                         // long[2] -> local 2
        0x2C, 0x03, 0x14, hi(big), lo(big), 0x50,       // l[0] = 100000000000L
        0xB2, hi(out), lo(out), 0x2C, 0x03, 0x2F, 0xB6, hi(p_j), lo(p_j),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 4, 3, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["10", "30", "50", "5", "100000000000"]);
}

#[test]
fn string_reference_arrays() {
    let mut b = ClassBuilder::new("StringArrayTest");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let p_s = b.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let string_class = b.class("java/lang/String");
    let alice = b.string("Alice");

    #[rustfmt::skip]
    let main = vec![
        0x06,                                           // iconst_3
        0xBD, hi(string_class), lo(string_class),       // anewarray String
        0x4C,                                           // astore_1
        0x2B, 0x03, 0x12, alice as u8, 0x53,            // a[0] = "Alice"
        0xB2, hi(out), lo(out), 0x2B, 0x03, 0x32, 0xB6, hi(p_s), lo(p_s),
        0xB2, hi(out), lo(out), 0x2B, 0xBE, 0xB6, hi(p_i), lo(p_i),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 3, 2, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["Alice", "3"]);
}

#[test]
fn division_by_zero_is_caught_by_matching_handler() {
    let mut b = ClassBuilder::new("ExceptionTest");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let arith = b.class("java/lang/ArithmeticException");

    #[rustfmt::skip]
    let main = vec![
        0x10, 10,                   //  0: bipush 10
        0x03,                       //  2: iconst_0
        0x6C,                       //  3: idiv
        0x3C,                       //  4: istore_1
        0xA7, 0x00, 0x0C,           //  5: goto -> 17
        0x57,                       //  8: pop (the exception)
        0xB2, hi(out), lo(out),     //  9: getstatic System.out
        0x10, 99,                   // 12: bipush 99
        0xB6, hi(p_i), lo(p_i),     // 14: println(I)
        0xB1,                       // 17: return
    ];
    b.add_method(
        ACC_PUBLIC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        2,
        main,
        vec![(0, 5, 8, arith)],
    );

    let run = run_class(&b.build());
    run.result.as_ref().expect("caught exception terminates cleanly");
    assert_eq!(lines(&run), vec!["99"]);
}

#[test]
fn callee_exception_is_caught_by_caller_as_exception() {
    let mut b = ClassBuilder::new("ThrowTest");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let iae = b.class("java/lang/IllegalArgumentException");
    let iae_init = b.method_ref("java/lang/IllegalArgumentException", "<init>", "()V");
    let thrower = b.method_ref("ThrowTest", "thrower", "()V");
    let exception = b.class("java/lang/Exception");

    #[rustfmt::skip]
    b.add_method(
        ACC_PUBLIC_STATIC, "thrower", "()V", 2, 0,
        vec![
            0xBB, hi(iae), lo(iae),             // 0: new IllegalArgumentException
            0x59,                               // 3: dup
            0xB7, hi(iae_init), lo(iae_init),   // 4: invokespecial <init> (absorbed)
            0xBF,                               // 7: athrow
        ],
        vec![],
    );

    #[rustfmt::skip]
    let main = vec![
        0xB8, hi(thrower), lo(thrower),     //  0: invokestatic thrower
        0xA7, 0x00, 0x0D,                   //  3: goto -> 16
        0x57,                               //  6: pop
        0xB2, hi(out), lo(out),             //  7: getstatic System.out
        0x10, 77,                           // 10: bipush 77
        0xB6, hi(p_i), lo(p_i),             // 12: println(I)
        0xB1,                               // 15: return (handler path)
        0xB1,                               // 16: return (normal path)
    ];
    b.add_method(
        ACC_PUBLIC_STATIC,
        "main",
        "([Ljava/lang/String;)V",
        2,
        1,
        main,
        vec![(0, 3, 6, exception)],
    );

    let run = run_class(&b.build());
    run.result.as_ref().expect("caught exception terminates cleanly");
    assert_eq!(lines(&run), vec!["77"]);
}

#[test]
fn uncaught_exception_reports_its_class() {
    let mut b = ClassBuilder::new("UncaughtTest");
    let rte = b.class("java/lang/RuntimeException");

    let main = vec![
        0xBB,
        hi(rte),
        lo(rte), // new RuntimeException (class token, never loaded)
        0xBF,    // athrow
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 1, 1, main, vec![]);

    let run = run_class(&b.build());
    match run.result {
        Err(VmError::UncaughtException { class_name }) => {
            assert_eq!(class_name, "java/lang/RuntimeException");
        }
        other => panic!("expected uncaught exception, got {other:?}"),
    }
    assert!(run.output.is_empty());
}

#[test]
fn object_allocation_fields_and_virtual_dispatch() {
    let mut b = ClassBuilder::new("Counter");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let counter = b.class("Counter");
    let counter_init = b.method_ref("Counter", "<init>", "()V");
    let object_init = b.method_ref("java/lang/Object", "<init>", "()V");
    let value = b.field_ref("Counter", "value", "I");
    let get = b.method_ref("Counter", "get", "()I");

    b.add_field(ACC_PRIVATE, "value", "I");
    b.add_method(
        ACC_PUBLIC,
        "<init>",
        "()V",
        1,
        1,
        vec![0x2A, 0xB7, hi(object_init), lo(object_init), 0xB1],
        vec![],
    );
    b.add_method(
        ACC_PUBLIC,
        "get",
        "()I",
        1,
        1,
        vec![0x2A, 0xB4, hi(value), lo(value), 0xAC],
        vec![],
    );

    #[rustfmt::skip]
    let main = vec![
        0xBB, hi(counter), lo(counter),             //  0: new Counter
        0x59,                                       //  3: dup
        0xB7, hi(counter_init), lo(counter_init),   //  4: invokespecial <init>
        0x4C,                                       //  7: astore_1
        0x2B, 0x10, 7,                              //  8: aload_1, bipush 7
        0xB5, hi(value), lo(value),                 // 11: putfield value
        0xB2, hi(out), lo(out),                     // 14: getstatic System.out
        0x2B, 0xB4, hi(value), lo(value),           // 17: aload_1, getfield value
        0xB6, hi(p_i), lo(p_i),                     // 21: println(I)
        0xB2, hi(out), lo(out),                     // 24: getstatic System.out
        0x2B, 0xB6, hi(get), lo(get),               // 27: aload_1, invokevirtual get
        0xB6, hi(p_i), lo(p_i),                     // 31: println(I)
        0xB1,                                       // 34: return
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 2, 2, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["7", "7"]);
}

#[test]
fn instanceof_and_checkcast() {
    let mut b = ClassBuilder::new("TypeTest");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_z = b.method_ref("java/io/PrintStream", "println", "(Z)V");
    let p_s = b.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let type_test = b.class("TypeTest");
    let object = b.class("java/lang/Object");
    let init = b.method_ref("TypeTest", "<init>", "()V");
    let object_init = b.method_ref("java/lang/Object", "<init>", "()V");
    let cast_ok = b.string("Cast succeeded");

    b.add_method(
        ACC_PUBLIC,
        "<init>",
        "()V",
        1,
        1,
        vec![0x2A, 0xB7, hi(object_init), lo(object_init), 0xB1],
        vec![],
    );

    #[rustfmt::skip]
    let main = vec![
        0xBB, hi(type_test), lo(type_test), 0x59, 0xB7, hi(init), lo(init), 0x4C,
        // t instanceof TypeTest -> true
        0xB2, hi(out), lo(out), 0x2B, 0xC1, hi(type_test), lo(type_test), 0xB6, hi(p_z), lo(p_z),
        // t instanceof Object -> true
        0xB2, hi(out), lo(out), 0x2B, 0xC1, hi(object), lo(object), 0xB6, hi(p_z), lo(p_z),
        // null instanceof TypeTest -> false
        0xB2, hi(out), lo(out), 0x01, 0xC1, hi(type_test), lo(type_test), 0xB6, hi(p_z), lo(p_z),
        // (TypeTest) t
        0x2B, 0xC0, hi(type_test), lo(type_test), 0x4D,
        0xB2, hi(out), lo(out), 0x12, cast_ok as u8, 0xB6, hi(p_s), lo(p_s),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 2, 3, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["true", "true", "false", "Cast succeeded"]);
}

#[test]
fn nested_monitors_release_cleanly() {
    let mut b = ClassBuilder::new("SyncTest");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_s = b.method_ref("java/io/PrintStream", "println", "(Ljava/lang/String;)V");
    let sync_test = b.class("SyncTest");
    let init = b.method_ref("SyncTest", "<init>", "()V");
    let object_init = b.method_ref("java/lang/Object", "<init>", "()V");
    let released = b.string("released");

    b.add_method(
        ACC_PUBLIC,
        "<init>",
        "()V",
        1,
        1,
        vec![0x2A, 0xB7, hi(object_init), lo(object_init), 0xB1],
        vec![],
    );

    #[rustfmt::skip]
    let main = vec![
        0xBB, hi(sync_test), lo(sync_test), 0x59, 0xB7, hi(init), lo(init), 0x4C,
        0x2B, 0xC2,                         // monitorenter
        0x2B, 0xC2,                         // monitorenter (reentrant)
        0x2B, 0xC3,                         // monitorexit
        0x2B, 0xC3,                         // monitorexit
        0xB2, hi(out), lo(out), 0x12, released as u8, 0xB6, hi(p_s), lo(p_s),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 2, 2, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["released"]);

    // The first allocation of the run is the SyncTest instance.
    let monitor = run.vm.monitors.monitor_for(MonitorKey::Object(1));
    assert_eq!(monitor.owner(), None);
    assert_eq!(monitor.entry_count(), 0);
}

#[test]
fn static_fields_accumulate() {
    let mut b = ClassBuilder::new("StaticCounter");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let counter = b.field_ref("StaticCounter", "counter", "I");
    let incr = b.method_ref("StaticCounter", "staticIncrement", "()V");

    b.add_field(ACC_PUBLIC_STATIC, "counter", "I");
    #[rustfmt::skip]
    b.add_method(
        ACC_PUBLIC_STATIC, "staticIncrement", "()V", 2, 0,
        vec![
            0xB2, hi(counter), lo(counter),     // getstatic counter
            0x04, 0x60,                         // + 1
            0xB3, hi(counter), lo(counter),     // putstatic counter
            0xB1,
        ],
        vec![],
    );

    #[rustfmt::skip]
    let main = vec![
        0xB8, hi(incr), lo(incr),
        0xB8, hi(incr), lo(incr),
        0xB2, hi(out), lo(out),
        0xB2, hi(counter), lo(counter),
        0xB6, hi(p_i), lo(p_i),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 2, 1, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["2"]);
}

#[test]
fn math_natives_resolve_through_the_registry() {
    let mut b = ClassBuilder::new("NativeTest");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let max = b.method_ref("java/lang/Math", "max", "(II)I");
    let abs = b.method_ref("java/lang/Math", "abs", "(I)I");

    #[rustfmt::skip]
    let main = vec![
        0xB2, hi(out), lo(out), 0x10, 42, 0x10, 17, 0xB8, hi(max), lo(max), 0xB6, hi(p_i), lo(p_i),
        0xB2, hi(out), lo(out), 0x10, 0xD6, 0xB8, hi(abs), lo(abs), 0xB6, hi(p_i), lo(p_i),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 3, 1, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["42", "42"]);
}

#[test]
fn event_loop_runs_named_tasks() {
    let mut b = ClassBuilder::new("EventLoopDemo");
    let submit = b.method_ref("EventLoopDemo", "submit", "(ILjava/lang/String;)V");
    let run_loop = b.method_ref("EventLoopDemo", "run", "()V");
    let task_name = b.string("task-1");

    #[rustfmt::skip]
    let main = vec![
        0x04,                               // iconst_1
        0x12, task_name as u8,              // ldc "task-1"
        0xB8, hi(submit), lo(submit),
        0xB8, hi(run_loop), lo(run_loop),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 2, 1, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["[task-1] Task 1 executing"]);
    assert_eq!(run.vm.event_loop.stats().0, 1);
}

#[test]
fn event_loop_callback_bridge_runs_host_objects() {
    let mut b = ClassBuilder::new("Ticker");
    let out = b.field_ref("java/lang/System", "out", "Ljava/io/PrintStream;");
    let p_i = b.method_ref("java/io/PrintStream", "println", "(I)V");
    let ticker = b.class("Ticker");
    let init = b.method_ref("Ticker", "<init>", "()V");
    let object_init = b.method_ref("java/lang/Object", "<init>", "()V");
    let submit_runnable = b.method_ref("EventLoopDemo", "submitRunnable", "(Ljava/lang/Runnable;)V");
    let run_loop = b.method_ref("EventLoopDemo", "run", "()V");

    b.add_method(
        ACC_PUBLIC,
        "<init>",
        "()V",
        1,
        1,
        vec![0x2A, 0xB7, hi(object_init), lo(object_init), 0xB1],
        vec![],
    );
    b.add_method(
        ACC_PUBLIC,
        "run",
        "()V",
        2,
        1,
        vec![0xB2, hi(out), lo(out), 0x08, 0xB6, hi(p_i), lo(p_i), 0xB1],
        vec![],
    );

    #[rustfmt::skip]
    let main = vec![
        0xBB, hi(ticker), lo(ticker), 0x59, 0xB7, hi(init), lo(init),
        0xB8, hi(submit_runnable), lo(submit_runnable),
        0xB8, hi(run_loop), lo(run_loop),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 2, 1, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["5"]);
}

#[test]
fn event_loop_fires_timers() {
    let mut b = ClassBuilder::new("EventLoopDemo");
    let set_timeout = b.method_ref("EventLoopDemo", "setTimeout", "(ILjava/lang/String;J)V");
    let run_loop = b.method_ref("EventLoopDemo", "run", "()V");
    let timer_name = b.string("t");

    #[rustfmt::skip]
    let main = vec![
        0x05,                               // iconst_2
        0x12, timer_name as u8,             // ldc "t"
        0x0A,                               // lconst_1 (1 ms)
        0xB8, hi(set_timeout), lo(set_timeout),
        0xB8, hi(run_loop), lo(run_loop),
        0xB1,
    ];
    b.add_method(ACC_PUBLIC_STATIC, "main", "([Ljava/lang/String;)V", 4, 1, main, vec![]);

    let run = run_class(&b.build());
    run.result.as_ref().expect("clean termination");
    assert_eq!(lines(&run), vec!["[t] Timer 2 fired after 1ms"]);
    assert_eq!(run.vm.event_loop.stats().1, 1);
}

#[test]
fn missing_main_is_a_linkage_error() {
    let b = ClassBuilder::new("NoMain");
    let run = run_class(&b.build());
    match run.result {
        Err(VmError::MethodNotFound(message)) => {
            assert!(message.contains("NoMain.main"), "message: {message}");
        }
        other => panic!("expected MethodNotFound, got {other:?}"),
    }
}
