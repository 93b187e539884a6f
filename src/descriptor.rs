//! Method-descriptor parsing: argument type tags, slot counting, and
//! the return-type split. Every top-level type counts as one slot,
//! matching the runtime's single-slot value model.
use regex::Regex;

/// One tag per argument: the primitive descriptor character, `L` for
/// any object type, `[` for any array type.
pub fn parse_arg_types(descriptor: &str) -> Vec<u8> {
    let bytes = descriptor.as_bytes();
    let mut types = Vec::new();
    let mut i = 1; // skip '('
    while i < bytes.len() && bytes[i] != b')' {
        match bytes[i] {
            b'B' | b'C' | b'F' | b'I' | b'S' | b'Z' | b'D' | b'J' => {
                types.push(bytes[i]);
                i += 1;
            }
            b'L' => {
                types.push(b'L');
                while i < bytes.len() && bytes[i] != b';' {
                    i += 1;
                }
                i += 1;
            }
            b'[' => {
                types.push(b'[');
                i += 1;
                while i < bytes.len() && bytes[i] == b'[' {
                    i += 1;
                }
                if i < bytes.len() && bytes[i] == b'L' {
                    while i < bytes.len() && bytes[i] != b';' {
                        i += 1;
                    }
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    types
}

/// Number of argument slots in a method descriptor.
pub fn count_args(descriptor: &str) -> usize {
    parse_arg_types(descriptor).len()
}

/// The return-type portion of a method descriptor, split out of the
/// `(args)ret` shape; empty when the descriptor is malformed.
pub fn return_type(descriptor: &str) -> String {
    let re = Regex::new(r"\(([^\)]*)\)([^$]+)").expect("descriptor pattern");
    re.captures(descriptor)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Does the tag denote a reference (object or array) argument?
pub fn is_reference_tag(tag: u8) -> bool {
    tag == b'L' || tag == b'['
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_argument_slots() {
        let cases: &[(&str, usize)] = &[
            ("()V", 0),
            ("(I)V", 1),
            ("(II)I", 2),
            ("(IJ)V", 2),
            ("(Ljava/lang/String;)V", 1),
            ("(ILjava/lang/String;I)V", 3),
            ("([I)V", 1),
            ("([Ljava/lang/Object;)V", 1),
            ("(II[BLjava/lang/String;)I", 4),
            ("(Ljava/lang/Object;ILjava/lang/Object;II)V", 5),
        ];
        for (descriptor, want) in cases {
            assert_eq!(count_args(descriptor), *want, "descriptor {descriptor}");
        }
    }

    #[test]
    fn tags_argument_kinds() {
        assert_eq!(parse_arg_types("(IJ)V"), vec![b'I', b'J']);
        assert_eq!(parse_arg_types("(Ljava/lang/String;I)V"), vec![b'L', b'I']);
        assert_eq!(parse_arg_types("([[IZ)V"), vec![b'[', b'Z']);
        assert_eq!(parse_arg_types("([Ljava/lang/String;)V"), vec![b'[']);
        assert_eq!(parse_arg_types("(DFS)V"), vec![b'D', b'F', b'S']);
    }

    #[test]
    fn splits_out_the_return_type() {
        assert_eq!(return_type("()V"), "V");
        assert_eq!(return_type("(II)I"), "I");
        assert_eq!(return_type("(I)Ljava/lang/String;"), "Ljava/lang/String;");
        assert_eq!(return_type("([I)[J"), "[J");
        assert_eq!(return_type("garbage"), "");
    }

    #[test]
    fn reference_tags() {
        assert!(is_reference_tag(b'L'));
        assert!(is_reference_tag(b'['));
        assert!(!is_reference_tag(b'I'));
        assert!(!is_reference_tag(b'J'));
    }
}
