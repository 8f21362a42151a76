use crate::protocol::Type;

use super::SignatureError;

/// Maximum container nesting depth the D-Bus specification allows for
/// arrays and for structs (tracked separately below, matching the real
/// protocol limits rather than a single combined counter).
pub(crate) const MAX_DEPTH: u32 = 32;

/// Validate that `bytes` is a sequence of zero or more complete types, and
/// that container nesting never exceeds [`MAX_DEPTH`] for arrays or for
/// structs independently.
pub(crate) fn validate(bytes: &[u8]) -> Result<(), SignatureError> {
    if bytes.len() > 255 {
        return Err(SignatureError::TooLong);
    }

    let mut array_depth = 0u32;
    let mut struct_depth = 0u32;
    let mut stack: Vec<u8> = Vec::new();

    for &b in bytes {
        match b {
            b'a' => {
                array_depth += 1;
                if array_depth > MAX_DEPTH {
                    return Err(SignatureError::TooDeep);
                }
                // The array's own depth is released the moment its single
                // element type has been consumed; track that via the stack
                // as a special one-shot marker.
                stack.push(b'a');
                continue;
            }
            b'(' | b'{' => {
                struct_depth += 1;
                if struct_depth > MAX_DEPTH {
                    return Err(SignatureError::TooDeep);
                }
                if b == b'{' {
                    // A dict-entry may only appear directly inside an array,
                    // and its key must be a basic type; the latter is
                    // checked when we see the key type code below.
                }
                stack.push(b);
                continue;
            }
            b')' => {
                if stack.pop() != Some(b'(') {
                    return Err(SignatureError::UnbalancedContainer);
                }
                struct_depth -= 1;
            }
            b'}' => {
                if stack.pop() != Some(b'{') {
                    return Err(SignatureError::UnbalancedContainer);
                }
                struct_depth -= 1;
            }
            _ => {
                let ty = Type(b);
                if ty == Type::INVALID || ty.is_container() && ty != Type::VARIANT {
                    // ARRAY/STRUCT/DICT_ENTRY raw codes never appear literally
                    // except via their delimiters, handled above.
                    if ty == Type::ARRAY || ty == Type::STRUCT || ty == Type::DICT_ENTRY {
                        return Err(SignatureError::InvalidTypeCode(b));
                    }
                }
                if !ty.is_basic() && ty != Type::VARIANT {
                    return Err(SignatureError::InvalidTypeCode(b));
                }
            }
        }

        // Pop any array markers: a single complete type immediately
        // following `a` closes that array nesting level.
        while matches!(stack.last(), Some(b'a')) {
            stack.pop();
            array_depth -= 1;
        }
    }

    if !stack.is_empty() {
        return Err(SignatureError::UnbalancedContainer);
    }

    Ok(())
}

/// Compute the length in bytes of the single complete type starting at the
/// front of `bytes`, or `None` if `bytes` does not start with one.
pub(crate) fn complete_type_len(bytes: &[u8]) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'a' => continue,
            b'(' | b'{' => depth += 1,
            b')' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {
                if depth == 0 {
                    return Some(i + 1);
                }
            }
        }
    }
    None
}
