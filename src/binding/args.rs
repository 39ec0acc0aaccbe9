//! Marshalling of host call arguments.

use midiport_core::Error;
use serde_json::Value;
use smallvec::SmallVec;

/// Outgoing messages up to this size are copied without a heap allocation.
pub const INLINE_MESSAGE_BYTES: usize = 16;

pub type MessageBytes = SmallVec<[u8; INLINE_MESSAGE_BYTES]>;

fn ordinal(position: usize) -> &'static str {
    match position {
        0 => "First",
        1 => "Second",
        2 => "Third",
        _ => "Argument",
    }
}

fn invalid(position: usize, what: &str) -> Error {
    Error::InvalidArgument(format!("{} argument must be {}", ordinal(position), what))
}

/// Non-negative integer that fits in 32 bits. Host numbers are doubles, so an
/// integral float such as `1.0` is accepted.
pub fn port_index(args: &[Value], position: usize) -> Result<usize, Error> {
    let value = args.get(position).ok_or_else(|| invalid(position, "an integer"))?;
    let index = match value {
        Value::Number(n) => match n.as_u64() {
            Some(i) => Some(i),
            None => n
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 0.0)
                .map(|f| f as u64),
        },
        _ => None,
    };
    index
        .filter(|&i| i <= u64::from(u32::MAX))
        .map(|i| i as usize)
        .ok_or_else(|| invalid(position, "an integer"))
}

pub fn string(args: &[Value], position: usize) -> Result<&str, Error> {
    args.get(position)
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(position, "a string"))
}

/// Array of integers in `0..=255`, copied into one contiguous buffer.
pub fn message_bytes(args: &[Value], position: usize) -> Result<MessageBytes, Error> {
    let items = args
        .get(position)
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(position, "an array"))?;

    items
        .iter()
        .map(|item| {
            byte(item).ok_or_else(|| {
                Error::InvalidArgument(format!("Message bytes must be integers 0-255, got {}", item))
            })
        })
        .collect()
}

fn byte(value: &Value) -> Option<u8> {
    let Value::Number(n) = value else {
        return None;
    };
    match n.as_u64() {
        Some(i) => u8::try_from(i).ok(),
        None => n
            .as_f64()
            .filter(|f| f.fract() == 0.0 && (0.0..=255.0).contains(f))
            .map(|f| f as u8),
    }
}

/// Exactly three booleans.
pub fn three_booleans(args: &[Value]) -> Result<(bool, bool, bool), Error> {
    match args {
        [Value::Bool(a), Value::Bool(b), Value::Bool(c)] => Ok((*a, *b, *c)),
        _ => Err(Error::InvalidArgument(
            "Arguments must be three booleans".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_port_index() {
        assert_eq!(port_index(&[json!(3)], 0).unwrap(), 3);
        assert_eq!(port_index(&[json!(2.0)], 0).unwrap(), 2);
        assert!(port_index(&[json!(-1)], 0).is_err());
        assert!(port_index(&[json!(1.5)], 0).is_err());
        assert!(port_index(&[json!("0")], 0).is_err());
        assert!(port_index(&[json!(4_294_967_296u64)], 0).is_err());
        assert!(port_index(&[], 0).is_err());
    }

    #[test]
    fn test_port_index_message() {
        let err = port_index(&[json!(null)], 0).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid argument: First argument must be an integer"
        );
    }

    #[test]
    fn test_string() {
        assert_eq!(string(&[json!("Virtual")], 0).unwrap(), "Virtual");
        assert!(string(&[json!(1)], 0).is_err());
    }

    #[test]
    fn test_message_bytes() {
        let bytes = message_bytes(&[json!([0x90, 64, 127.0])], 0).unwrap();
        assert_eq!(bytes.as_slice(), &[0x90, 64, 127]);
        assert!(!bytes.spilled());

        assert!(message_bytes(&[json!([0x90, 256])], 0).is_err());
        assert!(message_bytes(&[json!([0x90, -1])], 0).is_err());
        assert!(message_bytes(&[json!([0x90, "64"])], 0).is_err());
        assert!(message_bytes(&[json!("0x90")], 0).is_err());
    }

    #[test]
    fn test_long_message_spills() {
        let sysex: Vec<u8> = std::iter::once(0xF0)
            .chain(std::iter::repeat(0x01).take(100))
            .chain(std::iter::once(0xF7))
            .collect();
        let bytes = message_bytes(&[json!(sysex)], 0).unwrap();
        assert!(bytes.spilled());
        assert_eq!(bytes.len(), 102);
    }

    #[test]
    fn test_three_booleans() {
        assert_eq!(
            three_booleans(&[json!(true), json!(false), json!(true)]).unwrap(),
            (true, false, true)
        );
        assert!(three_booleans(&[json!(true), json!(false)]).is_err());
        assert!(three_booleans(&[json!(true), json!(false), json!(1)]).is_err());
        assert!(three_booleans(&[json!(true), json!(true), json!(true), json!(true)]).is_err());
    }
}
