use crate::protocol::Endianness;

use super::{Reader, Writer};

#[test]
fn round_trip_scalars() {
    let mut w = Writer::new();
    w.write_u8(7);
    w.write_u32(42);
    w.write_f64(1.5);
    w.write_string("hi");

    let mut r = Reader::new(w.as_bytes(), Endianness::NATIVE);
    assert_eq!(r.read_u8().unwrap(), 7);
    assert_eq!(r.read_u32().unwrap(), 42);
    assert_eq!(r.read_f64().unwrap(), 1.5);
    assert_eq!(r.read_string().unwrap(), "hi");
    assert!(r.is_empty());
}

#[test]
fn alignment_inserts_padding() {
    let mut w = Writer::new();
    w.write_u8(1);
    w.write_u64(2);
    // 1 byte + 7 bytes padding + 8 byte u64 == 16.
    assert_eq!(w.len(), 16);
}

#[test]
fn truncate_abandons_partial_container() {
    let mut w = Writer::new();
    w.write_u32(1);
    let mark = w.len();
    w.write_u32(2);
    w.write_u32(3);
    w.truncate(mark);
    assert_eq!(w.len(), mark);

    let mut r = Reader::new(w.as_bytes(), Endianness::NATIVE);
    assert_eq!(r.read_u32().unwrap(), 1);
    assert!(r.is_empty());
}
