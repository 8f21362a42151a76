use super::Signature;

#[test]
fn basic_signatures_parse() {
    assert!(Signature::new(b"y").is_ok());
    assert!(Signature::new(b"").is_ok());
    assert!(Signature::new(b"ai").is_ok());
    assert!(Signature::new(b"a{sv}").is_ok());
    assert!(Signature::new(b"aa{si}").is_ok());
}

#[test]
fn nested_struct_signature_matches_literal() {
    let sig = Signature::new(b"(ybnqiuxtdsogh)").unwrap();
    assert_eq!(sig.as_str(), "(ybnqiuxtdsogh)");
}

#[test]
fn dict_and_array_of_dict_signatures() {
    assert_eq!(Signature::new(b"a{sv}").unwrap().as_str(), "a{sv}");
    assert_eq!(Signature::new(b"aa{si}").unwrap().as_str(), "aa{si}");
}

#[test]
fn unbalanced_struct_is_rejected() {
    assert!(Signature::new(b"(i").is_err());
    assert!(Signature::new(b"i)").is_err());
}

#[test]
fn invalid_type_code_is_rejected() {
    assert!(Signature::new(b"Z").is_err());
}

#[test]
fn dangling_array_is_rejected() {
    // `a` with nothing following is not a complete type.
    assert!(Signature::new(b"a").is_err());
}

#[test]
fn iter_splits_struct_fields() {
    let sig = Signature::new(b"sii").unwrap();
    let parts: Vec<_> = sig.iter().map(|s| s.as_str().to_string()).collect();
    assert_eq!(parts, vec!["s", "i", "i"]);
}

#[test]
fn array_element_accessor() {
    let sig = Signature::new(b"ai").unwrap();
    assert_eq!(sig.array_element().unwrap().as_str(), "i");
    assert!(Signature::new(b"i").unwrap().array_element().is_none());
}
