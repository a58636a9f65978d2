use dlite::identity::{get_uuid, get_uuid_n, join_meta_uri, split_meta_uri, UuidVersion};

#[test]
fn empty_id_generates_random_v4() {
    let (uuid, version) = get_uuid("");
    assert_eq!(version, UuidVersion::Random);
    assert_eq!(version.number(), 4);
    assert_eq!(uuid.len(), 36);
    assert_eq!(uuid.as_bytes()[14], b'4', "version nibble should be 4");
    // random: two calls must differ
    let (other, _) = get_uuid("");
    assert_ne!(uuid, other);
}

#[test]
fn canonical_uuid_is_copied_lowercased() {
    let id = "8690CC2D-0A45-4DC4-9AE2-3B7A0AFF7264";
    let (uuid, version) = get_uuid(id);
    assert_eq!(version, UuidVersion::Copy);
    assert_eq!(version.number(), 0);
    assert_eq!(uuid, id.to_lowercase());
}

#[test]
fn name_derives_deterministic_v5() {
    let (a, version) = get_uuid("myinst");
    assert_eq!(version, UuidVersion::Hashed);
    assert_eq!(version.number(), 5);
    // sha1 under the DNS namespace is machine independent
    assert_eq!(a, "8411a72c-c7a3-5a6a-b126-1e90b8a55ae2");
    let (b, _) = get_uuid("myinst");
    assert_eq!(a, b);
}

#[test]
fn near_uuid_strings_are_hashed_not_copied() {
    // wrong length
    let (_, version) = get_uuid("8690cc2d-0a45-4dc4-9ae2-3b7a0aff726");
    assert_eq!(version, UuidVersion::Hashed);
    // hyphen in the wrong place
    let (_, version) = get_uuid("8690cc2d0-a45-4dc4-9ae2-3b7a0aff7264");
    assert_eq!(version, UuidVersion::Hashed);
    // non-hex character
    let (_, version) = get_uuid("8690cc2d-0a45-4dc4-9ae2-3b7a0aff726g");
    assert_eq!(version, UuidVersion::Hashed);
}

#[test]
fn get_uuid_n_bounds_the_id() {
    let (bounded, version) = get_uuid_n("myinst.trailing", 6);
    assert_eq!(version, UuidVersion::Hashed);
    assert_eq!(bounded, get_uuid("myinst").0);
}

#[test]
fn meta_uri_round_trip() {
    let uri = join_meta_uri("Chemistry", "0.1", "http://www.sintef.no/calm");
    assert_eq!(uri, "http://www.sintef.no/calm/0.1/Chemistry");
    let (name, version, namespace) = split_meta_uri(&uri).unwrap();
    assert_eq!(name, "Chemistry");
    assert_eq!(version, "0.1");
    assert_eq!(namespace, "http://www.sintef.no/calm");
}

#[test]
fn split_requires_two_separators() {
    assert!(split_meta_uri("no-separators").is_err());
    assert!(split_meta_uri("only/one").is_err());
    // empty namespace segment
    assert!(split_meta_uri("/0.1/Name").is_err());
}
