//! Assertion control (RFC 4528) for the revision-guarded modify.
//!
//! `ldap3` exposes request controls as a raw OID plus BER-encoded value. The
//! only filter this crate ever asserts is a single equalityMatch on the
//! integer-valued revision attribute, so the encoder below covers exactly
//! that: `[3] { attributeDesc OCTET STRING, assertionValue OCTET STRING }`.

use ldap3::controls::RawControl;

use crate::entry::ATTR_REVISION;

/// OID of the LDAP Assertion control.
const ASSERTION_OID: &str = "1.3.6.1.1.12";

/// Context-specific constructed tag 3: Filter CHOICE equalityMatch.
const TAG_EQUALITY_MATCH: u8 = 0xA3;
/// Universal primitive tag 4: OCTET STRING.
const TAG_OCTET_STRING: u8 = 0x04;

/// Control asserting that the entry still carries `expected` as its revision.
/// Critical: a server that cannot evaluate it must reject the modify.
pub fn revision_assertion(expected: i64) -> RawControl {
    RawControl {
        ctype: ASSERTION_OID.into(),
        crit: true,
        val: Some(equality_filter(ATTR_REVISION, &expected.to_string())),
    }
}

fn equality_filter(attribute: &str, value: &str) -> Vec<u8> {
    let mut inner = Vec::with_capacity(attribute.len() + value.len() + 4);
    write_octet_string(&mut inner, attribute.as_bytes());
    write_octet_string(&mut inner, value.as_bytes());

    let mut out = Vec::with_capacity(inner.len() + 4);
    out.push(TAG_EQUALITY_MATCH);
    write_length(&mut out, inner.len());
    out.extend_from_slice(&inner);
    out
}

fn write_octet_string(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.push(TAG_OCTET_STRING);
    write_length(buf, bytes.len());
    buf.extend_from_slice(bytes);
}

fn write_length(buf: &mut Vec<u8>, len: usize) {
    if len < 128 {
        buf.push(len as u8);
    } else {
        // Long form; lengths here are tiny, but keep the encoder honest.
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        let significant = &bytes[skip..];
        buf.push(0x80 | significant.len() as u8);
        buf.extend_from_slice(significant);
    }
}
