//! Request subject naming.
//!
//! Client call code and server registration code both derive the request
//! subject for a function from the same three inputs, so they meet on the
//! bus without any exchange of addresses:
//!
//! ```text
//! {prefix}.rpc.0.1.{interface}.{function}
//! ```
//!
//! `interface` and `function` are escaped so a name containing a separator
//! or wildcard character can never alias another pair. Reply subjects are
//! not derived here; each call gets a private inbox from the transport.

use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::Address;

/// Protocol tag between the prefix and the function path.
pub const PROTOCOL: &str = "rpc.0.1";

/// Default namespace prefix.
pub const DEFAULT_PREFIX: &str = "rpc";

/// Maps `(interface, function)` pairs to request subjects under a prefix.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubjectScheme {
    prefix: Arc<str>,
}

impl SubjectScheme {
    pub fn new(prefix: impl Into<Arc<str>>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Subject a server subscribes to and a client publishes to.
    pub fn request_subject(&self, interface: &str, function: &str) -> Address {
        Address::from(format!(
            "{}.{PROTOCOL}.{}.{}",
            self.prefix,
            escape_segment(interface),
            escape_segment(function)
        ))
    }
}

impl Default for SubjectScheme {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX)
    }
}

fn needs_escape(c: char) -> bool {
    matches!(c, '.' | '%' | '*' | '>' | '+' | '#') || c.is_whitespace() || c.is_control()
}

/// Percent-encode the characters that would break subject tokenization.
///
/// `%` itself is escaped, which keeps the mapping injective.
pub fn escape_segment(segment: &str) -> Cow<'_, str> {
    if !segment.chars().any(needs_escape) {
        return Cow::Borrowed(segment);
    }

    let mut out = String::with_capacity(segment.len() + 8);
    let mut utf8 = [0u8; 4];
    for c in segment.chars() {
        if needs_escape(c) {
            for byte in c.encode_utf8(&mut utf8).bytes() {
                // Writing to a String cannot fail.
                let _ = write!(out, "%{byte:02X}");
            }
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_request_subject_format() {
        // ---
        let scheme = SubjectScheme::default();
        assert_eq!(
            scheme.request_subject("wrpc-test:integration/sync", "f").as_str(),
            "rpc.rpc.0.1.wrpc-test:integration/sync.f"
        );

        let scheme = SubjectScheme::new("test-prefix");
        assert_eq!(
            scheme.request_subject("foo", "foo").as_str(),
            "test-prefix.rpc.0.1.foo.foo"
        );
    }

    #[test]
    fn test_same_inputs_same_subject() {
        // ---
        let client = SubjectScheme::new("p");
        let server = SubjectScheme::new(String::from("p"));
        assert_eq!(
            client.request_subject("foo", "f"),
            server.request_subject("foo", "f")
        );
    }

    #[test]
    fn test_separators_do_not_collide() {
        // ---
        let scheme = SubjectScheme::default();
        let a = scheme.request_subject("a.b", "c");
        let b = scheme.request_subject("a", "b.c");
        assert_ne!(a, b);
        assert_eq!(a.as_str(), "rpc.rpc.0.1.a%2Eb.c");

        // A literal "%2E" must not alias an escaped ".".
        let c = scheme.request_subject("a%2Eb", "c");
        assert_ne!(a, c);
    }

    #[test]
    fn test_wildcards_and_whitespace_escaped() {
        // ---
        assert_eq!(escape_segment("a*b>c"), "a%2Ab%3Ec");
        assert_eq!(escape_segment("x y"), "x%20y");
        assert!(matches!(escape_segment("plain-name"), Cow::Borrowed(_)));
    }
}
