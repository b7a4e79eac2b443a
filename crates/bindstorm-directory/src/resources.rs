//! Bundled fixtures
//!
//! LDIF files compiled into the crate, looked up by file name the way a
//! classpath resource would be.

use std::borrow::Cow;
use std::path::Path;

/// Name of the default fixture.
pub const DEFAULT_LDIF: &str = "test.ldif";

const BUNDLED: &[(&str, &str)] = &[(DEFAULT_LDIF, include_str!("../resources/test.ldif"))];

/// Content of a bundled resource.
pub fn bundled(name: &str) -> Option<&'static str> {
    BUNDLED
        .iter()
        .find(|(bundled_name, _)| *bundled_name == name)
        .map(|(_, content)| *content)
}

/// Resolve a resource: bundled first, then a filesystem path.
pub fn resolve(name: &str) -> std::io::Result<Cow<'static, str>> {
    if let Some(content) = bundled(name) {
        return Ok(Cow::Borrowed(content));
    }
    std::fs::read_to_string(Path::new(name)).map(Cow::Owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_fixture_is_bundled() {
        let content = bundled(DEFAULT_LDIF).unwrap();
        assert!(content.contains("dn: cn=Horatio Hornblower,ou=people,o=sevenSeas"));
    }

    #[test]
    fn test_resolve_filesystem_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "dn: o=x").unwrap();
        let content = resolve(file.path().to_str().unwrap()).unwrap();
        assert_eq!(content, "dn: o=x\n");
    }

    #[test]
    fn test_resolve_unknown() {
        assert!(resolve("no-such-fixture.ldif").is_err());
    }
}
