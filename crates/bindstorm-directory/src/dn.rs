//! Distinguished names
//!
//! A small RFC 4514 parser covering what directory fixtures use in practice:
//! escaped specials and hex pairs, quoted values, and multi-valued RDNs.
//! Comparison uses a normalised form with lowercased attribute types and
//! values, which matches the `caseIgnoreMatch` rules of the naming attributes
//! (`cn`, `ou`, `o`, `dc`, `uid`) the embedded directory deals with.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::DnError;

/// A single `type=value` assertion inside an RDN.
#[derive(Debug, Clone)]
pub struct Ava {
    attr: String,
    value: String,
}

impl Ava {
    /// Attribute type as written.
    pub fn attr(&self) -> &str {
        &self.attr
    }

    /// Unescaped attribute value.
    pub fn value(&self) -> &str {
        &self.value
    }

    fn normalized(&self) -> String {
        format!(
            "{}={}",
            self.attr.to_ascii_lowercase(),
            escape_value(&self.value.to_lowercase())
        )
    }
}

/// Relative distinguished name: one or more AVAs joined by `+`.
#[derive(Debug, Clone)]
pub struct Rdn {
    avas: Vec<Ava>,
}

impl Rdn {
    /// The assertions making up this RDN.
    pub fn avas(&self) -> &[Ava] {
        &self.avas
    }

    fn normalized(&self) -> String {
        let mut parts: Vec<String> = self.avas.iter().map(Ava::normalized).collect();
        parts.sort();
        parts.join("+")
    }
}

impl fmt::Display for Rdn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ava) in self.avas.iter().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            write!(f, "{}={}", ava.attr, escape_value(&ava.value))?;
        }
        Ok(())
    }
}

/// A parsed distinguished name, most specific RDN first.
#[derive(Debug, Clone)]
pub struct Dn {
    rdns: Vec<Rdn>,
    norm: String,
}

impl Dn {
    /// The empty (root) DN.
    pub fn root() -> Self {
        Self {
            rdns: Vec::new(),
            norm: String::new(),
        }
    }

    /// Parse a DN string.
    pub fn parse(input: &str) -> Result<Self, DnError> {
        if input.trim().is_empty() {
            return Ok(Self::root());
        }

        let mut rdns = Vec::new();
        for raw_rdn in split_unescaped(input, &[',', ';'])? {
            if raw_rdn.trim().is_empty() {
                return Err(DnError::EmptyRdn {
                    dn: input.to_string(),
                });
            }

            let mut avas = Vec::new();
            for raw_ava in split_unescaped(&raw_rdn, &['+'])? {
                avas.push(parse_ava(input, &raw_ava)?);
            }
            rdns.push(Rdn { avas });
        }

        Ok(Self::from_rdns(rdns))
    }

    fn from_rdns(rdns: Vec<Rdn>) -> Self {
        let norm = rdns
            .iter()
            .map(Rdn::normalized)
            .collect::<Vec<_>>()
            .join(",");
        Self { rdns, norm }
    }

    /// Whether this is the root DN.
    pub fn is_root(&self) -> bool {
        self.rdns.is_empty()
    }

    /// Number of RDNs.
    pub fn len(&self) -> usize {
        self.rdns.len()
    }

    /// Whether the DN has no RDNs (same as [`Dn::is_root`]).
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }

    /// The RDNs, most specific first.
    pub fn rdns(&self) -> &[Rdn] {
        &self.rdns
    }

    /// The leftmost RDN.
    pub fn rdn(&self) -> Option<&Rdn> {
        self.rdns.first()
    }

    /// The parent DN, `None` for the root.
    pub fn parent(&self) -> Option<Dn> {
        if self.rdns.is_empty() {
            return None;
        }
        Some(Self::from_rdns(self.rdns[1..].to_vec()))
    }

    /// Normalised comparison key.
    pub fn normalized(&self) -> &str {
        &self.norm
    }

    /// True when `self` equals `ancestor` or lies below it.
    pub fn is_descendant_of(&self, ancestor: &Dn) -> bool {
        if ancestor.rdns.len() > self.rdns.len() {
            return false;
        }
        let offset = self.rdns.len() - ancestor.rdns.len();
        self.rdns[offset..]
            .iter()
            .zip(ancestor.rdns.iter())
            .all(|(a, b)| a.normalized() == b.normalized())
    }

    /// True when `self` is an immediate child of `parent`.
    pub fn is_child_of(&self, parent: &Dn) -> bool {
        self.rdns.len() == parent.rdns.len() + 1 && self.is_descendant_of(parent)
    }
}

impl PartialEq for Dn {
    fn eq(&self, other: &Self) -> bool {
        self.norm == other.norm
    }
}

impl Eq for Dn {}

impl Hash for Dn {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.norm.hash(state);
    }
}

impl fmt::Display for Dn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, rdn) in self.rdns.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{rdn}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Dn {
    type Err = DnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dn::parse(s)
    }
}

/// Split on any of `separators`, ignoring escaped characters and quoted runs.
/// Escape sequences are kept verbatim in the output pieces.
fn split_unescaped(input: &str, separators: &[char]) -> Result<Vec<String>, DnError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    let mut quoted = false;

    for ch in input.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
            continue;
        }
        match ch {
            '\\' => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                current.push(ch);
                quoted = !quoted;
            }
            c if !quoted && separators.contains(&c) => {
                parts.push(std::mem::take(&mut current));
            }
            c => current.push(c),
        }
    }

    if quoted {
        return Err(DnError::UnterminatedQuote {
            dn: input.to_string(),
        });
    }
    parts.push(current);
    Ok(parts)
}

fn parse_ava(dn: &str, raw: &str) -> Result<Ava, DnError> {
    let Some((attr, value)) = raw.split_once('=') else {
        return Err(DnError::MissingSeparator {
            dn: dn.to_string(),
            rdn: raw.trim().to_string(),
        });
    };

    let attr = attr.trim();
    if attr.is_empty() {
        return Err(DnError::EmptyAttributeType { dn: dn.to_string() });
    }

    Ok(Ava {
        attr: attr.to_string(),
        value: unescape_value(dn, trim_unescaped(value))?,
    })
}

/// Trim surrounding spaces, keeping a trailing space that is escaped.
fn trim_unescaped(value: &str) -> &str {
    let mut value = value.trim_start();
    while value.ends_with(' ') && !value.ends_with("\\ ") {
        value = &value[..value.len() - 1];
    }
    value
}

fn unescape_value(dn: &str, raw: &str) -> Result<String, DnError> {
    let raw = match raw.strip_prefix('"').and_then(|v| v.strip_suffix('"')) {
        Some(inner) => inner,
        None => raw,
    };

    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let bad = || DnError::BadEscape {
            dn: dn.to_string(),
            offset: i,
        };

        let next = *bytes.get(i + 1).ok_or_else(bad)?;
        if next.is_ascii_hexdigit() {
            let hi = hex_value(next).ok_or_else(bad)?;
            let lo = bytes.get(i + 2).copied().and_then(hex_value).ok_or_else(bad)?;
            out.push(hi << 4 | lo);
            i += 3;
        } else if matches!(
            next,
            b',' | b'+' | b'"' | b'\\' | b'<' | b'>' | b';' | b'=' | b'#' | b' '
        ) {
            out.push(next);
            i += 2;
        } else {
            return Err(bad());
        }
    }

    String::from_utf8(out).map_err(|_| DnError::BadEscape {
        dn: dn.to_string(),
        offset: 0,
    })
}

fn hex_value(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

/// Escape an attribute value for use in a DN string (RFC 4514 §2.4).
pub fn escape_value(value: &str) -> String {
    let count = value.chars().count();
    let mut result = String::with_capacity(value.len() * 2);

    for (i, ch) in value.chars().enumerate() {
        let is_first = i == 0;
        let is_last = i + 1 == count;

        match ch {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(ch);
            }
            '\0' => result.push_str("\\00"),
            ' ' if is_first || is_last => result.push_str("\\20"),
            '#' if is_first => result.push_str("\\23"),
            _ => result.push(ch),
        }
    }

    result
}
