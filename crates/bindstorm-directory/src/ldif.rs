//! LDIF import
//!
//! Parses the content-record subset of RFC 2849 that directory fixtures use
//! and bulk-imports the records through the admin session.

use std::path::{Path, PathBuf};

use base64::Engine;
use tracing::{debug, info, warn};

use crate::dn::Dn;
use crate::entry::Entry;
use crate::error::{DirectoryError, DirectoryResult, LdifError};
use crate::service::AdminSession;

/// One content record.
#[derive(Debug, Clone)]
pub struct LdifRecord {
    pub dn: Dn,
    pub attributes: Vec<(String, String)>,
    /// Line number of the `dn:` line.
    pub line: usize,
}

impl LdifRecord {
    /// Convert into a directory entry.
    pub fn into_entry(self) -> Entry {
        let mut entry = Entry::new(self.dn);
        for (name, value) in self.attributes {
            entry.add_value(&name, value);
        }
        entry
    }
}

/// A logical (unfolded) line with the number of its first physical line.
struct Line {
    number: usize,
    text: String,
}

/// Parse LDIF content into records.
pub fn parse(input: &str) -> Result<Vec<LdifRecord>, LdifError> {
    let mut blocks: Vec<Vec<Line>> = Vec::new();
    let mut current: Vec<Line> = Vec::new();
    let mut in_comment = false;

    for (idx, raw) in input.lines().enumerate() {
        let number = idx + 1;

        if let Some(rest) = raw.strip_prefix(' ') {
            if in_comment {
                continue;
            }
            match current.last_mut() {
                Some(line) => line.text.push_str(rest),
                None => return Err(LdifError::DanglingContinuation { line: number }),
            }
            continue;
        }

        in_comment = false;
        if raw.starts_with('#') {
            in_comment = true;
            continue;
        }

        if raw.trim().is_empty() {
            if !current.is_empty() {
                blocks.push(std::mem::take(&mut current));
            }
            continue;
        }

        current.push(Line {
            number,
            text: raw.to_string(),
        });
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    let mut records = Vec::new();
    for (idx, block) in blocks.into_iter().enumerate() {
        let mut lines = block.into_iter().peekable();

        if idx == 0 {
            if let Some(first) = lines.peek() {
                if let Some((name, value)) = first.text.split_once(':') {
                    if name.trim().eq_ignore_ascii_case("version") {
                        let version = value.trim();
                        if version != "1" {
                            return Err(LdifError::UnsupportedVersion {
                                line: first.number,
                                version: version.to_string(),
                            });
                        }
                        lines.next();
                    }
                }
            }
        }

        if let Some(record) = parse_record(lines)? {
            records.push(record);
        }
    }

    Ok(records)
}

fn parse_record(mut lines: impl Iterator<Item = Line>) -> Result<Option<LdifRecord>, LdifError> {
    let Some(first) = lines.next() else {
        return Ok(None);
    };

    let (name, dn_value) = parse_attribute_line(&first)?;
    if !name.eq_ignore_ascii_case("dn") {
        return Err(LdifError::MissingDn { line: first.number });
    }
    let dn = Dn::parse(&dn_value).map_err(|source| LdifError::Dn {
        line: first.number,
        source,
    })?;

    let mut attributes = Vec::new();
    for line in lines {
        let (name, value) = parse_attribute_line(&line)?;
        if name.eq_ignore_ascii_case("changetype") {
            if !value.eq_ignore_ascii_case("add") {
                return Err(LdifError::UnsupportedChangeType {
                    line: line.number,
                    changetype: value,
                });
            }
            continue;
        }
        attributes.push((name, value));
    }

    Ok(Some(LdifRecord {
        dn,
        attributes,
        line: first.number,
    }))
}

fn parse_attribute_line(line: &Line) -> Result<(String, String), LdifError> {
    let Some((name, rest)) = line.text.split_once(':') else {
        return Err(LdifError::MissingColon { line: line.number });
    };
    let name = name.trim().to_string();

    if let Some(encoded) = rest.strip_prefix(':') {
        let value = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| LdifError::InvalidBase64 {
                line: line.number,
                attribute: name.clone(),
            })?;
        return Ok((name, value));
    }

    if rest.starts_with('<') {
        return Err(LdifError::UrlValue {
            line: line.number,
            attribute: name,
        });
    }

    Ok((name, rest.trim_start().to_string()))
}

/// Imports an LDIF file through the admin session.
pub struct LdifFileLoader<'a> {
    session: AdminSession<'a>,
    path: PathBuf,
}

impl<'a> LdifFileLoader<'a> {
    pub fn new(session: AdminSession<'a>, path: impl AsRef<Path>) -> Self {
        Self {
            session,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Import every record; returns the number of entries added.
    ///
    /// Entries the partition rejects are logged and skipped.
    pub fn execute(&self) -> DirectoryResult<usize> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            DirectoryError::load(self.path.display().to_string(), e.to_string())
        })?;

        let records = parse(&content)?;
        debug!(path = %self.path.display(), records = records.len(), "Parsed LDIF file");

        let mut count = 0;
        for record in records {
            let dn = record.dn.to_string();
            let line = record.line;
            match self.session.add(record.into_entry()) {
                Ok(()) => count += 1,
                Err(e) => {
                    warn!(dn = %dn, line, error = %e, "Skipping LDIF entry");
                }
            }
        }

        info!(path = %self.path.display(), entries = count, "Loaded LDIF entries");
        Ok(count)
    }
}
