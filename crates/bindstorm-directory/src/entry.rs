//! Directory entries

use crate::dn::Dn;

/// A named, multi-valued attribute. Names compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub values: Vec<String>,
}

impl Attribute {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: Vec::new(),
        }
    }

    /// Whether the attribute has this name.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Case-insensitive value membership.
    pub fn contains_ignore_case(&self, value: &str) -> bool {
        let needle = value.to_lowercase();
        self.values.iter().any(|v| v.to_lowercase() == needle)
    }
}

/// An entry stored in a partition.
#[derive(Debug, Clone)]
pub struct Entry {
    dn: Dn,
    attributes: Vec<Attribute>,
}

impl Entry {
    pub fn new(dn: Dn) -> Self {
        Self {
            dn,
            attributes: Vec::new(),
        }
    }

    pub fn dn(&self) -> &Dn {
        &self.dn
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Look up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.is(name))
    }

    /// Values of an attribute, empty when absent.
    pub fn values(&self, name: &str) -> &[String] {
        self.get(name).map(|a| a.values.as_slice()).unwrap_or(&[])
    }

    /// Add a value, skipping exact duplicates.
    pub fn add_value(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|a| a.is(name)) {
            Some(attr) => {
                if !attr.values.contains(&value) {
                    attr.values.push(value);
                }
            }
            None => {
                let mut attr = Attribute::new(name);
                attr.values.push(value);
                self.attributes.push(attr);
            }
        }
    }

    /// Builder form of [`Entry::add_value`].
    #[must_use]
    pub fn with_value(mut self, name: &str, value: impl Into<String>) -> Self {
        self.add_value(name, value);
        self
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.get(name).is_some_and(|a| !a.values.is_empty())
    }

    /// Case-insensitive attribute/value assertion.
    pub fn has_value(&self, name: &str, value: &str) -> bool {
        self.get(name)
            .is_some_and(|a| a.contains_ignore_case(value))
    }

    /// Ensure the naming attributes of the RDN are present as values.
    pub fn add_rdn_values(&mut self) {
        let Some(rdn) = self.dn.rdn().cloned() else {
            return;
        };
        for ava in rdn.avas() {
            if !self.has_value(ava.attr(), ava.value()) {
                self.add_value(ava.attr(), ava.value());
            }
        }
    }
}
