use crate::errors::{Error, Result};
use std::fmt;

/// A single `name -> value` substitution rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    name: String,
    value: String,
}

impl Binding {
    /// Creates a binding, trimming surrounding whitespace from both parts.
    pub fn new(name: impl AsRef<str>, value: impl AsRef<str>) -> Result<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "binding name must not be empty".to_string(),
            ));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.as_ref().trim().to_string(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Bindings in the order the caller declared them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bindings(Vec<Binding>);

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, binding: Binding) {
        self.0.push(binding);
    }

    /// Parses `"Name1=Value1;Name2=Value2;"`.
    ///
    /// Empty `;` segments are skipped. Every other segment must split into
    /// exactly two non-empty parts around `=`.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut bindings = Self::new();
        bindings.extend_from_str(raw)?;
        Ok(bindings)
    }

    /// Appends the bindings parsed from `raw`, see [`Bindings::parse`].
    pub fn extend_from_str(&mut self, raw: &str) -> Result<()> {
        for param in raw.split(';').filter(|s| !s.is_empty()) {
            let parts: Vec<&str> = param.split('=').filter(|s| !s.is_empty()).collect();
            let [name, value] = parts.as_slice() else {
                return Err(Error::InvalidArgument(format!(
                    "Replace parameter {param} doesn't respect the expected structure (example: ParameterName1=MyValue1)"
                )));
            };
            self.push(Binding::new(name, value)?);
        }
        Ok(())
    }

    /// The first binding named `name`.
    pub fn find(&self, name: &str, ignore_case: bool) -> Option<&Binding> {
        if ignore_case {
            let name = name.to_lowercase();
            self.0.iter().find(|b| b.name.to_lowercase() == name)
        } else {
            self.0.iter().find(|b| b.name == name)
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a Bindings {
    type Item = &'a Binding;
    type IntoIter = std::slice::Iter<'a, Binding>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
