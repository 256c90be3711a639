//! Labeled-field document parser.
//!
//! Human-facing gatehouse documents (refinement artifacts, work item
//! descriptions) mix free prose with labeled fields:
//!
//! ```text
//! Work-Item: WP-42
//! Coverage: PASS
//!
//! Anything that is not a labeled field is prose and is ignored.
//! ```
//!
//! This module is the single extraction point for those fields — one small
//! dedicated parser producing a typed record with explicit required/optional
//! lookups, instead of pattern matches scattered across callers. Free prose
//! is never interpreted.
//!
//! A field line is `Label: value` where the label starts at column zero,
//! begins with an ASCII letter, and contains only letters, digits, and `-`.
//! Labels are matched case-insensitively. Repeated labels are preserved in
//! order (used for waiver lists and manifest blocks).

use std::fmt;

/// One extracted labeled field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Lowercased label used for lookups.
    pub label: String,
    /// Trimmed value text (may be empty).
    pub value: String,
    /// 1-indexed source line number, for diagnostics.
    pub line: usize,
}

/// An ordered collection of labeled fields extracted from one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldDoc {
    fields: Vec<Field>,
}

/// Error returned when a required field is absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingField {
    /// The label that was required.
    pub label: String,
}

impl fmt::Display for MissingField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "required field '{}' missing", self.label)
    }
}

impl std::error::Error for MissingField {}

impl FieldDoc {
    /// Parse a document into its labeled fields, ignoring prose.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut fields = Vec::new();
        for (i, line) in text.lines().enumerate() {
            if let Some((label, value)) = split_field_line(line) {
                fields.push(Field {
                    label: label.to_ascii_lowercase(),
                    value: value.trim().to_string(),
                    line: i + 1,
                });
            }
        }
        Self { fields }
    }

    /// All fields in document order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// The first value for `label` (case-insensitive), if present.
    #[must_use]
    pub fn first(&self, label: &str) -> Option<&str> {
        let needle = label.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|f| f.label == needle)
            .map(|f| f.value.as_str())
    }

    /// Every value recorded for `label`, in order.
    #[must_use]
    pub fn all(&self, label: &str) -> Vec<&str> {
        let needle = label.to_ascii_lowercase();
        self.fields
            .iter()
            .filter(|f| f.label == needle)
            .map(|f| f.value.as_str())
            .collect()
    }

    /// The first value for `label`, or [`MissingField`].
    ///
    /// # Errors
    ///
    /// Returns [`MissingField`] when no field carries the label, or when the
    /// field is present but empty.
    pub fn require(&self, label: &str) -> Result<&str, MissingField> {
        match self.first(label) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(MissingField {
                label: label.to_string(),
            }),
        }
    }

    /// Split the document into blocks, each starting at an occurrence of
    /// `split_label`. Fields before the first occurrence are not part of
    /// any block (they remain reachable on the whole document).
    #[must_use]
    pub fn blocks(&self, split_label: &str) -> Vec<Self> {
        let needle = split_label.to_ascii_lowercase();
        let mut blocks: Vec<Self> = Vec::new();
        for field in &self.fields {
            if field.label == needle {
                blocks.push(Self::default());
            }
            if let Some(current) = blocks.last_mut() {
                current.fields.push(field.clone());
            }
        }
        blocks
    }

    /// True when the document carries no labeled fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Split a single line into `(label, value)` if it is a field line.
fn split_field_line(line: &str) -> Option<(&str, &str)> {
    let colon = line.find(':')?;
    let label = &line[..colon];
    let mut chars = label.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return None;
    }
    Some((label, &line[colon + 1..]))
}
