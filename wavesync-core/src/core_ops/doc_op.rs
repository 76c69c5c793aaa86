//! Document operations over blip text
//!
//! A document operation walks the whole document from start to end. Each
//! component either keeps characters (`Retain`), inserts new ones
//! (`Characters`) or removes existing ones (`DeleteCharacters`, which names
//! the exact text removed so the operation can be inverted without the
//! document at hand).

use serde::{Deserialize, Serialize};

/// One step of a document operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocOpComponent {
    Retain(usize),
    Characters(String),
    DeleteCharacters(String),
}

/// A complete document mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocOp {
    components: Vec<DocOpComponent>,
}

/// Why a document operation could not be applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocOpMismatch(pub String);

impl DocOp {
    pub fn new(components: Vec<DocOpComponent>) -> Self {
        Self { components }
    }

    pub fn builder() -> DocOpBuilder {
        DocOpBuilder::default()
    }

    /// Insert `text` at character `position` of a document of `doc_len` chars
    pub fn insert(doc_len: usize, position: usize, text: &str) -> Self {
        Self::builder()
            .retain(position)
            .characters(text)
            .retain(doc_len.saturating_sub(position))
            .build()
    }

    /// Delete `len` characters of `doc` starting at character `position`
    pub fn delete(doc: &str, position: usize, len: usize) -> Self {
        let total = doc.chars().count();
        let removed: String = doc.chars().skip(position).take(len).collect();
        let removed_len = removed.chars().count();
        Self::builder()
            .retain(position)
            .delete_characters(&removed)
            .retain(total.saturating_sub(position.saturating_add(removed_len)))
            .build()
    }

    pub fn components(&self) -> &[DocOpComponent] {
        &self.components
    }

    /// Number of characters the operation expects in its input document
    pub fn input_len(&self) -> usize {
        self.components
            .iter()
            .map(|c| match c {
                DocOpComponent::Retain(n) => *n,
                DocOpComponent::Characters(_) => 0,
                DocOpComponent::DeleteCharacters(s) => s.chars().count(),
            })
            .fold(0, usize::saturating_add)
    }

    /// Number of characters in the document the operation produces
    pub fn output_len(&self) -> usize {
        self.components
            .iter()
            .map(|c| match c {
                DocOpComponent::Retain(n) => *n,
                DocOpComponent::Characters(s) => s.chars().count(),
                DocOpComponent::DeleteCharacters(_) => 0,
            })
            .fold(0, usize::saturating_add)
    }

    /// Whether the operation leaves every document unchanged
    pub fn is_identity(&self) -> bool {
        self.components
            .iter()
            .all(|c| matches!(c, DocOpComponent::Retain(_)))
    }

    /// Apply to `doc`, producing the new document text
    pub fn apply(&self, doc: &str) -> Result<String, DocOpMismatch> {
        let chars: Vec<char> = doc.chars().collect();
        let mut cursor = 0usize;
        let mut out = String::with_capacity(doc.len());

        for component in &self.components {
            match component {
                DocOpComponent::Retain(n) => {
                    let end = cursor.checked_add(*n).filter(|end| *end <= chars.len());
                    let Some(end) = end else {
                        return Err(DocOpMismatch(format!(
                            "retain of {} at {} runs past document end {}",
                            n,
                            cursor,
                            chars.len()
                        )));
                    };
                    out.extend(&chars[cursor..end]);
                    cursor = end;
                }
                DocOpComponent::Characters(s) => out.push_str(s),
                DocOpComponent::DeleteCharacters(s) => {
                    for expected in s.chars() {
                        match chars.get(cursor) {
                            Some(actual) if *actual == expected => cursor += 1,
                            Some(actual) => {
                                return Err(DocOpMismatch(format!(
                                    "delete expected {:?} at {}, found {:?}",
                                    expected, cursor, actual
                                )));
                            }
                            None => {
                                return Err(DocOpMismatch(format!(
                                    "delete runs past document end {}",
                                    chars.len()
                                )));
                            }
                        }
                    }
                }
            }
        }

        if cursor != chars.len() {
            return Err(DocOpMismatch(format!(
                "operation covers {} of {} characters",
                cursor,
                chars.len()
            )));
        }

        Ok(out)
    }

    /// The operation that undoes this one
    pub fn invert(&self) -> Self {
        let components = self
            .components
            .iter()
            .map(|c| match c {
                DocOpComponent::Retain(n) => DocOpComponent::Retain(*n),
                DocOpComponent::Characters(s) => DocOpComponent::DeleteCharacters(s.clone()),
                DocOpComponent::DeleteCharacters(s) => DocOpComponent::Characters(s.clone()),
            })
            .collect();
        Self { components }
    }
}

/// Builds normalized document operations: empty components are skipped and
/// adjacent components of the same kind are merged.
#[derive(Debug, Default)]
pub struct DocOpBuilder {
    components: Vec<DocOpComponent>,
}

impl DocOpBuilder {
    pub fn retain(mut self, n: usize) -> Self {
        if n == 0 {
            return self;
        }
        if let Some(DocOpComponent::Retain(prev)) = self.components.last_mut() {
            *prev = prev.saturating_add(n);
        } else {
            self.components.push(DocOpComponent::Retain(n));
        }
        self
    }

    pub fn characters(mut self, s: &str) -> Self {
        if s.is_empty() {
            return self;
        }
        if let Some(DocOpComponent::Characters(prev)) = self.components.last_mut() {
            prev.push_str(s);
        } else {
            self.components.push(DocOpComponent::Characters(s.to_string()));
        }
        self
    }

    pub fn delete_characters(mut self, s: &str) -> Self {
        if s.is_empty() {
            return self;
        }
        if let Some(DocOpComponent::DeleteCharacters(prev)) = self.components.last_mut() {
            prev.push_str(s);
        } else {
            self.components
                .push(DocOpComponent::DeleteCharacters(s.to_string()));
        }
        self
    }

    pub fn build(self) -> DocOp {
        DocOp {
            components: self.components,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_delete() {
        let insert = DocOp::insert(5, 5, " world");
        let doc = insert.apply("hello").unwrap();
        assert_eq!(doc, "hello world");

        let delete = DocOp::delete(&doc, 0, 6);
        assert_eq!(delete.apply(&doc).unwrap(), "world");
    }

    #[test]
    fn test_invert_restores_document() {
        let doc = "the quick fox";
        let op = DocOp::builder()
            .retain(4)
            .delete_characters("quick")
            .characters("slow")
            .retain(4)
            .build();

        let changed = op.apply(doc).unwrap();
        assert_eq!(changed, "the slow fox");
        assert_eq!(op.invert().apply(&changed).unwrap(), doc);
    }

    #[test]
    fn test_lengths() {
        let op = DocOp::builder()
            .retain(2)
            .characters("abc")
            .delete_characters("xy")
            .build();
        assert_eq!(op.input_len(), 4);
        assert_eq!(op.output_len(), 5);
    }

    #[test]
    fn test_oversized_retain_is_mismatch() {
        let op = DocOp::new(vec![
            DocOpComponent::Retain(1),
            DocOpComponent::Retain(usize::MAX),
        ]);
        assert!(op.apply("ab").is_err());
        assert_eq!(op.input_len(), usize::MAX);
        assert_eq!(op.output_len(), usize::MAX);

        let merged = DocOp::builder().retain(usize::MAX).retain(2).build();
        assert_eq!(merged.components(), &[DocOpComponent::Retain(usize::MAX)]);
    }

    #[test]
    fn test_must_span_whole_document() {
        let op = DocOp::builder().retain(3).build();
        assert!(op.apply("abcd").is_err());
        assert!(op.apply("ab").is_err());
        assert!(op.apply("abc").is_ok());
    }

    #[test]
    fn test_delete_must_match_content() {
        let op = DocOp::builder().delete_characters("ab").build();
        assert!(op.apply("ax").is_err());
    }

    #[test]
    fn test_builder_merges_and_skips_empty() {
        let op = DocOp::builder()
            .retain(1)
            .retain(2)
            .characters("")
            .characters("a")
            .characters("b")
            .build();
        assert_eq!(
            op.components(),
            &[
                DocOpComponent::Retain(3),
                DocOpComponent::Characters("ab".to_string())
            ]
        );
    }

    #[test]
    fn test_multibyte_characters() {
        let op = DocOp::insert(2, 1, "ü");
        assert_eq!(op.apply("ab").unwrap(), "aüb");
    }
}
