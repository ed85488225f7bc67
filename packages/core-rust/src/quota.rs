//! Enforcement of the binding's receive limits on a decoded reply.

use std::collections::HashSet;

use serde_json::Value;
use thiserror::Error;

use crate::binding::ReaderQuotas;

/// A received message broke one of the binding's limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuotaViolation {
    #[error("message of {size} bytes exceeds the {limit}-byte receive limit")]
    MessageTooLarge { size: u64, limit: u64 },
    #[error("document nesting exceeds the maximum depth of {limit}")]
    DepthExceeded { limit: u32 },
    #[error("string of {length} chars exceeds the maximum content length of {limit}")]
    StringTooLong { length: usize, limit: u32 },
    #[error("array of {length} elements exceeds the maximum array length of {limit}")]
    ArrayTooLong { length: usize, limit: u32 },
    #[error("element names exceed the name table limit of {limit} chars")]
    NameTableExceeded { limit: u32 },
}

/// Rejects a message larger than `limit` bytes.
///
/// # Errors
///
/// Returns [`QuotaViolation::MessageTooLarge`] when `size > limit`.
pub fn check_message_size(size: u64, limit: u64) -> Result<(), QuotaViolation> {
    if size > limit {
        Err(QuotaViolation::MessageTooLarge { size, limit })
    } else {
        Ok(())
    }
}

impl ReaderQuotas {
    /// Walks `doc` and checks every reader quota.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check(&self, doc: &Value) -> Result<(), QuotaViolation> {
        let mut names = NameTable {
            seen: HashSet::new(),
            chars: 0,
            limit: self.max_name_table_char_count,
        };
        self.walk(doc, 1, &mut names)
    }

    fn walk<'a>(
        &self,
        value: &'a Value,
        depth: u32,
        names: &mut NameTable<'a>,
    ) -> Result<(), QuotaViolation> {
        match value {
            Value::String(s) => {
                let length = s.chars().count();
                if length > self.max_string_content_length as usize {
                    return Err(QuotaViolation::StringTooLong {
                        length,
                        limit: self.max_string_content_length,
                    });
                }
                Ok(())
            }
            Value::Array(items) => {
                self.enter(depth)?;
                if items.len() > self.max_array_length as usize {
                    return Err(QuotaViolation::ArrayTooLong {
                        length: items.len(),
                        limit: self.max_array_length,
                    });
                }
                items
                    .iter()
                    .try_for_each(|item| self.walk(item, depth + 1, names))
            }
            Value::Object(map) => {
                self.enter(depth)?;
                for (key, item) in map {
                    names.add(key)?;
                    self.walk(item, depth + 1, names)?;
                }
                Ok(())
            }
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(()),
        }
    }

    fn enter(&self, depth: u32) -> Result<(), QuotaViolation> {
        if depth > self.max_depth {
            Err(QuotaViolation::DepthExceeded {
                limit: self.max_depth,
            })
        } else {
            Ok(())
        }
    }
}

/// Distinct element names seen so far, with their total character count.
struct NameTable<'a> {
    seen: HashSet<&'a str>,
    chars: usize,
    limit: u32,
}

impl<'a> NameTable<'a> {
    fn add(&mut self, name: &'a str) -> Result<(), QuotaViolation> {
        if self.seen.insert(name) {
            self.chars += name.chars().count();
            if self.chars > self.limit as usize {
                return Err(QuotaViolation::NameTableExceeded { limit: self.limit });
            }
        }
        Ok(())
    }
}
