//! Tag lists: stream metadata carried by tag messages.
//!
//! # Example
//!
//! ```rust
//! use sluice::message::{TagList, TagMergeMode};
//!
//! let mut tags = TagList::new();
//! tags.set_title("My Video");
//! tags.set("artist", "Alice");
//!
//! let mut more = TagList::new();
//! more.set("artist", "Bob");
//!
//! tags.merge(&more, TagMergeMode::Append);
//! assert_eq!(tags.get("artist").and_then(|v| v.as_list()).map(|l| l.len()), Some(2));
//! ```

use super::Value;
use crate::clock::ClockTime;

/// Common tag names.
pub mod tag_names {
    /// Stream/track title.
    pub const TITLE: &str = "title";
    /// Artist name.
    pub const ARTIST: &str = "artist";
    /// Album name.
    pub const ALBUM: &str = "album";
    /// Duration in nanoseconds.
    pub const DURATION: &str = "duration";
    /// Bitrate in bits/second.
    pub const BITRATE: &str = "bitrate";
    /// Codec name.
    pub const CODEC: &str = "codec";
    /// Container format.
    pub const CONTAINER: &str = "container";
    /// Language (ISO 639 code).
    pub const LANGUAGE: &str = "language";
}

/// How [`TagList::merge`] combines two lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TagMergeMode {
    /// Discard existing tags, take the new list.
    ReplaceAll,
    /// New values replace existing values of the same name.
    Replace,
    /// New values are appended after existing values of the same name.
    #[default]
    Append,
    /// New values are prepended before existing values of the same name.
    Prepend,
    /// Existing values win; new names are added.
    Keep,
    /// Keep the existing list untouched.
    KeepAll,
}

/// Ordered collection of stream metadata tags.
///
/// A tag may hold several values, stored as [`Value::List`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagList {
    tags: Vec<(String, Value)>,
}

impl TagList {
    /// Create an empty tag list.
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.tags.iter().position(|(k, _)| k == key)
    }

    /// Set a tag, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        match self.position(&key) {
            Some(i) => self.tags[i].1 = value,
            None => self.tags.push((key, value)),
        }
    }

    /// Get a tag value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.position(key).map(|i| &self.tags[i].1)
    }

    /// Get a tag as a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Get a tag as a u64.
    pub fn get_uint(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_uint)
    }

    /// Remove a tag.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.position(key).map(|i| self.tags.remove(i).1)
    }

    /// Whether a tag exists.
    pub fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    /// Number of tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Iterate tags in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merge `other` into this list.
    pub fn merge(&mut self, other: &TagList, mode: TagMergeMode) {
        match mode {
            TagMergeMode::ReplaceAll => *self = other.clone(),
            TagMergeMode::KeepAll => {}
            _ => {
                for (key, value) in &other.tags {
                    self.merge_one(key, value.clone(), mode);
                }
            }
        }
    }

    fn merge_one(&mut self, key: &str, value: Value, mode: TagMergeMode) {
        let Some(i) = self.position(key) else {
            self.tags.push((key.to_string(), value));
            return;
        };
        let existing = &mut self.tags[i].1;
        match mode {
            TagMergeMode::Replace => *existing = value,
            TagMergeMode::Append => {
                let old = std::mem::replace(existing, Value::Bool(false));
                *existing = Value::concat(old, value);
            }
            TagMergeMode::Prepend => {
                let old = std::mem::replace(existing, Value::Bool(false));
                *existing = Value::concat(value, old);
            }
            TagMergeMode::Keep | TagMergeMode::KeepAll | TagMergeMode::ReplaceAll => {}
        }
    }

    /// Get the title tag.
    pub fn title(&self) -> Option<&str> {
        self.get_str(tag_names::TITLE)
    }

    /// Set the title tag.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.set(tag_names::TITLE, title.into());
    }

    /// Get the duration tag.
    pub fn duration(&self) -> Option<ClockTime> {
        self.get_uint(tag_names::DURATION).map(ClockTime::from_nanos)
    }

    /// Set the duration tag.
    pub fn set_duration(&mut self, duration: ClockTime) {
        self.set(tag_names::DURATION, duration.nanos());
    }

    /// Get the bitrate tag (bits per second).
    pub fn bitrate(&self) -> Option<u64> {
        self.get_uint(tag_names::BITRATE)
    }

    /// Set the bitrate tag.
    pub fn set_bitrate(&mut self, bitrate: u64) {
        self.set(tag_names::BITRATE, bitrate);
    }
}
