use bincode::{Decode, Encode};
use derive_more::{Deref, Display, From};

/// Metadata record stored for every path.
///
/// Field order is the encoded layout: `is_directory`, `name`, `size`, `children`.
#[derive(Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub struct Entry {
    pub is_directory: bool,
    pub name: String,
    /// Byte length of the file contents, 0 for directories.
    pub size: u64,
    /// Leaf names, unique, in insertion order. Empty for files.
    pub children: Vec<String>,
}

impl Entry {
    pub fn directory(name: impl Into<String>) -> Self {
        Self {
            is_directory: true,
            name: name.into(),
            size: 0,
            children: Vec::new(),
        }
    }

    pub fn file(name: impl Into<String>, size: u64) -> Self {
        Self {
            is_directory: false,
            name: name.into(),
            size,
            children: Vec::new(),
        }
    }

    /// Stand-in for a child that is listed by its parent but has no record yet.
    pub fn placeholder(name: impl Into<String>) -> Self {
        Self::file(name, 0)
    }

    pub fn has_child(&self, name: &str) -> bool {
        self.children.iter().any(|child| child == name)
    }

    /// Copy of this entry with `name` appended to the children, unless already present.
    pub fn with_child(&self, name: &str) -> Self {
        let mut next = self.clone();
        if !next.has_child(name) {
            next.children.push(name.to_string());
        }
        next
    }

    pub fn with_size(&self, size: u64) -> Self {
        Self {
            size,
            ..self.clone()
        }
    }
}

/// Raw payload of a file, stored apart from its [`Entry`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Deref, From, Display, Encode, Decode)]
#[display("{}", String::from_utf8_lossy(_0))]
pub struct Content(Vec<u8>);

impl Content {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn byte_len(&self) -> u64 {
        self.0.len() as u64
    }
}

impl From<&str> for Content {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<String> for Content {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}
