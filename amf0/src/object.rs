use crate::Amf0Value;
use std::iter::FromIterator;
use std::slice;
use std::vec;

/// The properties of an AMF0 object.
///
/// Property order is part of the wire format (peers echo it back and some are picky about it),
/// so properties are kept in insertion order instead of in a hash map.  Property names are
/// unique: inserting an existing name replaces the value in place.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct Amf0Object {
    properties: Vec<(String, Amf0Value)>,
}

impl Amf0Object {
    pub fn new() -> Self {
        Amf0Object {
            properties: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Amf0Object {
            properties: Vec::with_capacity(capacity),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Amf0Value> {
        self.properties
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Sets the property, returning the previous value if the name was already present.
    pub fn insert(&mut self, name: impl Into<String>, value: Amf0Value) -> Option<Amf0Value> {
        let name = name.into();
        match self.properties.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, value)),
            None => {
                self.properties.push((name, value));
                None
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Amf0Value> {
        let index = self.properties.iter().position(|(key, _)| key == name)?;
        Some(self.properties.remove(index).1)
    }

    pub fn iter(&self) -> slice::Iter<'_, (String, Amf0Value)> {
        self.properties.iter()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Amf0Value)> for Amf0Object {
    fn from_iter<T: IntoIterator<Item = (K, Amf0Value)>>(iter: T) -> Self {
        let mut object = Amf0Object::new();
        for (name, value) in iter {
            object.insert(name, value);
        }

        object
    }
}

impl IntoIterator for Amf0Object {
    type Item = (String, Amf0Value);
    type IntoIter = vec::IntoIter<(String, Amf0Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.properties.into_iter()
    }
}

impl<'a> IntoIterator for &'a Amf0Object {
    type Item = &'a (String, Amf0Value);
    type IntoIter = slice::Iter<'a, (String, Amf0Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.properties.iter()
    }
}
