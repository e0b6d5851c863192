//! Free-form display attributes of an account.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

const NAME: &str = "name";
const BIO: &str = "bio";

/// Open set of user-supplied attributes.
///
/// `name` and `bio` have typed accessors, any other key can be stored
/// through [`Profile::set`] without touching the storage contract.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(BTreeMap<String, String>);

impl Profile {
    pub fn name(&self) -> Option<&str> {
        self.get(NAME)
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.set(NAME, name);
    }

    pub fn bio(&self) -> Option<&str> {
        self.get(BIO)
    }

    pub fn set_bio(&mut self, bio: impl Into<String>) {
        self.set(BIO, bio);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Insert or replace an attribute, returning the previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
