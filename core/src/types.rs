//! Value types passed into endpoint calls.

use serde::{Deserialize, Serialize};

pub const QUERY_PAGE: &str = "page";
pub const QUERY_PER_PAGE: &str = "perPage";
/// Field to order by.
pub const QUERY_ORDER: &str = "order";
/// Descending when `true`, ascending otherwise.
pub const QUERY_DESC: &str = "desc";
/// Newest records first; ignores `order`.
pub const QUERY_NEW: &str = "new";
pub const QUERY_UPDATED: &str = "updated";
/// Only records with an id larger than this.
pub const QUERY_SINCE_ID: &str = "sinceId";
/// Only records with a sequence number larger than this.
pub const QUERY_SINCE_SQ: &str = "sinceSq";
pub const QUERY_FILTERS: &str = "filters";

/// Team and database ids for one call.
///
/// An empty or missing id falls back to the fixed scope of the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    pub team: Option<String>,
    pub database: Option<String>,
}

impl Scope {
    pub fn new(team: Option<&str>, database: Option<&str>) -> Self {
        Self {
            team: team.map(str::to_string),
            database: database.map(str::to_string),
        }
    }

    pub fn team(team: &str) -> Self {
        Self::new(Some(team), None)
    }

    /// Per-field resolution: `self` wins when non-empty, then `fallback` when
    /// non-empty, otherwise the field stays unset.
    pub fn resolve(&self, fallback: &Scope) -> Scope {
        Scope {
            team: first_non_empty(&self.team, &fallback.team),
            database: first_non_empty(&self.database, &fallback.database),
        }
    }
}

fn first_non_empty(primary: &Option<String>, fallback: &Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .find(|id| !id.is_empty())
        .cloned()
}

/// Ordered query parameters. Inserting an existing key replaces its value in
/// place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.pairs.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.pairs.push((key, value)),
        }
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn page(self, page: u32) -> Self {
        self.set(QUERY_PAGE, page.to_string())
    }

    pub fn per_page(self, per_page: u32) -> Self {
        self.set(QUERY_PER_PAGE, per_page.to_string())
    }

    pub fn order(self, field: impl Into<String>) -> Self {
        self.set(QUERY_ORDER, field)
    }

    pub fn desc(self, desc: bool) -> Self {
        self.set(QUERY_DESC, desc.to_string())
    }

    pub fn newest_first(self, new: bool) -> Self {
        self.set(QUERY_NEW, new.to_string())
    }

    pub fn updated(self, updated: bool) -> Self {
        self.set(QUERY_UPDATED, updated.to_string())
    }

    pub fn since_id(self, id: u64) -> Self {
        self.set(QUERY_SINCE_ID, id.to_string())
    }

    pub fn since_sq(self, sequence: u64) -> Self {
        self.set(QUERY_SINCE_SQ, sequence.to_string())
    }

    /// `key=value&...` with form-urlencoded keys and values.
    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.iter())
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = QueryParams::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}
