use crate::error::{Error, Result};

pub const CONTENT_LENGTH: &str = "Content-Length";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const EXPECT: &str = "Expect";

/// Header whose repeated values are joined by a single space on the wire.
pub const SERVER: &str = "Server";

/// Ordered list of header entries, each a name with one or more values.
///
/// Names are not deduplicated: the same name may appear in several entries,
/// and insertion order is what gets written. Lookups are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    entries: Vec<(String, Vec<String>)>,
}

impl HeaderList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a new entry holding a single value.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.push((name.into(), vec![value.into()]));
    }

    /// Appends a new entry holding all of `values`.
    pub fn append<I, V>(&mut self, name: impl Into<String>, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.entries.push((name.into(), values));
    }

    /// Replaces every entry named `name` with a single entry holding `value`.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.entries.push((name, vec![value.into()]));
    }

    /// Removes every entry named `name`, returning whether any was present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(n, _)| !n.eq_ignore_ascii_case(name));
        before != self.entries.len()
    }

    /// Values of the first entry named `name`.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(|v| v.first()).map(String::as_str)
    }

    /// All values across every entry named `name`, in order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .flat_map(|(_, v)| v.iter().map(String::as_str))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses the first `Content-Length` value.
    pub fn content_length(&self) -> Result<Option<u64>> {
        match self.first(CONTENT_LENGTH) {
            None => Ok(None),
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map(Some)
                .map_err(|_| Error::InvalidContentLength(v.to_string())),
        }
    }

    pub fn is_chunked(&self) -> bool {
        self.get_all(TRANSFER_ENCODING)
            .any(|v| v.eq_ignore_ascii_case("chunked"))
    }

    pub fn expects_continue(&self) -> bool {
        self.get_all(EXPECT)
            .any(|v| v.eq_ignore_ascii_case("100-continue"))
    }
}

impl<N, V> FromIterator<(N, V)> for HeaderList
where
    N: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        let mut headers = HeaderList::new();
        for (name, value) in iter {
            headers.push(name, value);
        }
        headers
    }
}

impl<'a> IntoIterator for &'a HeaderList {
    type Item = &'a (String, Vec<String>);
    type IntoIter = std::slice::Iter<'a, (String, Vec<String>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Separator placed between repeated values of one header entry.
pub fn value_separator(name: &str) -> &'static str {
    if name == SERVER { " " } else { ", " }
}
