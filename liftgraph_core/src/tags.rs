//! Named accessors over a record's positional tag list.
//!
//! Every tag is `[name, value, value, ...]`. Parsers go through `TagList`
//! instead of indexing arrays so "first tag wins" and "repeated tag" rules
//! live in one place.

/// Borrowed view over a record's tags.
#[derive(Clone, Copy, Debug)]
pub struct TagList<'a> {
    tags: &'a [Vec<String>],
}

impl<'a> TagList<'a> {
    pub fn new(tags: &'a [Vec<String>]) -> Self {
        Self { tags }
    }

    /// First value of the first tag named `name`.
    pub fn first_value(&self, name: &str) -> Option<&'a str> {
        self.first(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// First value of the first tag named `name`, ignoring blank values.
    pub fn non_empty_value(&self, name: &str) -> Option<&'a str> {
        self.first_value(name)
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    /// All values (everything after the name) of the first tag named `name`.
    pub fn first(&self, name: &str) -> Option<&'a [String]> {
        self.entries(name).next()
    }

    /// First value of every tag named `name`, in order.
    pub fn all_values(&self, name: &str) -> Vec<&'a str> {
        self.entries(name)
            .filter_map(|values| values.first())
            .map(String::as_str)
            .collect()
    }

    /// Values of every tag named `name`, in order.
    pub fn entries<'n>(&self, name: &'n str) -> impl Iterator<Item = &'a [String]> + 'n
    where
        'a: 'n,
    {
        let tags: &'a [Vec<String>] = self.tags;
        tags.iter()
            .filter(move |tag| tag.first().map(String::as_str) == Some(name))
            .map(|tag| &tag[1..])
    }

    pub fn has(&self, name: &str) -> bool {
        self.tags
            .iter()
            .any(|tag| tag.first().map(String::as_str) == Some(name))
    }

    pub fn count(&self, name: &str) -> usize {
        self.tags
            .iter()
            .filter(|tag| tag.first().map(String::as_str) == Some(name))
            .count()
    }
}

/// Build a tag from string slices. Handy for tests and record builders.
pub fn tag(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}
