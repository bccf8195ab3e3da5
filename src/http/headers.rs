//! Ordered header list with case-insensitive names.

/// Header fields in the order they were added.
///
/// Names compare case-insensitively and a name may repeat; [`set`](Self::set)
/// collapses repeats into one entry.
///
/// # Examples
///
/// ```
/// use concerns::http::Headers;
///
/// let mut headers = Headers::new();
/// headers.insert("Vary", "Accept");
/// headers.insert("vary", "Accept-Encoding");
/// headers.set("Expires", "Thu, 01 Jan 2026 00:00:00 GMT");
///
/// assert_eq!(headers.get_all("VARY").count(), 2);
/// assert_eq!(headers.get("expires"), Some("Thu, 01 Jan 2026 00:00:00 GMT"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Headers {
    fields: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, keeping any existing ones with the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Leaves exactly one field named `name`, holding `value`.
    ///
    /// The field takes the slot of the first existing match, or goes last
    /// when there was none.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let Some(slot) = self.position(&name) else {
            self.fields.push((name, value));
            return;
        };

        let mut index = 0;
        self.fields.retain(|(field, _)| {
            let keep = index <= slot || !field.eq_ignore_ascii_case(&name);
            index += 1;
            keep
        });
        self.fields[slot] = (name, value);
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Every value of `name`, in insertion order.
    pub fn get_all<'a, 'n>(&'a self, name: &'n str) -> impl Iterator<Item = &'a str> {
        self.fields
            .iter()
            .filter(move |(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Number of fields, counting repeated names separately.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|(field, _)| field.eq_ignore_ascii_case(name))
    }
}
