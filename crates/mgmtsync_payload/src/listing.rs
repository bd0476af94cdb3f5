//! Listing documents returned by collection endpoints.
//!
//! A listing is an XML document of the shape
//!
//! ```xml
//! <x-default-list>
//!   <list-items>
//!     <list-count units="quantity">2</list-count>
//!     <list-item><idref>123</idref><nameref>reindex</nameref></list-item>
//!     <list-item><idref>456</idref><nameref>backup</nameref></list-item>
//!   </list-items>
//! </x-default-list>
//! ```
//!
//! Every `list-item` becomes a [`ListingEntry`] holding the text of its
//! direct child elements keyed by local name. Element names are matched
//! without namespace prefixes, so the root element name does not matter.

use crate::error::{PayloadError, PayloadResult};
use crate::predicate::Predicate;
use crate::xml::local_name;
use quick_xml::events::Event;
use quick_xml::Reader;

const LIST_ITEM: &str = "list-item";
const LIST_COUNT: &str = "list-count";
const IDREF: &str = "idref";
const NAMEREF: &str = "nameref";

/// One `list-item` of a listing document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingEntry {
    fields: Vec<(String, String)>,
}

impl ListingEntry {
    /// Builds an entry from (name, value) pairs.
    pub fn from_fields(fields: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            fields: fields.into_iter().collect(),
        }
    }

    /// Returns the first value of `field`.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Returns the entry's `idref`.
    pub fn id_ref(&self) -> Option<&str> {
        self.get(IDREF)
    }

    /// Returns the entry's `nameref`.
    pub fn name_ref(&self) -> Option<&str> {
        self.get(NAMEREF)
    }

    /// Returns all fields in document order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }
}

/// A parsed listing document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingDocument {
    entries: Vec<ListingEntry>,
    list_count: Option<u64>,
}

impl ListingDocument {
    /// Builds a listing directly from entries.
    pub fn from_entries(entries: Vec<ListingEntry>) -> Self {
        let list_count = Some(entries.len() as u64);
        Self {
            entries,
            list_count,
        }
    }

    /// Parses a listing document.
    pub fn parse(xml: &str) -> PayloadResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut doc = Self::default();
        let mut depth = 0usize;
        // Depth of the open `list-item`, if any.
        let mut item_depth: Option<usize> = None;
        let mut item_fields: Vec<(String, String)> = Vec::new();
        // Open direct child of the current item.
        let mut field: Option<(String, String)> = None;
        let mut in_count = false;
        let mut count_text = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    depth += 1;
                    let name = local_name(e.local_name().as_ref());
                    match item_depth {
                        None if name == LIST_ITEM => {
                            item_depth = Some(depth);
                            item_fields.clear();
                        }
                        None if name == LIST_COUNT && doc.list_count.is_none() => {
                            in_count = true;
                            count_text.clear();
                        }
                        Some(item) if depth == item + 1 => {
                            field = Some((name, String::new()));
                        }
                        _ => {}
                    }
                }
                Ok(Event::Empty(e)) => {
                    if let Some(item) = item_depth {
                        if depth == item {
                            item_fields.push((local_name(e.local_name().as_ref()), String::new()));
                        }
                    } else if local_name(e.local_name().as_ref()) == LIST_ITEM {
                        doc.entries.push(ListingEntry::default());
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|e| PayloadError::xml(e.to_string()))?;
                    append_text(&mut field, item_depth, depth, in_count, &mut count_text, &text);
                }
                Ok(Event::CData(e)) => {
                    let raw = e.into_inner();
                    let text = String::from_utf8_lossy(&raw);
                    append_text(&mut field, item_depth, depth, in_count, &mut count_text, &text);
                }
                Ok(Event::End(_)) => {
                    match item_depth {
                        Some(item) if depth == item => {
                            doc.entries
                                .push(ListingEntry::from_fields(item_fields.drain(..)));
                            item_depth = None;
                        }
                        Some(item) if depth == item + 1 => {
                            if let Some(done) = field.take() {
                                item_fields.push(done);
                            }
                        }
                        None if in_count => {
                            in_count = false;
                            let trimmed = count_text.trim();
                            let count = trimmed.parse::<u64>().map_err(|_| {
                                PayloadError::xml(format!("invalid list-count '{trimmed}'"))
                            })?;
                            doc.list_count = Some(count);
                        }
                        _ => {}
                    }
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(PayloadError::xml(e.to_string())),
                Ok(_) => {}
            }
        }

        if depth != 0 {
            return Err(PayloadError::xml("unexpected end of listing document"));
        }
        Ok(doc)
    }

    /// Returns every entry in document order.
    pub fn entries(&self) -> &[ListingEntry] {
        &self.entries
    }

    /// Returns the `list-count` value, when the document has one.
    pub fn list_count(&self) -> Option<u64> {
        self.list_count
    }

    /// Returns true if the listing has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the `idref` of every entry that has one.
    pub fn id_refs(&self) -> Vec<String> {
        self.values(IDREF)
    }

    /// Returns the `nameref` of every entry that has one.
    pub fn name_refs(&self) -> Vec<String> {
        self.values(NAMEREF)
    }

    /// Returns the value of `field` for every entry that has it.
    pub fn values(&self, field: &str) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|entry| entry.get(field))
            .map(str::to_string)
            .collect()
    }

    /// Returns the entries satisfying `predicate`.
    pub fn matching<'a>(&'a self, predicate: &'a Predicate) -> impl Iterator<Item = &'a ListingEntry> {
        self.entries.iter().filter(move |entry| predicate.matches(entry))
    }

    /// Returns the `idref` of each entry satisfying `predicate`.
    pub fn matching_id_refs(&self, predicate: &Predicate) -> Vec<String> {
        self.matching(predicate)
            .filter_map(|entry| entry.id_ref())
            .map(str::to_string)
            .collect()
    }

    /// Returns true if any entry satisfies `predicate`.
    pub fn any_match(&self, predicate: &Predicate) -> bool {
        self.entries.iter().any(|entry| predicate.matches(entry))
    }
}

fn append_text(
    field: &mut Option<(String, String)>,
    item_depth: Option<usize>,
    depth: usize,
    in_count: bool,
    count_text: &mut String,
    text: &str,
) {
    match item_depth {
        Some(item) if depth == item + 1 => {
            if let Some((_, value)) = field.as_mut() {
                value.push_str(text);
            }
        }
        None if in_count => count_text.push_str(text),
        _ => {}
    }
}
