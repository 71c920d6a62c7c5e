//! Marked-content sequences (`BMC`, `BDC`, `EMC`).
//!
//! Every page object records the marked-content sequences that were open
//! when it was created. The list is shared between objects until a new
//! sequence opens, so items are reference counted.

use crate::object::{Dict, Object};
use std::rc::Rc;

/// Where the property list of a mark comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkParams {
    /// `BMC tag`
    None,
    /// `BDC tag /Name`, looked up in the `/Properties` resources
    PropertiesResource {
        /// Resource name
        name: String,
        /// The resource entry as found, possibly a reference
        object: Object,
        /// Resolved property list
        dict: Dict,
    },
    /// `BDC tag << ... >>`
    DirectDict(Dict),
}

/// One open marked-content sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentMarkItem {
    name: String,
    params: MarkParams,
}

impl ContentMarkItem {
    /// The mark's tag.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The property list, if any.
    pub fn params(&self) -> &MarkParams {
        &self.params
    }

    /// The resolved property dictionary, if any.
    pub fn dict(&self) -> Option<&Dict> {
        match &self.params {
            MarkParams::None => None,
            MarkParams::PropertiesResource { dict, .. } => Some(dict),
            MarkParams::DirectDict(dict) => Some(dict),
        }
    }
}

/// The stack of marked-content sequences around a page object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentMarks {
    items: Vec<Rc<ContentMarkItem>>,
}

impl ContentMarks {
    /// An empty mark list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of open sequences.
    pub fn count(&self) -> usize {
        self.items.len()
    }

    /// True when no sequence is open.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item `index`, outermost first.
    pub fn get(&self, index: usize) -> Option<&ContentMarkItem> {
        self.items.get(index).map(|i| i.as_ref())
    }

    /// Iterate items, outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &ContentMarkItem> {
        self.items.iter().map(|i| i.as_ref())
    }

    /// Open a sequence without properties.
    pub fn add_mark(&mut self, name: String) {
        self.items.push(Rc::new(ContentMarkItem {
            name,
            params: MarkParams::None,
        }));
    }

    /// Open a sequence with an inline property list.
    pub fn add_mark_with_direct_dict(&mut self, name: String, dict: Dict) {
        self.items.push(Rc::new(ContentMarkItem {
            name,
            params: MarkParams::DirectDict(dict),
        }));
    }

    /// Open a sequence whose property list is a named resource.
    pub fn add_mark_with_properties_resource(&mut self, name: String, property_name: String, object: Object, dict: Dict) {
        self.items.push(Rc::new(ContentMarkItem {
            name,
            params: MarkParams::PropertiesResource {
                name: property_name,
                object,
                dict,
            },
        }));
    }

    /// Close the innermost sequence.
    pub fn delete_last_mark(&mut self) {
        self.items.pop();
    }

    /// The marked-content identifier of the innermost sequence that has one.
    pub fn mcid(&self) -> Option<i64> {
        self.items
            .iter()
            .rev()
            .find_map(|item| item.dict().and_then(|d| d.get("MCID")).and_then(Object::as_integer))
    }

    /// Optional-content property lists (`/OC` marks), innermost last.
    pub fn optional_content(&self) -> impl Iterator<Item = &MarkParams> {
        self.items
            .iter()
            .filter(|item| item.name == "OC")
            .map(|item| &item.params)
    }
}
