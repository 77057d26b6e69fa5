//! Entity registry for NPCs and inventory items.
//!
//! Names are unique keys. Descriptions are append-only: updates concatenate
//! a season-stamped continuation rather than replacing the original text,
//! so an entity's whole textual history survives the run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub desc: String,
}

/// An ordered collection of named lore entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct LoreBook(pub Vec<Entity>);

impl LoreBook {
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Entity> {
        self.0.iter().find(|e| e.name == name)
    }

    /// First write wins: if `name` is already present this is a no-op.
    pub fn add_or_ignore(&mut self, name: &str, desc: &str) {
        if name.is_empty() || self.find(name).is_some() {
            return;
        }
        self.0.push(Entity {
            name: name.to_string(),
            desc: desc.to_string(),
        });
    }

    /// Remove by name; silently does nothing when the name is unknown.
    pub fn remove(&mut self, name: &str) {
        let before = self.0.len();
        self.0.retain(|e| e.name != name);
        if self.0.len() == before {
            log::debug!("remove referenced unknown entity '{name}'");
        }
    }

    /// Append a stamped continuation to an existing entity's description.
    /// References to unknown names are dropped without error; the generator
    /// routinely misremembers them.
    pub fn append_update(&mut self, name: &str, desc: &str, stamp: &str) {
        match self.0.iter_mut().find(|e| e.name == name) {
            Some(entity) => {
                entity.desc.push_str(&format!("\n\n*({stamp})* {desc}"));
            }
            None => log::debug!("update referenced unknown entity '{name}'"),
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entity> {
        self.0.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> IntoIterator for &'a LoreBook {
    type Item = &'a Entity;
    type IntoIter = std::slice::Iter<'a, Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_twice_keeps_first_description() {
        let mut book = LoreBook::default();
        book.add_or_ignore("Mom", "Always nearby.");
        book.add_or_ignore("Mom", "A stranger now.");
        assert_eq!(book.len(), 1);
        assert_eq!(book.find("Mom").unwrap().desc, "Always nearby.");
    }

    #[test]
    fn empty_name_is_ignored() {
        let mut book = LoreBook::default();
        book.add_or_ignore("", "ghost");
        assert!(book.is_empty());
    }

    #[test]
    fn remove_is_silent_on_unknown() {
        let mut book = LoreBook::default();
        book.add_or_ignore("Bike", "Red, second-hand.");
        book.remove("Sled");
        assert_eq!(book.len(), 1);
        book.remove("Bike");
        assert!(book.is_empty());
    }

    #[test]
    fn updates_append_and_never_replace() {
        let mut book = LoreBook::default();
        let original = "Grandfather's watch, still ticking.";
        book.add_or_ignore("Watch", original);
        book.append_update("Watch", "The glass cracked in the fall.", "Winter 1994");
        book.append_update("Watch", "Traded away at the market.", "Spring 1995");

        let desc = &book.find("Watch").unwrap().desc;
        assert!(desc.starts_with(original));
        assert!(desc.contains("*(Winter 1994)* The glass cracked in the fall."));
        assert!(desc.contains("*(Spring 1995)* Traded away at the market."));
    }

    #[test]
    fn update_of_unknown_entity_is_dropped() {
        let mut book = LoreBook::default();
        book.append_update("Nobody", "never existed", "Winter 1993");
        assert!(book.is_empty());
    }

    #[test]
    fn preserves_insertion_order() {
        let mut book = LoreBook::default();
        book.add_or_ignore("Mom", "first");
        book.add_or_ignore("Dad", "second");
        book.add_or_ignore("Lyokha", "third");
        let names: Vec<_> = book.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Mom", "Dad", "Lyokha"]);
    }

    #[test]
    fn serializes_as_plain_array() {
        let mut book = LoreBook::default();
        book.add_or_ignore("Mom", "Always nearby.");
        let json = serde_json::to_value(&book).unwrap();
        assert_eq!(json[0]["name"], "Mom");
        assert_eq!(json[0]["desc"], "Always nearby.");
    }
}
