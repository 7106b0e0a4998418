use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Kind of unit a player can unlock.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Troop,
    Spell,
    Hero,
}

impl Category {
    /// Name of the player document array holding this kind of unit.
    pub fn field(self) -> &'static str {
        match self {
            Category::Troop => "troops",
            Category::Spell => "spells",
            Category::Hero => "heroes",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Category::Troop => "Troop",
            Category::Spell => "Spell",
            Category::Hero => "Hero",
        }
    }
}

/// Every unit name the game knows about, per category and across both
/// villages. Only used to tell a locked unit apart from a misspelled one.
///
/// The catalog is supplied by the caller, e.g. loaded with
/// [`NameCatalog::from_json`]:
///
/// ```
/// use coc_players::{Category, NameCatalog};
///
/// let catalog = NameCatalog::from_json(r#"{"troops": ["Barbarian", "Wizard"]}"#).unwrap();
/// assert!(catalog.contains(Category::Troop, "Wizard"));
/// assert!(!catalog.contains(Category::Spell, "Wizard"));
/// ```
#[derive(Deserialize, Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct NameCatalog {
    #[serde(default)]
    troops: BTreeSet<String>,
    #[serde(default)]
    spells: BTreeSet<String>,
    #[serde(default)]
    heroes: BTreeSet<String>,
}

impl NameCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn with_names<I, S>(mut self, category: Category, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.names_mut(category)
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn insert(&mut self, category: Category, name: impl Into<String>) -> bool {
        self.names_mut(category).insert(name.into())
    }

    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.names(category).contains(name)
    }

    pub fn names(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::Troop => &self.troops,
            Category::Spell => &self.spells,
            Category::Hero => &self.heroes,
        }
    }

    fn names_mut(&mut self, category: Category) -> &mut BTreeSet<String> {
        match category {
            Category::Troop => &mut self.troops,
            Category::Spell => &mut self.spells,
            Category::Hero => &mut self.heroes,
        }
    }
}
