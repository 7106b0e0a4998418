use std::sync::Arc;

use serde_json::Value;

use crate::{
    catalog::{Category, NameCatalog},
    document::{Clan, PlayerDocument, UnitEntry},
    error::{Error, Result},
};

/// Outcome of searching a player's unit array for a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitLookup {
    /// Position of the unit within its array.
    Found(usize),
    /// The name is in the catalog but the player has not unlocked it.
    NotUnlocked,
    /// The catalog does not know this name.
    UnrecognizedName,
}

/// Read-only view over one fetched player document.
///
/// Cloning is cheap: the document and the catalog are shared.
#[derive(Debug, Clone)]
pub struct Player {
    document: Arc<PlayerDocument>,
    catalog: Arc<NameCatalog>,
}

impl Player {
    pub fn new(document: PlayerDocument, catalog: Arc<NameCatalog>) -> Self {
        Self {
            document: Arc::new(document),
            catalog,
        }
    }

    pub fn document(&self) -> &PlayerDocument {
        &self.document
    }

    pub fn catalog(&self) -> &NameCatalog {
        &self.catalog
    }

    pub fn name(&self) -> Result<&str> {
        self.document.str_field("name")
    }
    pub fn tag(&self) -> Result<&str> {
        self.document.str_field("tag")
    }
    pub fn exp_level(&self) -> Result<u32> {
        self.document.u32_field("expLevel")
    }
    pub fn trophies(&self) -> Result<u32> {
        self.document.u32_field("trophies")
    }
    pub fn best_trophies(&self) -> Result<u32> {
        self.document.u32_field("bestTrophies")
    }
    /// Current trophies in the builder base.
    pub fn versus_trophies(&self) -> Result<u32> {
        self.document.u32_field("versusTrophies")
    }
    /// Best trophies in the builder base.
    pub fn best_versus_trophies(&self) -> Result<u32> {
        self.document.u32_field("bestVersusTrophies")
    }
    pub fn attack_wins(&self) -> Result<u32> {
        self.document.u32_field("attackWins")
    }
    pub fn defense_wins(&self) -> Result<u32> {
        self.document.u32_field("defenseWins")
    }
    /// Battles won in the builder base.
    pub fn versus_battle_wins(&self) -> Result<u32> {
        self.document.u32_field("versusBattleWinCount")
    }
    pub fn town_hall_level(&self) -> Result<u32> {
        self.document.u32_field("townHallLevel")
    }
    pub fn builder_hall_level(&self) -> Result<u32> {
        self.document.u32_field("builderHallLevel")
    }
    /// Role within the clan, e.g. `"admin"` or `"coLeader"`.
    pub fn role(&self) -> Result<&str> {
        self.document.str_field("role")
    }
    pub fn donations(&self) -> Result<u32> {
        self.document.u32_field("donations")
    }
    pub fn donations_received(&self) -> Result<u32> {
        self.document.u32_field("donationsReceived")
    }

    /// The player's clan, or `None` for players outside any clan.
    pub fn clan(&self) -> Result<Option<Clan>> {
        if self.document.get("clan").is_none() {
            return Ok(None);
        }
        self.document.typed_field("clan", "clan object").map(Some)
    }

    pub fn troops(&self) -> Result<Vec<UnitEntry>> {
        self.units(Category::Troop)
    }
    pub fn spells(&self) -> Result<Vec<UnitEntry>> {
        self.units(Category::Spell)
    }
    pub fn heroes(&self) -> Result<Vec<UnitEntry>> {
        self.units(Category::Hero)
    }

    /// Every unlocked unit of `category`, in server order.
    pub fn units(&self, category: Category) -> Result<Vec<UnitEntry>> {
        self.document.typed_field(category.field(), "array of units")
    }

    /// Searches the `category` array for `name`, falling back to the catalog
    /// to tell a locked unit from an unknown one.
    ///
    /// A document without the `category` array at all is a
    /// [`Error::DocumentShape`], even for names the catalog knows.
    pub fn find_unit_index(&self, category: Category, name: &str) -> Result<UnitLookup> {
        let field = category.field();
        let units = self.document.array_field(field)?;
        for (index, unit) in units.iter().enumerate() {
            let unit_name = unit
                .get("name")
                .and_then(Value::as_str)
                .ok_or_else(|| Error::shape(format!("{field}[{index}].name"), "string"))?;
            if unit_name == name {
                return Ok(UnitLookup::Found(index));
            }
        }

        if self.catalog.contains(category, name) {
            Ok(UnitLookup::NotUnlocked)
        } else {
            Ok(UnitLookup::UnrecognizedName)
        }
    }

    pub fn unit(&self, category: Category, name: &str) -> Result<UnitEntry> {
        let field = category.field();
        let index = match self.find_unit_index(category, name)? {
            UnitLookup::Found(index) => index,
            UnitLookup::NotUnlocked => {
                return Err(Error::ItemNotUnlocked {
                    category,
                    name: name.to_string(),
                    player: self.name()?.to_string(),
                });
            }
            UnitLookup::UnrecognizedName => {
                return Err(Error::IllegalName {
                    category,
                    name: name.to_string(),
                });
            }
        };

        let value = &self.document.array_field(field)?[index];
        serde_json::from_value(value.clone())
            .map_err(|_| Error::shape(format!("{field}[{index}]"), "unit object"))
    }

    pub fn troop(&self, name: &str) -> Result<UnitEntry> {
        self.unit(Category::Troop, name)
    }
    pub fn troop_level(&self, name: &str) -> Result<u32> {
        self.troop(name).map(|unit| unit.level)
    }
    pub fn troop_max_level(&self, name: &str) -> Result<u32> {
        self.troop(name).map(|unit| unit.max_level)
    }
    pub fn troop_village(&self, name: &str) -> Result<String> {
        self.troop(name).map(|unit| unit.village)
    }
    pub fn troop_name(&self, name: &str) -> Result<String> {
        self.troop(name).map(|unit| unit.name)
    }

    pub fn spell(&self, name: &str) -> Result<UnitEntry> {
        self.unit(Category::Spell, name)
    }
    pub fn spell_level(&self, name: &str) -> Result<u32> {
        self.spell(name).map(|unit| unit.level)
    }
    pub fn spell_max_level(&self, name: &str) -> Result<u32> {
        self.spell(name).map(|unit| unit.max_level)
    }
    pub fn spell_village(&self, name: &str) -> Result<String> {
        self.spell(name).map(|unit| unit.village)
    }
    pub fn spell_name(&self, name: &str) -> Result<String> {
        self.spell(name).map(|unit| unit.name)
    }

    pub fn hero(&self, name: &str) -> Result<UnitEntry> {
        self.unit(Category::Hero, name)
    }
    pub fn hero_level(&self, name: &str) -> Result<u32> {
        self.hero(name).map(|unit| unit.level)
    }
    pub fn hero_max_level(&self, name: &str) -> Result<u32> {
        self.hero(name).map(|unit| unit.max_level)
    }
    pub fn hero_village(&self, name: &str) -> Result<String> {
        self.hero(name).map(|unit| unit.village)
    }
}
