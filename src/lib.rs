//! Blocking client for the Clash of Clans `players` endpoint.
//!
//! The view works on any player JSON:
//!
//! ```
//! use std::sync::Arc;
//!
//! use coc_players::{NameCatalog, Player, PlayerDocument};
//!
//! # fn main() -> coc_players::Result<()> {
//! let body = serde_json::json!({
//!     "name": "Ash",
//!     "tag": "#ABC123",
//!     "expLevel": 150,
//!     "troops": [{"name": "Barbarian", "level": 8, "maxLevel": 9, "village": "home"}]
//! });
//! let player = Player::new(PlayerDocument::from_value(body)?, Arc::new(NameCatalog::new()));
//! assert_eq!(player.troop_level("Barbarian")?, 8);
//! # Ok(())
//! # }
//! ```
//!
//! With the default `client` feature, `CocClient` fetches it from the API.
//! Without that feature only the document model is built.

pub mod catalog;
pub mod document;
pub mod error;
pub mod player;

#[cfg(feature = "client")]
mod client;
#[cfg(feature = "client")]
mod util;

pub use crate::{
    catalog::{Category, NameCatalog},
    document::{BadgeUrls, Clan, PlayerDocument, UnitEntry},
    error::{Error, Result},
    player::{Player, UnitLookup},
};

#[cfg(feature = "client")]
pub use crate::{
    client::{API_VERSION, ClientBuilder, CocClient, URL, base_url, get_token},
    error::ConnectionError,
};
#[cfg(feature = "client")]
pub use reqwest::StatusCode;
