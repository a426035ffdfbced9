//! Tarot card catalog and deterministic draw routine.
//!
//! The catalog is a read-only collaborator: the pipeline's card picker only
//! ever samples from it. A draw selects a uniformly random count in
//! {3, 4, 5}, shuffles the whole deck (Fisher–Yates via `SliceRandom`) and
//! takes the first N cards, assigning 1-based positions in shuffle order.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use crate::error::CoreError;

/// Inclusive bounds for the per-reading card count.
pub const MIN_CARD_COUNT: usize = 3;
pub const MAX_CARD_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// Card types
// ---------------------------------------------------------------------------

/// One card in the catalog. All fields are static display data.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TarotCard {
    pub id: &'static str,
    pub name: &'static str,
    pub display_name: &'static str,
    pub arcana: &'static str,
    pub short_meaning: &'static str,
    pub keywords: &'static [&'static str],
    pub image_url: &'static str,
}

/// A card selected in one draw, with its 1-based spread position.
#[derive(Debug, Clone, Serialize)]
pub struct DrawnCard {
    pub position: u32,
    pub card: TarotCard,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Read-only card catalog handle.
///
/// Defaults to the built-in major arcana; tests construct smaller catalogs
/// to exercise the minimum-size guard.
#[derive(Debug, Clone, Copy)]
pub struct CardCatalog {
    cards: &'static [TarotCard],
}

impl Default for CardCatalog {
    fn default() -> Self {
        Self {
            cards: MAJOR_ARCANA,
        }
    }
}

impl CardCatalog {
    /// Wrap an explicit card list (used by tests and future custom decks).
    pub fn new(cards: &'static [TarotCard]) -> Self {
        Self { cards }
    }

    pub fn cards(&self) -> &'static [TarotCard] {
        self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Draw
// ---------------------------------------------------------------------------

/// Draw a random spread from the catalog.
///
/// Guarantees: count in [[`MIN_CARD_COUNT`], [`MAX_CARD_COUNT`]], no duplicate
/// card ids within one draw, positions numbered 1..=count in shuffle order.
/// Fails if the catalog holds fewer than [`MAX_CARD_COUNT`] distinct cards;
/// a deck that cannot serve the largest spread is a configuration error.
pub fn draw_cards(catalog: &CardCatalog) -> Result<Vec<DrawnCard>, CoreError> {
    // Dedupe by id first so repeated entries can neither pad the size
    // check nor land twice in one spread.
    let mut seen = std::collections::HashSet::new();
    let mut deck: Vec<TarotCard> = catalog
        .cards()
        .iter()
        .filter(|c| seen.insert(c.id))
        .copied()
        .collect();

    if deck.len() < MAX_CARD_COUNT {
        return Err(CoreError::Validation(format!(
            "Card catalog must contain at least {MAX_CARD_COUNT} distinct cards (got {})",
            deck.len()
        )));
    }

    let mut rng = rand::rng();
    let count = rng.random_range(MIN_CARD_COUNT..=MAX_CARD_COUNT);

    deck.shuffle(&mut rng);

    Ok(deck
        .into_iter()
        .take(count)
        .enumerate()
        .map(|(i, card)| DrawnCard {
            position: i as u32 + 1,
            card,
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Built-in deck: the 22 major arcana
// ---------------------------------------------------------------------------

macro_rules! card {
    ($id:literal, $name:literal, $display:literal, $meaning:literal, [$($kw:literal),*]) => {
        TarotCard {
            id: $id,
            name: $name,
            display_name: $display,
            arcana: "major",
            short_meaning: $meaning,
            keywords: &[$($kw),*],
            image_url: concat!("/cards/major/", $id, ".webp"),
        }
    };
}

/// The standard major arcana in trump order.
pub const MAJOR_ARCANA: &[TarotCard] = &[
    card!("the-fool", "The Fool", "0 · The Fool", "New beginnings, spontaneity, a leap of faith", ["beginnings", "innocence", "adventure"]),
    card!("the-magician", "The Magician", "I · The Magician", "Willpower, resourcefulness, manifesting intent", ["will", "skill", "creation"]),
    card!("the-high-priestess", "The High Priestess", "II · The High Priestess", "Intuition, hidden knowledge, the inner voice", ["intuition", "mystery", "stillness"]),
    card!("the-empress", "The Empress", "III · The Empress", "Abundance, nurture, creative growth", ["abundance", "nurture", "fertility"]),
    card!("the-emperor", "The Emperor", "IV · The Emperor", "Structure, authority, stable foundations", ["structure", "authority", "order"]),
    card!("the-hierophant", "The Hierophant", "V · The Hierophant", "Tradition, guidance, shared belief", ["tradition", "learning", "conformity"]),
    card!("the-lovers", "The Lovers", "VI · The Lovers", "Union, alignment of values, a meaningful choice", ["love", "harmony", "choice"]),
    card!("the-chariot", "The Chariot", "VII · The Chariot", "Determination, momentum, victory through control", ["drive", "control", "victory"]),
    card!("strength", "Strength", "VIII · Strength", "Quiet courage, patience, compassionate power", ["courage", "patience", "compassion"]),
    card!("the-hermit", "The Hermit", "IX · The Hermit", "Introspection, solitude, searching for truth", ["introspection", "solitude", "guidance"]),
    card!("wheel-of-fortune", "Wheel of Fortune", "X · Wheel of Fortune", "Cycles, turning points, fate in motion", ["cycles", "change", "destiny"]),
    card!("justice", "Justice", "XI · Justice", "Fairness, cause and effect, accountability", ["fairness", "truth", "balance"]),
    card!("the-hanged-man", "The Hanged Man", "XII · The Hanged Man", "Surrender, new perspective, productive pause", ["surrender", "perspective", "pause"]),
    card!("death", "Death", "XIII · Death", "Endings that clear ground, transformation", ["endings", "transformation", "renewal"]),
    card!("temperance", "Temperance", "XIV · Temperance", "Moderation, synthesis, patient blending", ["balance", "moderation", "patience"]),
    card!("the-devil", "The Devil", "XV · The Devil", "Attachment, restriction, shadow bargains", ["attachment", "restriction", "shadow"]),
    card!("the-tower", "The Tower", "XVI · The Tower", "Sudden upheaval, revelation, collapse of the false", ["upheaval", "revelation", "awakening"]),
    card!("the-star", "The Star", "XVII · The Star", "Hope, healing, renewed faith after the storm", ["hope", "healing", "inspiration"]),
    card!("the-moon", "The Moon", "XVIII · The Moon", "Uncertainty, illusion, trusting the subconscious", ["illusion", "intuition", "uncertainty"]),
    card!("the-sun", "The Sun", "XIX · The Sun", "Vitality, clarity, uncomplicated joy", ["joy", "success", "vitality"]),
    card!("judgement", "Judgement", "XX · Judgement", "Reckoning, awakening, answering the call", ["reckoning", "awakening", "absolution"]),
    card!("the-world", "The World", "XXI · The World", "Completion, integration, a cycle fulfilled", ["completion", "integration", "wholeness"]),
];
