//! Shared domain logic with zero internal dependencies.
//!
//! Everything here is usable from the repository layer, the services and the
//! worker binary alike: common ID/timestamp aliases, the domain error enum,
//! the prompt cipher engine, the reusable retry policy and the tarot card
//! catalog with its draw routine.

pub mod cards;
pub mod crypto;
pub mod error;
pub mod retry;
pub mod types;
