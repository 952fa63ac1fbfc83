//! CLI Commands

pub mod input;
pub mod inspect;
pub mod recover;
pub mod split;
