//! Route handlers organized by dashboard panel

pub mod health;
pub mod temporal;
pub mod topics;
pub mod toxicity;
