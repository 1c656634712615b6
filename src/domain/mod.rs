//! Core domain types and the session driver.

pub mod bar;
pub mod bot;
pub mod config;
pub mod data;
pub mod ema;
pub mod error;
pub mod gate;
pub mod guard;
pub mod normalizer;
pub mod order;
pub mod qualifier;
pub mod registry;
pub mod results;
pub mod router;
pub mod signal;
pub mod tick;
