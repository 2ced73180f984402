//! Client event system
//!
//! This module provides:
//! - `ClientEvent`: transient notices and forced navigation requests
//! - `EventBus`: broadcast channel the presentation layer subscribes to
//! - `Route`: the front-end routes and their auth guard

mod bus;
mod types;

pub use bus::EventBus;
pub use types::{ClientEvent, EventEmitter, Notice, NoticeLevel, Route};
