pub mod auth;
pub mod brief;
pub mod content;
pub mod listening;
pub mod media;
pub mod social;
