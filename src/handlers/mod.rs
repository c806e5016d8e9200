// src/handlers/mod.rs
pub mod auth;
pub mod briefs;
pub mod content;
pub mod generate;
pub mod jobs;
pub mod listening;
pub mod media;
pub mod social; // 📺 Connected accounts + YouTube
