// src/services/mod.rs

pub mod media_events;
pub mod question_generator;
