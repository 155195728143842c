// src/handlers/mod.rs

pub mod assessment;
pub mod attempt;
pub mod course;
pub mod health;
pub mod media;
pub mod question;
