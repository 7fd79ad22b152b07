//! Text and content helpers shared by the classifier and handlers

pub mod links;
pub mod mime;
pub mod sports;
