//! Threaded comments for content items: comments, replies and replies to
//! replies, stored flat and served as ordered trees.

pub mod comment;
pub mod database;
pub mod middleware;
pub mod router;
pub mod utils;
