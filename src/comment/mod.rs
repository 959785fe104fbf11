pub mod controller;
pub mod depth;
pub mod index;
pub mod memory_store;
pub mod model;
pub mod service;
pub mod store;
pub mod tree;
