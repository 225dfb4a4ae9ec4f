pub mod repository;
pub mod tables;
