pub mod collection;
pub mod document;
pub mod document_manager;
pub mod embedder;
pub mod error;
pub mod filter;
pub mod vector_repository;
