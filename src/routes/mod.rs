//! Route modules for the OCR Extractor server

pub mod health;
pub mod index;
pub mod upload;
