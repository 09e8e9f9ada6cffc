pub mod alphafold;
pub mod batch;
pub mod config;
pub mod domain;
pub mod error;
pub mod http;
pub mod output;
pub mod swissmodel;
pub mod uniprot;
