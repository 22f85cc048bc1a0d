//! # Workbook Module
//!
//! Accesso alle immagini incorporate nei workbook OOXML tramite la superficie
//! pubblica del formato (relationships), senza campi interni di librerie:
//! - `package`: caricamento, sostituzione immagini, salvataggio atomico
//! - `relationships`: parsing e riscrittura di `.rels` e content types

pub mod package;
pub mod relationships;

pub use package::{ImageRef, Worksheet, WorkbookPackage};
