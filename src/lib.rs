//! Annotation Store
//!
//! Persisted, observable store for PDF annotations (highlights, notes,
//! images, drawings, shapes) and the viewer's theme preference.
//! The HTTP server binary is in main.rs.
//!
//! # Modules
//!
//! - `annotations`: record types and the annotation store
//! - `theme`: theme preference store
//! - `persistence`: storage backends and the versioned state envelope
//! - `collaborator`: selections, navigation and export interfaces
//! - `routes`, `state`, `config`, `error`: the HTTP host

pub mod annotations;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod events;
pub mod persistence;
pub mod routes;
pub mod state;
pub mod theme;
