pub mod catalog;
pub mod config;
pub mod indexes;
pub mod links;
pub mod markdown;
pub mod reconcile;
pub mod site;
pub mod theme;

// Re-export main types
pub use catalog::{Catalog, CatalogError, CatalogScanner, Note, NoteKind, ScanWarning};
pub use config::Settings;
pub use indexes::IndexSynthesizer;
pub use links::{LinkDiagnostic, LinkReport, LinkResolver};
pub use reconcile::{
    ApproveAll, DeletionPrompt, IgnoreList, ReconcileError, Reconciler, Summary,
};
pub use site::{copy_attachments, FileKind, GeneratedFile, SiteGenerator};
