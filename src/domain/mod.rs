// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust structs and traits describing what a clip and a
// label are. No Burn types, no file I/O.

// A decoded audio clip and the ordered class-name list
pub mod clip;

// Source and dataset abstractions the other layers implement
pub mod traits;
