//! Workspace root placeholder. The real crates live under `crates/`.
