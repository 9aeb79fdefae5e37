//! Built-in checks, one module per detector family:
//! - `loops`: double-pointer dereference and pointer-chasing patterns inside
//!   loop bodies (plus the `**` / `->…->` text heuristics);
//! - `spectre`: array accesses with an index that is not provably bounded.

pub mod loops;
pub mod spectre;

pub use loops::LoopDerefCheck;
pub use spectre::SpectreIndexCheck;
