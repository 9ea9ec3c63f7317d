//! Application layer orchestrating the domain rules over a repository.
//!
//! [`ledger::Ledger`] is the single entry point used by the CLI: it validates
//! requests against the balance engine before any backend sees them, then
//! turns repository data into read models.

pub mod ledger;
