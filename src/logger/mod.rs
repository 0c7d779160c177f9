//! Structured activity logging (append-only JSONL).

pub mod jsonl;
