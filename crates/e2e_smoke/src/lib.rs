//! End-to-end smoke tests live under `tests/`; this crate exports nothing.
