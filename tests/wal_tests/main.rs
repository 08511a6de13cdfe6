//! WAL test suite
//!
//! Entry framing, writer, reader and recovery live in sibling modules so
//! they share one test binary.

mod entry_tests;
