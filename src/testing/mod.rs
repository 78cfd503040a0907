//! Testability harness utilities.
//!
//! Deterministic onset lists and click-track fixtures shared by unit tests,
//! integration tests and the `render-click` subcommand. Nothing here touches
//! the filesystem except [`synthetic::write_click_fixture`].

pub mod synthetic;
