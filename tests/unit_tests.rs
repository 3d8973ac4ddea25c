//! Entry point for the unit test tree under `tests/unit/`.

mod unit;
