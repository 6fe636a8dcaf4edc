//! Packing protocol tests against in-memory stores and counting collaborators.

mod support;

mod layer_tests;
