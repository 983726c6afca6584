//! Integration tests: the full resolve, extract, assemble and classify
//! pipeline over in-memory fakes.

mod mocks;
mod pipeline;
