//! End-to-end acceptance tests exercising the publisher, GOOSE trip
//! evaluator, and closed-loop testers together as the concrete
//! scenarios describe.

mod acceptance;
