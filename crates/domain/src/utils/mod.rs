//! Domain utility functions

pub mod schedule_parser;
