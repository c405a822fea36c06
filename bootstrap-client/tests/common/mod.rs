pub mod harness;

pub use harness::{await_state, ScriptedIssuer, TestBed};
