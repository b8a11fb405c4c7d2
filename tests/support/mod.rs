#![allow(dead_code)]

pub mod chain;
pub mod keys;
pub mod wait;
