#![allow(dead_code)]

pub mod fixtures;
pub mod lookup;
pub mod wiremock_helpers;
