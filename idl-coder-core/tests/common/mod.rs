//! Shared fixtures.

#![allow(dead_code)]

use idl_coder_core::coder::Coder;
use idl_coder_core::idl::Idl;
use idl_coder_core::pubkey::Pubkey;

pub const COUNTER_IDL: &str = include_str!("../fixtures/counter.json");

pub const COUNTER_DISC: [u8; 8] = [255, 176, 4, 245, 188, 253, 124, 25];
pub const INCREMENT_DISC: [u8; 8] = [11, 18, 104, 9, 104, 174, 59, 33];
pub const INCREMENTED_DISC: [u8; 8] = [92, 207, 119, 204, 71, 205, 108, 15];

pub fn counter_idl() -> Idl {
    Idl::from_json(COUNTER_IDL).unwrap()
}

pub fn counter_coder() -> Coder {
    Coder::new(counter_idl()).unwrap()
}

pub fn key(byte: u8) -> Pubkey {
    Pubkey::new([byte; 32])
}
