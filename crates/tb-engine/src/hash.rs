//! Deterministic hashing for pseudorandom envelopes.
//!
//! Random envelopes must give the same value for the same key on every run
//! and on every platform, so they hash the decimal text of the key with
//! xxHash32 instead of drawing from a generator.

use core::fmt::Write;

const PRIME1: u32 = 2_654_435_761;
const PRIME2: u32 = 2_246_822_519;
const PRIME3: u32 = 3_266_489_917;
const PRIME4: u32 = 668_265_263;
const PRIME5: u32 = 374_761_393;

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

fn round(acc: u32, lane: u32) -> u32 {
    acc.wrapping_add(lane.wrapping_mul(PRIME2)).rotate_left(13).wrapping_mul(PRIME1)
}

/// xxHash32 of `input`.
pub fn xxhash32(input: &[u8], seed: u32) -> u32 {
    let len = input.len();
    let mut rest = input;
    let mut h = if len >= 16 {
        let mut v1 = seed.wrapping_add(PRIME1).wrapping_add(PRIME2);
        let mut v2 = seed.wrapping_add(PRIME2);
        let mut v3 = seed;
        let mut v4 = seed.wrapping_sub(PRIME1);
        while rest.len() >= 16 {
            v1 = round(v1, read_u32(&rest[0..]));
            v2 = round(v2, read_u32(&rest[4..]));
            v3 = round(v3, read_u32(&rest[8..]));
            v4 = round(v4, read_u32(&rest[12..]));
            rest = &rest[16..];
        }
        v1.rotate_left(1)
            .wrapping_add(v2.rotate_left(7))
            .wrapping_add(v3.rotate_left(12))
            .wrapping_add(v4.rotate_left(18))
    } else {
        seed.wrapping_add(PRIME5)
    };

    h = h.wrapping_add(len as u32);
    while rest.len() >= 4 {
        h = h.wrapping_add(read_u32(rest).wrapping_mul(PRIME3));
        h = h.rotate_left(17).wrapping_mul(PRIME4);
        rest = &rest[4..];
    }
    for &byte in rest {
        h = h.wrapping_add((byte as u32).wrapping_mul(PRIME5));
        h = h.rotate_left(11).wrapping_mul(PRIME1);
    }

    h ^= h >> 15;
    h = h.wrapping_mul(PRIME2);
    h ^= h >> 13;
    h = h.wrapping_mul(PRIME3);
    h ^= h >> 16;
    h
}

/// Hash of the decimal text of `key`, e.g. `-12` hashes the bytes `"-12"`.
pub fn hash_key(key: i64, seed: u32) -> u32 {
    let mut text: heapless::String<24> = heapless::String::new();
    // An i64 has at most 20 characters, so the write cannot overflow.
    let _ = write!(text, "{key}");
    xxhash32(text.as_bytes(), seed)
}

/// [`hash_key`] scaled into `[0, 1)`.
pub fn hash_fraction(key: i64, seed: u32) -> f64 {
    hash_key(key, seed) as f64 / 4_294_967_296.0
}
