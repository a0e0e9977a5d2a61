//! Shared utility modules used across colstore components.

pub mod varint;
