mod builder;
mod consumer;
mod producer;

pub use builder::RingBufferBuilder;
pub use consumer::{Drain, ReadLease};
pub use producer::WriteLease;

pub mod Buffer {
    pub mod Buffer;
    pub mod Buffer_impl;
    pub mod cursor;
    pub use Buffer::{RingBuffer, MAX_CAPACITY, MAX_PAYLOAD_SIZE}; // re-export for stable path
}

pub mod Structs {
    pub mod Cell_Structs;
    pub use Cell_Structs::{Cell, CellHeader, CELL_MAGIC}; // re-export for stable path
}
