//! Small, pure orchestration helpers shared by adapter crates.

pub mod reorder_buffer;
pub mod seq_allocator;

pub use reorder_buffer::ReorderBuffer;
pub use seq_allocator::SeqAllocator;
