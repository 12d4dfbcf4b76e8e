pub mod in_memory;
pub mod redis_bus;

pub use in_memory::InMemoryBus;
pub use redis_bus::RedisBus;
