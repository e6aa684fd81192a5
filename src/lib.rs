pub mod emitter;
pub mod encode;
pub mod grapheme;
pub mod model;
pub mod scheduler;
