#[cfg(feature = "enigo")]
pub mod enigo;
