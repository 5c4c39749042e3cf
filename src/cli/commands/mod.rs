pub mod classify;
pub mod introspect;
pub mod matrix;
pub mod status;
pub mod sync;
pub mod verify;
pub mod wait;
