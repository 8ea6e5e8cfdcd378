pub mod io;
pub mod lock;
