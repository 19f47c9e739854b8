pub mod guard;

pub use guard::guarded;
