pub mod desc;
pub mod pagetable;

pub use desc::*;
pub use pagetable::*;
