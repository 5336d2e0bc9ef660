// Small helpers shared across modules.

pub mod futures;

pub use self::futures::CallOnDrop;
