pub mod leftrec;
pub mod optional;
pub mod required;
