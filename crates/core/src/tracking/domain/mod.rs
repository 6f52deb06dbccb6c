pub mod assignment;
pub mod lifecycle;
pub mod track;
pub mod tracker;
