pub mod contact;
pub mod project;
pub mod stage;
pub mod team;
