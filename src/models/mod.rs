pub mod auth;
pub mod certificate;
pub mod person;
pub mod profile;
pub mod relation;
pub mod stats;
pub mod verified_link;
