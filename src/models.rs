pub mod error;
pub mod manifest;
pub mod mod_dto;
pub mod mod_info;
pub mod modification;
pub mod paths;
pub mod version;
pub mod version_checker;
