pub mod access;
pub mod archives;
pub mod compression;
pub mod decompression;
pub mod dependencies;
pub mod game_enabled_mods;
pub mod io_lock;
pub mod mod_fs;
pub mod mod_loader;
pub mod modification;
pub mod mods_cache;
pub mod staging;
pub mod version_checker;
