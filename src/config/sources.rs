pub mod game_dir_file;
pub mod global_file;
