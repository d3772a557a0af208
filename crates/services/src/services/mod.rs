pub mod directory;
pub mod username;

pub use directory::{
    DirectoryConfig, DirectoryError, MediaConfig, NoopDirectory, ProfileDirectory, RemoteDirectory,
};
pub use username::{UserStore, UsernameError, create_username};
