pub mod students;
pub mod whoami;
