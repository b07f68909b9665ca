pub mod membership;
pub mod principal;
pub mod student;
pub mod tenant;

pub use membership::{Membership, Role};
pub use principal::Principal;
pub use student::{Enrollment, Student};
pub use tenant::Tenant;
