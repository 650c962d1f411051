pub mod purchases;
pub mod reviews;
pub mod users;
pub mod videos;

pub mod prelude {
    pub use super::purchases::Entity as Purchases;
    pub use super::reviews::Entity as Reviews;
    pub use super::users::Entity as Users;
    pub use super::videos::Entity as Videos;
}
