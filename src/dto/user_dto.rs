use serde::Serialize;

use crate::models::user::User;

/// Public view of a user.
#[derive(Debug, Serialize)]
pub struct UserDTO {
    pub id: i64,
    pub username: String,
}

impl From<User> for UserDTO {
    fn from(user: User) -> Self {
        UserDTO {
            id: user.id,
            username: user.username,
        }
    }
}
