use serde::Deserialize;

pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 64;
pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    /// Registration rules; login only checks the stored hash.
    pub fn validate_new(&self) -> Result<(), String> {
        let username_len = self.username.trim().chars().count();
        if username_len < MIN_USERNAME_LEN || username_len > MAX_USERNAME_LEN {
            return Err(format!(
                "Username must be between {} and {} characters",
                MIN_USERNAME_LEN, MAX_USERNAME_LEN
            ));
        }
        if self.username.trim() != self.username {
            return Err(String::from("Username must not start or end with whitespace"));
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            ));
        }
        Ok(())
    }
}
