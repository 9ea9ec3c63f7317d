use super::money::Currency;
use serde::{Deserialize, Serialize};

pub type UserId = u32;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    #[serde(rename = "id_usuario")]
    pub id: UserId,
    #[serde(rename = "nombre")]
    pub name: String,
    pub email: String,
    #[serde(rename = "moneda_preferida", default)]
    pub preferred_currency: Currency,
}

/// Login credentials, serialized as the `/login` request body.
#[derive(Debug, Serialize, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// An authenticated session: the bearer token and the user it belongs to.
///
/// Passed explicitly to whatever needs to talk to the backend on the user's
/// behalf.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Session {
    pub token: String,
    pub user: User,
}

impl Session {
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}
